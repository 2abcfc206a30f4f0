pub mod analytics_service;
pub mod compliance;
pub mod device_bridge;
pub mod dispatcher;
pub mod label_service;
pub mod line_service;
pub mod resolver;
pub mod schedule_service;
pub mod stale_monitor;

pub use analytics_service::AnalyticsService;
pub use compliance::ComplianceService;
pub use device_bridge::{DeviceBridge, StatusSetter};
pub use dispatcher::BusDispatcher;
pub use label_service::LabelService;
pub use line_service::LineService;
pub use resolver::ScheduleResolver;
pub use schedule_service::ScheduleService;
pub use stale_monitor::StaleDeviceMonitor;
