use std::sync::Arc;

use application::{
    AnalyticsService, ComplianceService, DeviceBridge, LabelService, LineService,
    ScheduleResolver, ScheduleService,
};
use domain::repository::DeviceRepository;
use infrastructure::EventHub;

/// Shared handler state. Everything here is cheaply cloneable or
/// reference-counted.
pub struct AppState {
    pub lines: Arc<LineService>,
    pub labels: Arc<LabelService>,
    pub schedules: Arc<ScheduleService>,
    pub compliance: Arc<ComplianceService>,
    pub analytics: Arc<AnalyticsService>,
    pub resolver: Arc<ScheduleResolver>,
    pub bridge: Arc<DeviceBridge>,
    pub devices: Arc<dyn DeviceRepository>,
    pub hub: EventHub,
}
