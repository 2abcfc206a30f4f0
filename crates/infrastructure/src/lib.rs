pub mod config;
pub mod database;
pub mod external;
pub mod messaging;

pub use config::AppConfig;
pub use external::OpenHolidaysClient;
pub use messaging::{EventHub, MqttClient, MqttEventPublisher, MqttMessage, StreamEvent, Subscriber};
