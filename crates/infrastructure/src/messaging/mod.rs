pub mod event_hub;
pub mod event_publisher;
pub mod mqtt_client;

pub use event_hub::{EventHub, StreamEvent, Subscriber};
pub use event_publisher::MqttEventPublisher;
pub use mqtt_client::{MqttClient, MqttMessage, MqttPublisherClient};
