use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use domain::error::{DomainError, DomainResult};
use domain::event::{EventPublisher, EventType, LineDeletedEvent, LineEvent, StatusEvent};
use domain::line::ProductionLine;

use super::event_hub::{EventHub, StreamEvent};
use super::mqtt_client::MqttPublisherClient;

pub const TOPIC_EVENT_CREATED: &str = "production-lines/events/created";
pub const TOPIC_EVENT_UPDATED: &str = "production-lines/events/updated";
pub const TOPIC_EVENT_DELETED: &str = "production-lines/events/deleted";
pub const TOPIC_EVENT_STATUS: &str = "production-lines/events/status";

/// Publishes line events to the bus and mirrors them to streaming
/// subscribers through the hub. A failed bus publish is returned to the
/// caller; hub delivery follows the hub's own drop policy.
pub struct MqttEventPublisher {
    client: Arc<dyn MqttPublisherClient>,
    hub: EventHub,
}

impl MqttEventPublisher {
    pub fn new(client: Arc<dyn MqttPublisherClient>, hub: EventHub) -> Self {
        Self { client, hub }
    }

    async fn publish_event<T: Serialize>(&self, topic: &str, event: &T) -> DomainResult<()> {
        let payload = serde_json::to_vec(event).map_err(|err| {
            error!(%topic, %err, "failed to serialize event");
            DomainError::internal(err)
        })?;

        self.client
            .publish_bytes(topic, &payload, false)
            .await
            .map_err(DomainError::internal)?;

        info!(%topic, payload_size = payload.len(), "event published");
        Ok(())
    }

    fn broadcast_stream<T: Serialize>(&self, kind: &str, event: &T) {
        match serde_json::to_value(event) {
            Ok(payload) => {
                self.hub.broadcast(StreamEvent {
                    kind: kind.to_string(),
                    payload,
                });
                debug!(event_type = kind, "event broadcast to streaming subscribers");
            }
            Err(err) => {
                error!(event_type = kind, %err, "failed to serialize event for streaming");
            }
        }
    }
}

#[async_trait]
impl EventPublisher for MqttEventPublisher {
    async fn publish_created(&self, line: &ProductionLine) -> DomainResult<()> {
        let event = LineEvent {
            kind: EventType::Created,
            timestamp: Utc::now(),
            data: line.clone(),
        };

        self.publish_event(TOPIC_EVENT_CREATED, &event).await?;
        self.broadcast_stream("line.created", &event);
        Ok(())
    }

    async fn publish_updated(&self, line: &ProductionLine) -> DomainResult<()> {
        let event = LineEvent {
            kind: EventType::Updated,
            timestamp: Utc::now(),
            data: line.clone(),
        };

        self.publish_event(TOPIC_EVENT_UPDATED, &event).await?;
        self.broadcast_stream("line.updated", &event);
        Ok(())
    }

    async fn publish_deleted(&self, id: Uuid, code: &str) -> DomainResult<()> {
        let event = LineDeletedEvent {
            kind: EventType::Deleted,
            timestamp: Utc::now(),
            id,
            code: code.to_string(),
        };

        self.publish_event(TOPIC_EVENT_DELETED, &event).await?;
        self.broadcast_stream("line.deleted", &event);
        Ok(())
    }

    async fn publish_status(&self, line: &ProductionLine) -> DomainResult<()> {
        let event = StatusEvent {
            kind: EventType::Status,
            timestamp: Utc::now(),
            id: line.id,
            code: line.code.clone(),
            status: line.status,
        };

        self.publish_event(TOPIC_EVENT_STATUS, &event).await?;
        self.broadcast_stream("line.status", &event);
        Ok(())
    }

    async fn publish_raw(&self, topic: &str, payload: Vec<u8>) -> DomainResult<()> {
        self.client
            .publish_bytes(topic, &payload, false)
            .await
            .map_err(DomainError::internal)?;

        info!(%topic, payload_size = payload.len(), "message published");
        Ok(())
    }
}
