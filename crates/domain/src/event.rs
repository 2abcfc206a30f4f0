use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainResult;
use crate::line::{ProductionLine, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Created,
    Updated,
    Deleted,
    Status,
}

/// Envelope for created/updated events carrying the full line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineEvent {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub timestamp: DateTime<Utc>,
    pub data: ProductionLine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineDeletedEvent {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub timestamp: DateTime<Utc>,
    pub id: Uuid,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub timestamp: DateTime<Utc>,
    pub id: Uuid,
    pub code: String,
    pub status: Status,
}

/// Command received on `production-lines/commands/status` from shop-floor
/// controllers.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusCommand {
    pub code: String,
    pub status: Status,
}

/// Outbound event publication: each event goes to its bus topic and is
/// broadcast to streaming subscribers. Bus failures surface to the caller,
/// who decides whether they are fatal.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_created(&self, line: &ProductionLine) -> DomainResult<()>;
    async fn publish_updated(&self, line: &ProductionLine) -> DomainResult<()>;
    async fn publish_deleted(&self, id: Uuid, code: &str) -> DomainResult<()>;
    async fn publish_status(&self, line: &ProductionLine) -> DomainResult<()>;
    async fn publish_raw(&self, topic: &str, payload: Vec<u8>) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_event_envelope() {
        let event = StatusEvent {
            kind: EventType::Status,
            timestamp: Utc::now(),
            id: Uuid::new_v4(),
            code: "L1".into(),
            status: Status::On,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["code"], "L1");
        assert_eq!(json["status"], "on");
    }

    #[test]
    fn test_status_command_parsing() {
        let cmd: StatusCommand =
            serde_json::from_str(r#"{"code":"L1","status":"maintenance"}"#).unwrap();
        assert_eq!(cmd.code, "L1");
        assert_eq!(cmd.status, Status::Maintenance);

        let invalid = serde_json::from_str::<StatusCommand>(r#"{"code":"L1","status":"paused"}"#);
        assert!(invalid.is_err());
    }
}
