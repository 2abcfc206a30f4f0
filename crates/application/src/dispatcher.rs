use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};

use domain::error::DomainError;
use domain::event::StatusCommand;

use crate::device_bridge::DeviceBridge;
use crate::line_service::LineService;

pub const TOPIC_COMMAND_STATUS: &str = "production-lines/commands/status";
pub const TOPIC_DEVICE_ANNOUNCE: &str = "devices/announce";
pub const PATTERN_DEVICE_STATUS: &str = "devices/+/status";
pub const PATTERN_DEVICE_INPUT_CHANGE: &str = "devices/+/input-change";

/// Routes inbound bus messages by topic to the device bridge or the line
/// service. All four patterns are (re-)subscribed through the bus client's
/// registry.
pub struct BusDispatcher {
    bridge: Arc<DeviceBridge>,
    lines: Arc<LineService>,
}

impl BusDispatcher {
    pub fn new(bridge: Arc<DeviceBridge>, lines: Arc<LineService>) -> Self {
        Self { bridge, lines }
    }

    /// Topic patterns this dispatcher consumes.
    pub fn subscriptions() -> [&'static str; 4] {
        [
            TOPIC_COMMAND_STATUS,
            TOPIC_DEVICE_ANNOUNCE,
            PATTERN_DEVICE_STATUS,
            PATTERN_DEVICE_INPUT_CHANGE,
        ]
    }

    pub async fn dispatch(&self, topic: &str, payload: &[u8]) {
        if topic == TOPIC_COMMAND_STATUS {
            self.handle_status_command(topic, payload).await;
        } else if topic == TOPIC_DEVICE_ANNOUNCE {
            self.bridge.handle_announcement(payload).await;
        } else if topic_matches(PATTERN_DEVICE_STATUS, topic) {
            self.bridge.handle_device_status(payload).await;
        } else if topic_matches(PATTERN_DEVICE_INPUT_CHANGE, topic) {
            self.bridge.handle_input_change(payload).await;
        } else {
            debug!(%topic, "ignoring message on unhandled topic");
        }
    }

    /// `production-lines/commands/status`: shop-floor controllers address
    /// lines by code.
    async fn handle_status_command(&self, topic: &str, payload: &[u8]) {
        let cmd: StatusCommand = match serde_json::from_slice(payload) {
            Ok(cmd) => cmd,
            Err(err) => {
                error!(%topic, %err, "failed to parse status command");
                return;
            }
        };

        if cmd.code.is_empty() {
            error!("status command missing code");
            return;
        }

        info!(code = %cmd.code, status = %cmd.status, "processing status command");

        let line = match self.lines.get_by_code(&cmd.code).await {
            Ok(line) => line,
            Err(DomainError::NotFound) => {
                warn!(code = %cmd.code, "production line not found for status command");
                return;
            }
            Err(err) => {
                error!(code = %cmd.code, %err, "failed to get production line");
                return;
            }
        };

        let detail = json!({ "topic": topic });
        if let Err(err) = self
            .lines
            .set_status(line.id, cmd.status, "mqtt", Some(detail))
            .await
        {
            error!(code = %cmd.code, status = %cmd.status, %err,
                "failed to set production line status");
        }
    }
}

/// MQTT-style topic match supporting the `+` single-level wildcard and a
/// trailing `#`.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_parts = pattern.split('/');
    let mut topic_parts = topic.split('/');

    loop {
        match (pattern_parts.next(), topic_parts.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(p), Some(t)) if p == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_matches_single_level_wildcard() {
        assert!(topic_matches(
            "devices/+/status",
            "devices/AA:BB:CC:DD:EE:01/status"
        ));
        assert!(!topic_matches("devices/+/status", "devices/x/input-change"));
        assert!(!topic_matches("devices/+/status", "devices/status"));
        assert!(!topic_matches("devices/+/status", "devices/a/b/status"));
    }

    #[test]
    fn test_topic_matches_exact_and_hash() {
        assert!(topic_matches("devices/announce", "devices/announce"));
        assert!(!topic_matches("devices/announce", "devices/announce/x"));
        assert!(topic_matches("devices/#", "devices/a/b/c"));
    }
}
