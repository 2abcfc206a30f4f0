use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operational status of an embedded controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    Unknown,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> DeviceStatus {
        match s {
            "online" => DeviceStatus::Online,
            "offline" => DeviceStatus::Offline,
            _ => DeviceStatus::Unknown,
        }
    }
}

/// A controller that has announced itself on the bus. Keyed by MAC address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub id: Uuid,
    pub mac_address: String,
    pub device_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<serde_json::Value>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub status: DeviceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written on an announcement upsert.
#[derive(Debug, Clone)]
pub struct DeviceUpsert {
    pub mac_address: String,
    pub device_type: String,
    pub firmware_version: Option<String>,
    pub ip_address: Option<String>,
    pub capabilities: serde_json::Value,
    pub metadata: serde_json::Value,
}

/// An active binding between a device (by MAC) and a line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceLineAssignment {
    pub id: Uuid,
    pub device_mac: String,
    pub line_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Device row joined with its active assignment, for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceWithAssignment {
    #[serde(flatten)]
    pub device: DiscoveredDevice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_line_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_line_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_line_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
}

// ---------- Bus payloads ----------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    #[serde(default)]
    pub digital_inputs: i32,
    #[serde(default)]
    pub digital_outputs: i32,
    #[serde(default)]
    pub ethernet: bool,
    #[serde(default)]
    pub wifi: bool,
}

/// `devices/announce` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAnnouncement {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub device_type: String,
    #[serde(default)]
    pub firmware_version: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub capabilities: DeviceCapabilities,
    #[serde(default)]
    pub status: serde_json::Value,
    #[serde(default)]
    pub timestamp: i64,
}

/// `devices/+/status` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceStatusMessage {
    pub device_id: String,
    #[serde(default)]
    pub line_state: String,
    #[serde(default)]
    pub digital_inputs: i64,
    #[serde(default)]
    pub digital_outputs: i64,
    #[serde(default)]
    pub ethernet_connected: bool,
    #[serde(default)]
    pub assigned_line: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
}

/// `devices/+/input-change` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct InputChangeMessage {
    pub device_id: String,
    pub channel: i32,
    pub state: bool,
    #[serde(default)]
    pub all_inputs: i64,
    #[serde(default)]
    pub timestamp: i64,
}

/// Outbound command published on `devices/{mac}/command`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl DeviceCommand {
    pub fn flash_identify(duration_secs: i32) -> Self {
        Self {
            command: "flash_identify".into(),
            channel: None,
            state: None,
            duration: Some(duration_secs),
            params: None,
        }
    }

    pub fn set_output(channel: i32, state: bool) -> Self {
        Self {
            command: "set_output".into(),
            channel: Some(channel),
            state: Some(serde_json::Value::Bool(state)),
            duration: None,
            params: None,
        }
    }

    pub fn set_line_state(state: &str) -> Self {
        Self {
            command: "set_line_state".into(),
            channel: None,
            state: Some(serde_json::Value::String(state.to_string())),
            duration: None,
            params: None,
        }
    }
}

pub fn device_command_topic(mac: &str) -> String {
    format!("devices/{mac}/command")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_output_command_shape() {
        let cmd = DeviceCommand::set_output(1, true);
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["command"], "set_output");
        assert_eq!(json["channel"], 1);
        assert_eq!(json["state"], true);
        assert!(json.get("duration").is_none());
    }

    #[test]
    fn test_status_message_tolerates_missing_fields() {
        let msg: DeviceStatusMessage =
            serde_json::from_str(r#"{"device_id":"AA:BB:CC:DD:EE:01"}"#).unwrap();
        assert_eq!(msg.line_state, "");
        assert_eq!(msg.digital_inputs, 0);
    }
}
