use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::label::Label;

/// Operational status of a production line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    On,
    Off,
    Maintenance,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::On => "on",
            Status::Off => "off",
            Status::Maintenance => "maintenance",
            Status::Error => "error",
        }
    }

    /// Uppercase form used on the device wire (`line_state`, `set_line_state`).
    pub fn as_device_state(&self) -> &'static str {
        match self {
            Status::On => "ON",
            Status::Off => "OFF",
            Status::Maintenance => "MAINTENANCE",
            Status::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Status> {
        match s {
            "on" => Some(Status::On),
            "off" => Some(Status::Off),
            "maintenance" => Some(Status::Maintenance),
            "error" => Some(Status::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A production line at the facility; the primary control object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionLine {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<Uuid>,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLineRequest {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLineRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetStatusRequest {
    pub status: Status,
}

/// One entry of the append-only status audit log. `line_code` is
/// denormalized so history stays queryable across renames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub time: DateTime<Utc>,
    pub line_id: Uuid,
    pub line_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<Status>,
    pub new_status: Status,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_detail: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in [Status::On, Status::Off, Status::Maintenance, Status::Error] {
            assert_eq!(Status::parse(s.as_str()), Some(s));
        }
        assert_eq!(Status::parse("ON"), None);
        assert_eq!(Status::parse("broken"), None);
    }

    #[test]
    fn test_status_serde_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&Status::Maintenance).unwrap(),
            "\"maintenance\""
        );
        let parsed: Status = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(parsed, Status::Error);
    }

    #[test]
    fn test_device_state_is_uppercase() {
        assert_eq!(Status::Maintenance.as_device_state(), "MAINTENANCE");
    }
}
