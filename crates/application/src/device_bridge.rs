use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use domain::device::{
    device_command_topic, DeviceAnnouncement, DeviceCommand, DeviceStatusMessage, DeviceUpsert,
    InputChangeMessage,
};
use domain::error::{DomainError, DomainResult};
use domain::event::EventPublisher;
use domain::line::{ProductionLine, Status};
use domain::repository::DeviceRepository;

use crate::line_service::LineService;

/// The slice of the line service the bridge needs. Injected after the line
/// service is constructed, breaking the publisher/bridge construction
/// cycle.
#[async_trait]
pub trait StatusSetter: Send + Sync {
    async fn set_status(
        &self,
        id: Uuid,
        status: Status,
        source: &str,
        source_detail: Option<serde_json::Value>,
    ) -> DomainResult<ProductionLine>;
}

#[async_trait]
impl StatusSetter for LineService {
    async fn set_status(
        &self,
        id: Uuid,
        status: Status,
        source: &str,
        source_detail: Option<serde_json::Value>,
    ) -> DomainResult<ProductionLine> {
        LineService::set_status(self, id, status, source, source_detail).await
    }
}

/// Translator between device bus traffic and the line-status domain.
/// Consumers never propagate errors upward: malformed payloads are logged
/// and dropped, not requeued.
pub struct DeviceBridge {
    devices: Arc<dyn DeviceRepository>,
    publisher: Arc<dyn EventPublisher>,
    status_setter: Arc<dyn StatusSetter>,
}

impl DeviceBridge {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        publisher: Arc<dyn EventPublisher>,
        status_setter: Arc<dyn StatusSetter>,
    ) -> Self {
        Self {
            devices,
            publisher,
            status_setter,
        }
    }

    /// `devices/announce`: upsert the device record by MAC. The first
    /// insert pins `first_seen`; every announcement refreshes `last_seen`
    /// and flips the device online. Capability and status blobs are stored
    /// opaquely.
    pub async fn handle_announcement(&self, payload: &[u8]) {
        let announcement: DeviceAnnouncement = match serde_json::from_slice(payload) {
            Ok(a) => a,
            Err(err) => {
                error!(%err, "failed to parse device announcement");
                return;
            }
        };

        if announcement.mac_address.is_empty() {
            warn!(device_id = %announcement.device_id, "device announcement missing MAC address");
            return;
        }

        let capabilities = serde_json::to_value(&announcement.capabilities)
            .unwrap_or_else(|_| json!({}));

        let upsert = DeviceUpsert {
            mac_address: announcement.mac_address.clone(),
            device_type: announcement.device_type.clone(),
            firmware_version: Some(announcement.firmware_version.clone()),
            ip_address: Some(announcement.ip_address.clone()),
            capabilities,
            metadata: announcement.status.clone(),
        };

        if let Err(err) = self.devices.upsert(&upsert).await {
            error!(%err, mac = %announcement.mac_address, "failed to upsert device");
            return;
        }

        info!(mac = %announcement.mac_address, device_type = %announcement.device_type,
            firmware = %announcement.firmware_version, ip = %announcement.ip_address,
            "device discovered/updated");
    }

    /// `devices/+/status`: liveness beacon plus, for assigned devices, a
    /// translation of the reported `line_state` into a line-status
    /// transition.
    pub async fn handle_device_status(&self, payload: &[u8]) {
        let status: DeviceStatusMessage = match serde_json::from_slice(payload) {
            Ok(s) => s,
            Err(err) => {
                error!(%err, "failed to parse device status");
                return;
            }
        };

        if let Err(err) = self.devices.mark_seen(&status.device_id).await {
            error!(%err, mac = %status.device_id, "failed to refresh device liveness");
            return;
        }

        let assignment = match self.devices.assignment_for_device(&status.device_id).await {
            Ok(Some(a)) => a,
            Ok(None) => {
                debug!(device_mac = %status.device_id,
                    "device not assigned to a line - skipping status translation");
                return;
            }
            Err(err) => {
                error!(%err, "failed to get device assignment");
                return;
            }
        };

        let line_status = match status.line_state.as_str() {
            "ON" => Status::On,
            "OFF" => Status::Off,
            "MAINTENANCE" => Status::Maintenance,
            "ERROR" => Status::Error,
            "UNKNOWN" => {
                // Device not synchronized yet.
                debug!(device_mac = %status.device_id,
                    "device line_state is UNKNOWN - skipping status update");
                return;
            }
            other => {
                warn!(device_mac = %status.device_id, line_state = %other,
                    "unknown line_state value from device");
                return;
            }
        };

        let source_detail = json!({
            "device_mac": status.device_id,
            "digital_inputs": status.digital_inputs,
            "digital_outputs": status.digital_outputs,
            "device_timestamp": status.timestamp,
        });

        match self
            .status_setter
            .set_status(assignment.line_id, line_status, "device", Some(source_detail))
            .await
        {
            Ok(line) => {
                info!(device_mac = %status.device_id, line_id = %line.id,
                    line_code = %line.code, new_status = %line_status,
                    "line status updated from device");
            }
            Err(err) => {
                error!(device_mac = %status.device_id, line_id = %assignment.line_id,
                    status = %line_status, %err, "failed to update line status from device");
            }
        }
    }

    /// `devices/+/input-change`: recorded for assigned devices only.
    /// Translating inputs into line status is a future policy hook.
    pub async fn handle_input_change(&self, payload: &[u8]) {
        let change: InputChangeMessage = match serde_json::from_slice(payload) {
            Ok(c) => c,
            Err(err) => {
                error!(%err, "failed to parse input change");
                return;
            }
        };

        let assignment = match self.devices.assignment_for_device(&change.device_id).await {
            Ok(Some(a)) => a,
            Ok(None) => {
                debug!(device_mac = %change.device_id, channel = change.channel,
                    "input change from unassigned device - ignoring");
                return;
            }
            Err(err) => {
                error!(%err, "failed to get device assignment");
                return;
            }
        };

        info!(device_mac = %change.device_id, line_id = %assignment.line_id,
            channel = change.channel, state = change.state,
            "input change from assigned device");
    }

    // ---------- Outbound commands ----------

    /// Asks the device to flash its identify LED.
    pub async fn identify(&self, mac: &str, duration_secs: i32) -> DomainResult<()> {
        self.send_command(mac, &DeviceCommand::flash_identify(duration_secs))
            .await
    }

    /// Pushes the line state to the device, uppercase on the wire.
    pub async fn set_line_state(&self, mac: &str, status: Status) -> DomainResult<()> {
        self.send_command(mac, &DeviceCommand::set_line_state(status.as_device_state()))
            .await
    }

    pub async fn send_command(&self, mac: &str, command: &DeviceCommand) -> DomainResult<()> {
        let payload = serde_json::to_vec(command).map_err(DomainError::internal)?;
        self.publisher
            .publish_raw(&device_command_topic(mac), payload)
            .await
    }
}
