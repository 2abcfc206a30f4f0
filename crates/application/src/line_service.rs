use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use domain::device::{device_command_topic, DeviceCommand};
use domain::error::{DomainError, DomainResult};
use domain::event::EventPublisher;
use domain::line::{
    CreateLineRequest, ProductionLine, Status, StatusChange, UpdateLineRequest,
};
use domain::repository::{DeviceRepository, LineRepository, StatusLogRepository};

/// Authoritative mutator for production lines. Status transitions fan out
/// to the audit log, the event bus and the assigned device; those side
/// effects are best-effort and never revert the committed transition.
pub struct LineService {
    lines: Arc<dyn LineRepository>,
    status_log: Arc<dyn StatusLogRepository>,
    devices: Arc<dyn DeviceRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl LineService {
    pub fn new(
        lines: Arc<dyn LineRepository>,
        status_log: Arc<dyn StatusLogRepository>,
        devices: Arc<dyn DeviceRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            lines,
            status_log,
            devices,
            publisher,
        }
    }

    pub async fn create(&self, req: CreateLineRequest) -> DomainResult<ProductionLine> {
        if req.code.is_empty() || req.code.len() > 50 {
            return Err(DomainError::Validation(
                "code is required and must be at most 50 characters".into(),
            ));
        }
        if req.name.is_empty() || req.name.len() > 255 {
            return Err(DomainError::Validation(
                "name is required and must be at most 255 characters".into(),
            ));
        }

        let line = self.lines.create(&req).await.map_err(|err| {
            error!(code = %req.code, %err, "failed to create production line");
            err
        })?;

        info!(id = %line.id, code = %line.code, name = %line.name, "production line created");

        if let Err(err) = self.publisher.publish_created(&line).await {
            error!(line_code = %line.code, %err, "failed to publish created event");
        }

        Ok(line)
    }

    pub async fn get_by_id(&self, id: Uuid) -> DomainResult<ProductionLine> {
        self.lines.get_by_id(id).await
    }

    pub async fn get_by_code(&self, code: &str) -> DomainResult<ProductionLine> {
        self.lines.get_by_code(code).await
    }

    pub async fn list(&self) -> DomainResult<Vec<ProductionLine>> {
        self.lines.list().await
    }

    pub async fn update(&self, id: Uuid, req: UpdateLineRequest) -> DomainResult<ProductionLine> {
        if let Some(name) = &req.name {
            if name.is_empty() || name.len() > 255 {
                return Err(DomainError::Validation(
                    "name must be at most 255 characters".into(),
                ));
            }
        }

        let line = self.lines.update(id, &req).await.map_err(|err| {
            error!(%id, %err, "failed to update production line");
            err
        })?;

        info!(id = %line.id, code = %line.code, "production line updated");

        if let Err(err) = self.publisher.publish_updated(&line).await {
            error!(line_code = %line.code, %err, "failed to publish updated event");
        }

        Ok(line)
    }

    pub async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let line = self.lines.get_by_id(id).await?;

        self.lines.delete(id).await.map_err(|err| {
            error!(%id, %err, "failed to delete production line");
            err
        })?;

        info!(%id, code = %line.code, "production line deleted");

        if let Err(err) = self.publisher.publish_deleted(id, &line.code).await {
            error!(line_code = %line.code, %err, "failed to publish deleted event");
        }

        Ok(())
    }

    /// Sets the line status. Idempotent: a repeated status yields no log
    /// entry, no event and no device command. Once the row update commits
    /// the operation has succeeded; log append, event publication and
    /// device sync failures are logged and swallowed.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: Status,
        source: &str,
        source_detail: Option<serde_json::Value>,
    ) -> DomainResult<ProductionLine> {
        let line = self.lines.get_by_id(id).await?;
        let old_status = line.status;

        if old_status == status {
            debug!(%id, code = %line.code, status = %status, "production line already in desired status");
            return Ok(line);
        }

        let line = self.lines.update_status(id, status).await.map_err(|err| {
            error!(%id, old_status = %old_status, new_status = %status, %err,
                "failed to update production line status");
            err
        })?;

        info!(id = %line.id, code = %line.code, old_status = %old_status,
            new_status = %status, source, "production line status changed");

        let change = StatusChange {
            time: Utc::now(),
            line_id: line.id,
            line_code: line.code.clone(),
            old_status: Some(old_status),
            new_status: status,
            source: source.to_string(),
            source_detail,
        };

        if let Err(err) = self.status_log.insert(&change).await {
            // The status row is already committed; history loses one entry.
            error!(line_code = %line.code, %err, "failed to log status change");
        }

        if let Err(err) = self.publisher.publish_status(&line).await {
            error!(line_code = %line.code, %err, "failed to publish status event");
        }

        if let Err(err) = self.sync_assigned_device(&line).await {
            error!(line_code = %line.code, line_id = %line.id, %err,
                "failed to sync device outputs");
        }

        Ok(line)
    }

    /// Drives the tower light of the device assigned to this line:
    /// channel 0 = running, channel 1 = maintenance, channel 2 = stopped
    /// or faulted.
    async fn sync_assigned_device(&self, line: &ProductionLine) -> DomainResult<()> {
        let Some(assignment) = self.devices.assignment_for_line(line.id).await? else {
            debug!(line_code = %line.code, "no device assigned to line");
            return Ok(());
        };

        info!(line_code = %line.code, device_mac = %assignment.device_mac,
            status = %line.status, "syncing tower light on assigned device");

        let topic = device_command_topic(&assignment.device_mac);
        let channels = [
            (0, line.status == Status::On),
            (1, line.status == Status::Maintenance),
            (2, matches!(line.status, Status::Off | Status::Error)),
        ];

        for (channel, state) in channels {
            let command = DeviceCommand::set_output(channel, state);
            let payload =
                serde_json::to_vec(&command).map_err(DomainError::internal)?;
            self.publisher.publish_raw(&topic, payload).await?;
        }

        Ok(())
    }

    pub async fn status_history(&self, id: Uuid, limit: i64) -> DomainResult<Vec<StatusChange>> {
        // Verify the line exists (and is not deleted) first.
        self.lines.get_by_id(id).await?;

        self.status_log.history(id, limit).await.map_err(|err| {
            error!(line_id = %id, %err, "failed to get status history");
            err
        })
    }
}
