use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use application::LineService;
use domain::compliance::{LineScheduleRef, StatusInterval};
use domain::device::{
    DeviceLineAssignment, DeviceUpsert, DeviceWithAssignment, DiscoveredDevice,
};
use domain::error::{DomainError, DomainResult};
use domain::event::EventPublisher;
use domain::line::{
    CreateLineRequest, ProductionLine, Status, StatusChange, UpdateLineRequest,
};
use domain::repository::{DeviceRepository, LineRepository, StatusLogRepository};

// ---------- Mocks ----------

#[derive(Default)]
struct MockLineRepo {
    lines: Mutex<HashMap<Uuid, ProductionLine>>,
}

impl MockLineRepo {
    fn with_line(line: ProductionLine) -> Arc<Self> {
        let repo = Self::default();
        repo.lines.lock().unwrap().insert(line.id, line);
        Arc::new(repo)
    }
}

#[async_trait]
impl LineRepository for MockLineRepo {
    async fn create(&self, req: &CreateLineRequest) -> DomainResult<ProductionLine> {
        let line = make_line(&req.code, Status::Off);
        self.lines.lock().unwrap().insert(line.id, line.clone());
        Ok(line)
    }

    async fn get_by_id(&self, id: Uuid) -> DomainResult<ProductionLine> {
        self.lines
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    async fn get_by_code(&self, code: &str) -> DomainResult<ProductionLine> {
        self.lines
            .lock()
            .unwrap()
            .values()
            .find(|l| l.code == code)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    async fn list(&self) -> DomainResult<Vec<ProductionLine>> {
        Ok(self.lines.lock().unwrap().values().cloned().collect())
    }

    async fn update(&self, id: Uuid, req: &UpdateLineRequest) -> DomainResult<ProductionLine> {
        let mut lines = self.lines.lock().unwrap();
        let line = lines.get_mut(&id).ok_or(DomainError::NotFound)?;
        if let Some(name) = &req.name {
            line.name = name.clone();
        }
        if let Some(description) = &req.description {
            line.description = Some(description.clone());
        }
        Ok(line.clone())
    }

    async fn update_status(&self, id: Uuid, status: Status) -> DomainResult<ProductionLine> {
        let mut lines = self.lines.lock().unwrap();
        let line = lines.get_mut(&id).ok_or(DomainError::NotFound)?;
        line.status = status;
        line.updated_at = Utc::now();
        Ok(line.clone())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        self.lines
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(DomainError::NotFound)
    }

    async fn list_schedule_refs(
        &self,
        _line_ids: &[Uuid],
        _label_ids: &[Uuid],
    ) -> DomainResult<Vec<LineScheduleRef>> {
        unimplemented!()
    }
}

#[derive(Default)]
struct MockStatusLog {
    entries: Mutex<Vec<StatusChange>>,
    fail_insert: AtomicBool,
}

#[async_trait]
impl StatusLogRepository for MockStatusLog {
    async fn insert(&self, change: &StatusChange) -> DomainResult<()> {
        if self.fail_insert.load(Ordering::Relaxed) {
            return Err(DomainError::Internal("simulated log failure".into()));
        }
        self.entries.lock().unwrap().push(change.clone());
        Ok(())
    }

    async fn history(&self, line_id: Uuid, _limit: i64) -> DomainResult<Vec<StatusChange>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.line_id == line_id)
            .cloned()
            .collect())
    }

    async fn intervals(
        &self,
        _line_id: Uuid,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> DomainResult<Vec<StatusInterval>> {
        unimplemented!()
    }
}

#[derive(Default)]
struct MockDeviceRepo {
    assignment: Mutex<Option<DeviceLineAssignment>>,
}

#[async_trait]
impl DeviceRepository for MockDeviceRepo {
    async fn assignment_for_line(
        &self,
        _line_id: Uuid,
    ) -> DomainResult<Option<DeviceLineAssignment>> {
        Ok(self.assignment.lock().unwrap().clone())
    }

    async fn upsert(&self, _device: &DeviceUpsert) -> DomainResult<DiscoveredDevice> {
        unimplemented!()
    }
    async fn get_by_mac(&self, _mac: &str) -> DomainResult<Option<DiscoveredDevice>> {
        unimplemented!()
    }
    async fn list(&self) -> DomainResult<Vec<DeviceWithAssignment>> {
        unimplemented!()
    }
    async fn mark_seen(&self, _mac: &str) -> DomainResult<()> {
        unimplemented!()
    }
    async fn mark_stale_offline(&self, _threshold: Duration) -> DomainResult<u64> {
        unimplemented!()
    }
    async fn assign_to_line(
        &self,
        _mac: &str,
        _line_id: Uuid,
        _assigned_by: Option<&str>,
    ) -> DomainResult<()> {
        unimplemented!()
    }
    async fn unassign(&self, _mac: &str) -> DomainResult<()> {
        unimplemented!()
    }
    async fn assignment_for_device(
        &self,
        _mac: &str,
    ) -> DomainResult<Option<DeviceLineAssignment>> {
        unimplemented!()
    }
}

#[derive(Default)]
struct MockPublisher {
    status_events: Mutex<Vec<(Uuid, Status)>>,
    raw_messages: Mutex<Vec<(String, Vec<u8>)>>,
    fail_status: AtomicBool,
}

#[async_trait]
impl EventPublisher for MockPublisher {
    async fn publish_created(&self, _line: &ProductionLine) -> DomainResult<()> {
        Ok(())
    }
    async fn publish_updated(&self, _line: &ProductionLine) -> DomainResult<()> {
        Ok(())
    }
    async fn publish_deleted(&self, _id: Uuid, _code: &str) -> DomainResult<()> {
        Ok(())
    }
    async fn publish_status(&self, line: &ProductionLine) -> DomainResult<()> {
        if self.fail_status.load(Ordering::Relaxed) {
            return Err(DomainError::Internal("simulated publish failure".into()));
        }
        self.status_events
            .lock()
            .unwrap()
            .push((line.id, line.status));
        Ok(())
    }
    async fn publish_raw(&self, topic: &str, payload: Vec<u8>) -> DomainResult<()> {
        self.raw_messages
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
        Ok(())
    }
}

fn make_line(code: &str, status: Status) -> ProductionLine {
    ProductionLine {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: format!("Line {code}"),
        description: None,
        status,
        schedule_id: None,
        labels: Vec::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    }
}

fn assignment_for(mac: &str, line_id: Uuid) -> DeviceLineAssignment {
    DeviceLineAssignment {
        id: Uuid::new_v4(),
        device_mac: mac.to_string(),
        line_id,
        assigned_at: Utc::now(),
        assigned_by: None,
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

struct Harness {
    service: LineService,
    log: Arc<MockStatusLog>,
    devices: Arc<MockDeviceRepo>,
    publisher: Arc<MockPublisher>,
}

fn harness(line: ProductionLine) -> Harness {
    let repo = MockLineRepo::with_line(line);
    let log = Arc::new(MockStatusLog::default());
    let devices = Arc::new(MockDeviceRepo::default());
    let publisher = Arc::new(MockPublisher::default());

    let service = LineService::new(
        repo,
        log.clone(),
        devices.clone(),
        publisher.clone(),
    );

    Harness {
        service,
        log,
        devices,
        publisher,
    }
}

// ---------- Tests ----------

#[tokio::test]
async fn test_set_status_is_idempotent() {
    let line = make_line("L1", Status::Off);
    let line_id = line.id;
    let h = harness(line);

    let first = h
        .service
        .set_status(line_id, Status::On, "api", None)
        .await
        .unwrap();
    assert_eq!(first.status, Status::On);

    let second = h
        .service
        .set_status(line_id, Status::On, "api", None)
        .await
        .unwrap();
    assert_eq!(second.status, Status::On);

    // Exactly one log entry, one event, no device traffic on the repeat.
    let entries = h.log.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].old_status, Some(Status::Off));
    assert_eq!(entries[0].new_status, Status::On);
    assert_eq!(entries[0].source, "api");

    assert_eq!(h.publisher.status_events.lock().unwrap().len(), 1);
    assert!(h.publisher.raw_messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_status_change_drives_tower_light() {
    let mac = "AA:BB:CC:DD:EE:01";
    let line = make_line("L1", Status::On);
    let line_id = line.id;
    let h = harness(line);
    *h.devices.assignment.lock().unwrap() = Some(assignment_for(mac, line_id));

    h.service
        .set_status(line_id, Status::Maintenance, "device", None)
        .await
        .unwrap();

    let messages = h.publisher.raw_messages.lock().unwrap();
    assert_eq!(messages.len(), 3);

    let mut states = Vec::new();
    for (topic, payload) in messages.iter() {
        assert_eq!(topic, &format!("devices/{mac}/command"));
        let cmd: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(cmd["command"], "set_output");
        states.push((
            cmd["channel"].as_i64().unwrap(),
            cmd["state"].as_bool().unwrap(),
        ));
    }

    // Maintenance lights channel 1 only.
    assert_eq!(states, vec![(0, false), (1, true), (2, false)]);
}

#[tokio::test]
async fn test_log_failure_does_not_revert_status() {
    let line = make_line("L1", Status::Off);
    let line_id = line.id;
    let h = harness(line);
    h.log.fail_insert.store(true, Ordering::Relaxed);

    let updated = h
        .service
        .set_status(line_id, Status::Error, "mqtt", None)
        .await
        .unwrap();

    assert_eq!(updated.status, Status::Error);
    // The event still goes out even though the audit append failed.
    assert_eq!(h.publisher.status_events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_publish_failure_is_swallowed() {
    let line = make_line("L1", Status::Off);
    let line_id = line.id;
    let h = harness(line);
    h.publisher.fail_status.store(true, Ordering::Relaxed);

    let updated = h
        .service
        .set_status(line_id, Status::On, "api", None)
        .await
        .unwrap();

    assert_eq!(updated.status, Status::On);
    assert_eq!(h.log.entries.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_set_status_unknown_line() {
    let h = harness(make_line("L1", Status::Off));

    let err = h
        .service
        .set_status(Uuid::new_v4(), Status::On, "api", None)
        .await
        .unwrap_err();

    assert_eq!(err, DomainError::NotFound);
}

#[tokio::test]
async fn test_create_validates_code_length() {
    let h = harness(make_line("L1", Status::Off));

    let err = h
        .service
        .create(CreateLineRequest {
            code: "x".repeat(51),
            name: "Line".into(),
            description: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Validation(_)));
}
