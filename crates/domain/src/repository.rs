use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::analytics::{AggregateMetrics, DailyKPI, LabelMetrics, LineMetrics};
use crate::compliance::{LineScheduleRef, StatusInterval};
use crate::device::{DeviceLineAssignment, DeviceUpsert, DeviceWithAssignment, DiscoveredDevice};
use crate::error::DomainResult;
use crate::label::{CreateLabelRequest, Label, UpdateLabelRequest};
use crate::line::{CreateLineRequest, ProductionLine, Status, StatusChange, UpdateLineRequest};
use crate::schedule::{
    BreakInput, CreateExceptionRequest, CreateHolidayRequest, CreateLineExceptionRequest,
    CreateScheduleRequest, DayOfWeek, EffectiveBreak, LineScheduleException, Schedule,
    ScheduleBreak, ScheduleDay, ScheduleException, ScheduleHoliday, ScheduleSummary,
    SuggestedHoliday, UpdateDayRequest, UpdateExceptionRequest, UpdateHolidayRequest,
    UpdateLineExceptionRequest, UpdateScheduleRequest,
};

#[async_trait]
pub trait LineRepository: Send + Sync {
    async fn create(&self, req: &CreateLineRequest) -> DomainResult<ProductionLine>;
    async fn get_by_id(&self, id: Uuid) -> DomainResult<ProductionLine>;
    async fn get_by_code(&self, code: &str) -> DomainResult<ProductionLine>;
    async fn list(&self) -> DomainResult<Vec<ProductionLine>>;
    async fn update(&self, id: Uuid, req: &UpdateLineRequest) -> DomainResult<ProductionLine>;
    async fn update_status(&self, id: Uuid, status: Status) -> DomainResult<ProductionLine>;
    async fn delete(&self, id: Uuid) -> DomainResult<()>;
    /// Non-deleted lines with their schedule reference, optionally filtered
    /// by line ids and/or label ids, ordered by code.
    async fn list_schedule_refs(
        &self,
        line_ids: &[Uuid],
        label_ids: &[Uuid],
    ) -> DomainResult<Vec<LineScheduleRef>>;
}

#[async_trait]
pub trait StatusLogRepository: Send + Sync {
    async fn insert(&self, change: &StatusChange) -> DomainResult<()>;
    async fn history(&self, line_id: Uuid, limit: i64) -> DomainResult<Vec<StatusChange>>;
    /// Log rows in `[start, end)` projected to intervals: each row spans
    /// until the next row's time, the last until `end`.
    async fn intervals(
        &self,
        line_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<StatusInterval>>;
}

#[async_trait]
pub trait LabelRepository: Send + Sync {
    async fn create(&self, req: &CreateLabelRequest) -> DomainResult<Label>;
    async fn get_by_id(&self, id: Uuid) -> DomainResult<Label>;
    async fn list(&self) -> DomainResult<Vec<Label>>;
    async fn update(&self, id: Uuid, req: &UpdateLabelRequest) -> DomainResult<Label>;
    async fn delete(&self, id: Uuid) -> DomainResult<()>;
    /// Replaces the line's label set in one transaction.
    async fn assign_to_line(&self, line_id: Uuid, label_ids: &[Uuid]) -> DomainResult<()>;
    async fn labels_for_line(&self, line_id: Uuid) -> DomainResult<Vec<Label>>;
}

#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn upsert(&self, device: &DeviceUpsert) -> DomainResult<DiscoveredDevice>;
    async fn get_by_mac(&self, mac: &str) -> DomainResult<Option<DiscoveredDevice>>;
    async fn list(&self) -> DomainResult<Vec<DeviceWithAssignment>>;
    /// Liveness touch: refresh `last_seen` and flip status to online.
    async fn mark_seen(&self, mac: &str) -> DomainResult<()>;
    /// Marks online devices unseen for longer than `threshold` offline.
    /// Returns the number of affected rows.
    async fn mark_stale_offline(&self, threshold: Duration) -> DomainResult<u64>;
    async fn assign_to_line(
        &self,
        mac: &str,
        line_id: Uuid,
        assigned_by: Option<&str>,
    ) -> DomainResult<()>;
    async fn unassign(&self, mac: &str) -> DomainResult<()>;
    async fn assignment_for_device(&self, mac: &str)
        -> DomainResult<Option<DeviceLineAssignment>>;
    async fn assignment_for_line(
        &self,
        line_id: Uuid,
    ) -> DomainResult<Option<DeviceLineAssignment>>;
}

/// One matched day from an override layer or the base schedule, as consumed
/// by the effective-schedule resolver.
#[derive(Debug, Clone)]
pub struct ResolvedDay {
    pub source_id: Uuid,
    pub source_name: Option<String>,
    pub is_working_day: bool,
    pub shift_start: Option<NaiveTime>,
    pub shift_end: Option<NaiveTime>,
    pub breaks: Vec<EffectiveBreak>,
}

#[derive(Debug, Clone)]
pub struct ResolvedHoliday {
    pub id: Uuid,
    pub name: Option<String>,
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn create(&self, req: &CreateScheduleRequest) -> DomainResult<Schedule>;
    async fn get_by_id(&self, id: Uuid) -> DomainResult<Schedule>;
    async fn list(&self) -> DomainResult<Vec<ScheduleSummary>>;
    async fn update(&self, id: Uuid, req: &UpdateScheduleRequest) -> DomainResult<Schedule>;
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    async fn get_day(&self, day_id: Uuid) -> DomainResult<ScheduleDay>;
    async fn update_day(&self, day_id: Uuid, req: &UpdateDayRequest) -> DomainResult<ScheduleDay>;
    async fn set_day_breaks(
        &self,
        day_id: Uuid,
        breaks: &[BreakInput],
    ) -> DomainResult<Vec<ScheduleBreak>>;

    async fn holidays(
        &self,
        schedule_id: Uuid,
        year: Option<i32>,
    ) -> DomainResult<Vec<ScheduleHoliday>>;
    async fn create_holiday(
        &self,
        schedule_id: Uuid,
        req: &CreateHolidayRequest,
    ) -> DomainResult<ScheduleHoliday>;
    async fn get_holiday(&self, holiday_id: Uuid) -> DomainResult<ScheduleHoliday>;
    async fn update_holiday(
        &self,
        holiday_id: Uuid,
        req: &UpdateHolidayRequest,
    ) -> DomainResult<ScheduleHoliday>;
    async fn delete_holiday(&self, holiday_id: Uuid) -> DomainResult<()>;

    async fn exceptions(&self, schedule_id: Uuid) -> DomainResult<Vec<ScheduleException>>;
    async fn create_exception(
        &self,
        schedule_id: Uuid,
        req: &CreateExceptionRequest,
    ) -> DomainResult<ScheduleException>;
    async fn get_exception(&self, exception_id: Uuid) -> DomainResult<ScheduleException>;
    async fn update_exception(
        &self,
        exception_id: Uuid,
        req: &UpdateExceptionRequest,
    ) -> DomainResult<ScheduleException>;
    async fn delete_exception(&self, exception_id: Uuid) -> DomainResult<()>;

    async fn line_exceptions(&self, schedule_id: Uuid)
        -> DomainResult<Vec<LineScheduleException>>;
    async fn create_line_exception(
        &self,
        schedule_id: Uuid,
        req: &CreateLineExceptionRequest,
    ) -> DomainResult<LineScheduleException>;
    async fn get_line_exception(&self, exception_id: Uuid)
        -> DomainResult<LineScheduleException>;
    async fn update_line_exception(
        &self,
        exception_id: Uuid,
        req: &UpdateLineExceptionRequest,
    ) -> DomainResult<LineScheduleException>;
    async fn delete_line_exception(&self, exception_id: Uuid) -> DomainResult<()>;

    /// Assigns a schedule to a line; `None` unassigns.
    async fn assign_to_line(&self, line_id: Uuid, schedule_id: Option<Uuid>) -> DomainResult<()>;
    async fn lines_for_schedule(&self, schedule_id: Uuid) -> DomainResult<Vec<ProductionLine>>;

    // Resolver lookups. Each finds at most one match for the given date.
    async fn line_schedule_ref(&self, line_id: Uuid) -> DomainResult<LineScheduleRef>;
    async fn find_line_exception_day(
        &self,
        schedule_id: Uuid,
        line_id: Uuid,
        date: NaiveDate,
        dow: DayOfWeek,
    ) -> DomainResult<Option<ResolvedDay>>;
    async fn find_exception_day(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
        dow: DayOfWeek,
    ) -> DomainResult<Option<ResolvedDay>>;
    async fn find_holiday(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
    ) -> DomainResult<Option<ResolvedHoliday>>;
    async fn base_day(
        &self,
        schedule_id: Uuid,
        dow: DayOfWeek,
    ) -> DomainResult<Option<ResolvedDay>>;
}

/// External source of public-holiday suggestions. Returns the holidays
/// and whether they were served from cache.
#[async_trait]
pub trait HolidayProvider: Send + Sync {
    async fn public_holidays(
        &self,
        country_code: &str,
        year: i32,
    ) -> DomainResult<(Vec<SuggestedHoliday>, bool)>;
}

#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn aggregate_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        line_ids: &[Uuid],
        label_ids: &[Uuid],
    ) -> DomainResult<AggregateMetrics>;
    async fn line_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        line_ids: &[Uuid],
        label_ids: &[Uuid],
    ) -> DomainResult<Vec<LineMetrics>>;
    async fn label_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<LabelMetrics>>;
    async fn daily_kpis(
        &self,
        line_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<DailyKPI>>;
}
