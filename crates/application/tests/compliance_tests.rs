use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use application::compliance::{
    build_scheduled_periods, compliance_percentage, scheduled_hours, split_hours,
};
use application::{ComplianceService, ScheduleResolver};
use domain::compliance::{ComplianceQuery, LineScheduleRef, StatusInterval};
use domain::error::{DomainError, DomainResult};
use domain::line::{
    CreateLineRequest, ProductionLine, Status, StatusChange, UpdateLineRequest,
};
use domain::repository::{
    LineRepository, ResolvedDay, ResolvedHoliday, ScheduleRepository, StatusLogRepository,
};
use domain::schedule::{
    BreakInput, CreateExceptionRequest, CreateHolidayRequest, CreateLineExceptionRequest,
    CreateScheduleRequest, DayOfWeek, EffectiveBreak, EffectiveSchedule, LineScheduleException,
    Schedule, ScheduleBreak, ScheduleDay, ScheduleException, ScheduleHoliday, ScheduleSource,
    ScheduleSummary, UpdateDayRequest, UpdateExceptionRequest, UpdateHolidayRequest,
    UpdateLineExceptionRequest, UpdateScheduleRequest,
};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn at(date: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
    date.and_hms_opt(h, m, 0).unwrap().and_utc()
}

fn effective_day(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    breaks: Vec<EffectiveBreak>,
) -> EffectiveSchedule {
    EffectiveSchedule {
        line_id: Uuid::new_v4(),
        line_code: "L1".into(),
        date,
        schedule_id: Some(Uuid::new_v4()),
        schedule_name: None,
        source: ScheduleSource::Base,
        source_id: None,
        source_name: None,
        is_working_day: true,
        shift_start: Some(start),
        shift_end: Some(end),
        breaks,
    }
}

// ---------- Pure arithmetic ----------

#[test]
fn test_scheduled_hours_subtracts_breaks() {
    let es = effective_day(
        d(2024, 7, 1),
        t(8, 0),
        t(16, 0),
        vec![EffectiveBreak {
            name: Some("lunch".into()),
            break_start: t(12, 0),
            break_end: t(13, 0),
        }],
    );
    assert_eq!(scheduled_hours(&es), 7.0);
}

#[test]
fn test_scheduled_hours_overnight_shift() {
    let es = effective_day(d(2024, 7, 1), t(22, 0), t(6, 0), vec![]);
    assert_eq!(scheduled_hours(&es), 8.0);
}

#[test]
fn test_overnight_period_spans_midnight() {
    let es = effective_day(d(2024, 7, 1), t(22, 0), t(6, 0), vec![]);
    let periods = build_scheduled_periods(std::slice::from_ref(&es));
    assert_eq!(periods.len(), 1);
    assert_eq!(periods[0].0, at(d(2024, 7, 1), 22, 0));
    assert_eq!(periods[0].1, at(d(2024, 7, 2), 6, 0));
}

#[test]
fn test_split_hours_inside_and_outside() {
    let es = effective_day(d(2024, 7, 1), t(8, 0), t(16, 0), vec![]);
    let periods = build_scheduled_periods(std::slice::from_ref(&es));

    // 13:00-18:00 straddles the shift end.
    let (inside, outside) = split_hours(at(d(2024, 7, 1), 13, 0), at(d(2024, 7, 1), 18, 0), &periods);
    assert_eq!(inside, 3.0);
    assert_eq!(outside, 2.0);
}

#[test]
fn test_compliance_percentage_is_capped() {
    assert_eq!(compliance_percentage(10.0, 8.0), 100.0);
    assert_eq!(compliance_percentage(7.0, 8.0), 87.5);
    assert_eq!(compliance_percentage(4.0, 0.0), 0.0);
}

// ---------- Service over mocks ----------

struct FixtureLineRepo {
    refs: Vec<LineScheduleRef>,
}

#[async_trait]
impl LineRepository for FixtureLineRepo {
    async fn list_schedule_refs(
        &self,
        _line_ids: &[Uuid],
        _label_ids: &[Uuid],
    ) -> DomainResult<Vec<LineScheduleRef>> {
        Ok(self.refs.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> DomainResult<ProductionLine> {
        let line_ref = self
            .refs
            .iter()
            .find(|r| r.id == id)
            .ok_or(DomainError::NotFound)?;
        Ok(ProductionLine {
            id: line_ref.id,
            code: line_ref.code.clone(),
            name: line_ref.name.clone(),
            description: None,
            status: Status::Off,
            schedule_id: line_ref.schedule_id,
            labels: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        })
    }

    async fn create(&self, _req: &CreateLineRequest) -> DomainResult<ProductionLine> {
        unimplemented!()
    }
    async fn get_by_code(&self, _code: &str) -> DomainResult<ProductionLine> {
        unimplemented!()
    }
    async fn list(&self) -> DomainResult<Vec<ProductionLine>> {
        unimplemented!()
    }
    async fn update(&self, _id: Uuid, _req: &UpdateLineRequest) -> DomainResult<ProductionLine> {
        unimplemented!()
    }
    async fn update_status(&self, _id: Uuid, _status: Status) -> DomainResult<ProductionLine> {
        unimplemented!()
    }
    async fn delete(&self, _id: Uuid) -> DomainResult<()> {
        unimplemented!()
    }
}

struct FixtureStatusLog {
    intervals: Vec<StatusInterval>,
}

#[async_trait]
impl StatusLogRepository for FixtureStatusLog {
    async fn intervals(
        &self,
        _line_id: Uuid,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> DomainResult<Vec<StatusInterval>> {
        Ok(self.intervals.clone())
    }

    async fn insert(&self, _change: &StatusChange) -> DomainResult<()> {
        unimplemented!()
    }
    async fn history(&self, _line_id: Uuid, _limit: i64) -> DomainResult<Vec<StatusChange>> {
        unimplemented!()
    }
}

struct FixtureScheduleRepo {
    line: LineScheduleRef,
    base_days: HashMap<i16, ResolvedDay>,
}

#[async_trait]
impl ScheduleRepository for FixtureScheduleRepo {
    async fn line_schedule_ref(&self, _line_id: Uuid) -> DomainResult<LineScheduleRef> {
        Ok(self.line.clone())
    }
    async fn find_line_exception_day(
        &self,
        _schedule_id: Uuid,
        _line_id: Uuid,
        _date: NaiveDate,
        _dow: DayOfWeek,
    ) -> DomainResult<Option<ResolvedDay>> {
        Ok(None)
    }
    async fn find_exception_day(
        &self,
        _schedule_id: Uuid,
        _date: NaiveDate,
        _dow: DayOfWeek,
    ) -> DomainResult<Option<ResolvedDay>> {
        Ok(None)
    }
    async fn find_holiday(
        &self,
        _schedule_id: Uuid,
        _date: NaiveDate,
    ) -> DomainResult<Option<ResolvedHoliday>> {
        Ok(None)
    }
    async fn base_day(
        &self,
        _schedule_id: Uuid,
        dow: DayOfWeek,
    ) -> DomainResult<Option<ResolvedDay>> {
        Ok(self.base_days.get(&dow.0).cloned())
    }

    async fn create(&self, _req: &CreateScheduleRequest) -> DomainResult<Schedule> {
        unimplemented!()
    }
    async fn get_by_id(&self, _id: Uuid) -> DomainResult<Schedule> {
        unimplemented!()
    }
    async fn list(&self) -> DomainResult<Vec<ScheduleSummary>> {
        unimplemented!()
    }
    async fn update(&self, _id: Uuid, _req: &UpdateScheduleRequest) -> DomainResult<Schedule> {
        unimplemented!()
    }
    async fn delete(&self, _id: Uuid) -> DomainResult<()> {
        unimplemented!()
    }
    async fn get_day(&self, _day_id: Uuid) -> DomainResult<ScheduleDay> {
        unimplemented!()
    }
    async fn update_day(
        &self,
        _day_id: Uuid,
        _req: &UpdateDayRequest,
    ) -> DomainResult<ScheduleDay> {
        unimplemented!()
    }
    async fn set_day_breaks(
        &self,
        _day_id: Uuid,
        _breaks: &[BreakInput],
    ) -> DomainResult<Vec<ScheduleBreak>> {
        unimplemented!()
    }
    async fn holidays(
        &self,
        _schedule_id: Uuid,
        _year: Option<i32>,
    ) -> DomainResult<Vec<ScheduleHoliday>> {
        unimplemented!()
    }
    async fn create_holiday(
        &self,
        _schedule_id: Uuid,
        _req: &CreateHolidayRequest,
    ) -> DomainResult<ScheduleHoliday> {
        unimplemented!()
    }
    async fn get_holiday(&self, _holiday_id: Uuid) -> DomainResult<ScheduleHoliday> {
        unimplemented!()
    }
    async fn update_holiday(
        &self,
        _holiday_id: Uuid,
        _req: &UpdateHolidayRequest,
    ) -> DomainResult<ScheduleHoliday> {
        unimplemented!()
    }
    async fn delete_holiday(&self, _holiday_id: Uuid) -> DomainResult<()> {
        unimplemented!()
    }
    async fn exceptions(&self, _schedule_id: Uuid) -> DomainResult<Vec<ScheduleException>> {
        unimplemented!()
    }
    async fn create_exception(
        &self,
        _schedule_id: Uuid,
        _req: &CreateExceptionRequest,
    ) -> DomainResult<ScheduleException> {
        unimplemented!()
    }
    async fn get_exception(&self, _exception_id: Uuid) -> DomainResult<ScheduleException> {
        unimplemented!()
    }
    async fn update_exception(
        &self,
        _exception_id: Uuid,
        _req: &UpdateExceptionRequest,
    ) -> DomainResult<ScheduleException> {
        unimplemented!()
    }
    async fn delete_exception(&self, _exception_id: Uuid) -> DomainResult<()> {
        unimplemented!()
    }
    async fn line_exceptions(
        &self,
        _schedule_id: Uuid,
    ) -> DomainResult<Vec<LineScheduleException>> {
        unimplemented!()
    }
    async fn create_line_exception(
        &self,
        _schedule_id: Uuid,
        _req: &CreateLineExceptionRequest,
    ) -> DomainResult<LineScheduleException> {
        unimplemented!()
    }
    async fn get_line_exception(
        &self,
        _exception_id: Uuid,
    ) -> DomainResult<LineScheduleException> {
        unimplemented!()
    }
    async fn update_line_exception(
        &self,
        _exception_id: Uuid,
        _req: &UpdateLineExceptionRequest,
    ) -> DomainResult<LineScheduleException> {
        unimplemented!()
    }
    async fn delete_line_exception(&self, _exception_id: Uuid) -> DomainResult<()> {
        unimplemented!()
    }
    async fn assign_to_line(
        &self,
        _line_id: Uuid,
        _schedule_id: Option<Uuid>,
    ) -> DomainResult<()> {
        unimplemented!()
    }
    async fn lines_for_schedule(&self, _schedule_id: Uuid) -> DomainResult<Vec<ProductionLine>> {
        unimplemented!()
    }
}

fn service_for(
    line: LineScheduleRef,
    base_days: HashMap<i16, ResolvedDay>,
    intervals: Vec<StatusInterval>,
) -> ComplianceService {
    let resolver = Arc::new(ScheduleResolver::new(Arc::new(FixtureScheduleRepo {
        line: line.clone(),
        base_days,
    })));
    ComplianceService::new(
        Arc::new(FixtureLineRepo { refs: vec![line] }),
        Arc::new(FixtureStatusLog { intervals }),
        resolver,
    )
}

fn working_base(start: NaiveTime, end: NaiveTime, breaks: Vec<EffectiveBreak>) -> ResolvedDay {
    ResolvedDay {
        source_id: Uuid::new_v4(),
        source_name: None,
        is_working_day: true,
        shift_start: Some(start),
        shift_end: Some(end),
        breaks,
    }
}

fn line_ref() -> LineScheduleRef {
    LineScheduleRef {
        id: Uuid::new_v4(),
        code: "L1".into(),
        name: "Line 1".into(),
        schedule_id: Some(Uuid::new_v4()),
        schedule_name: Some("Default".into()),
    }
}

#[tokio::test]
async fn test_compliance_window_with_downtime_and_overtime() {
    // Working Monday 08:00-16:00. Log projects to: on 08-12, off 12-13,
    // on 13-18, off 18-24.
    let date = d(2024, 7, 1);
    let line = line_ref();
    let mut base_days = HashMap::new();
    base_days.insert(1, working_base(t(8, 0), t(16, 0), vec![]));

    let intervals = vec![
        StatusInterval {
            start: at(date, 8, 0),
            end: at(date, 12, 0),
            status: Status::On,
        },
        StatusInterval {
            start: at(date, 12, 0),
            end: at(date, 13, 0),
            status: Status::Off,
        },
        StatusInterval {
            start: at(date, 13, 0),
            end: at(date, 18, 0),
            status: Status::On,
        },
        StatusInterval {
            start: at(date, 18, 0),
            end: at(d(2024, 7, 2), 0, 0),
            status: Status::Off,
        },
    ];

    let service = service_for(line, base_days, intervals);
    let metrics = service
        .line_compliance(ComplianceQuery {
            start_date: date,
            end_date: date,
            line_ids: vec![],
            label_ids: vec![],
        })
        .await
        .unwrap();

    assert_eq!(metrics.len(), 1);
    let m = &metrics[0];
    assert_eq!(m.scheduled_uptime_hours, 8.0);
    assert_eq!(m.actual_uptime_hours, 7.0);
    assert_eq!(m.unplanned_downtime_hours, 1.0);
    assert_eq!(m.overtime_hours, 2.0);
    assert_eq!(m.compliance_percentage, 87.5);
}

#[tokio::test]
async fn test_outage_during_break_still_counts_as_downtime() {
    // Breaks reduce the scheduled hours but not the scheduled period, so
    // a stop wholly inside the lunch break is charged as downtime.
    let date = d(2024, 7, 1);
    let line = line_ref();
    let mut base_days = HashMap::new();
    base_days.insert(
        1,
        working_base(
            t(8, 0),
            t(16, 0),
            vec![EffectiveBreak {
                name: None,
                break_start: t(12, 0),
                break_end: t(13, 0),
            }],
        ),
    );

    let intervals = vec![
        StatusInterval {
            start: at(date, 8, 0),
            end: at(date, 12, 15),
            status: Status::On,
        },
        StatusInterval {
            start: at(date, 12, 15),
            end: at(date, 12, 45),
            status: Status::Off,
        },
        StatusInterval {
            start: at(date, 12, 45),
            end: at(date, 16, 0),
            status: Status::On,
        },
        StatusInterval {
            start: at(date, 16, 0),
            end: at(d(2024, 7, 2), 0, 0),
            status: Status::Off,
        },
    ];

    let service = service_for(line, base_days, intervals);
    let metrics = service
        .line_compliance(ComplianceQuery {
            start_date: date,
            end_date: date,
            line_ids: vec![],
            label_ids: vec![],
        })
        .await
        .unwrap();

    let m = &metrics[0];
    assert_eq!(m.scheduled_uptime_hours, 7.0);
    assert_eq!(m.unplanned_downtime_hours, 0.5);
}

#[tokio::test]
async fn test_maintenance_counts_as_unplanned_downtime() {
    let date = d(2024, 7, 1);
    let line = line_ref();
    let mut base_days = HashMap::new();
    base_days.insert(1, working_base(t(8, 0), t(16, 0), vec![]));

    let intervals = vec![
        StatusInterval {
            start: at(date, 8, 0),
            end: at(date, 14, 0),
            status: Status::On,
        },
        StatusInterval {
            start: at(date, 14, 0),
            end: at(date, 16, 0),
            status: Status::Maintenance,
        },
    ];

    let service = service_for(line, base_days, intervals);
    let metrics = service
        .line_compliance(ComplianceQuery {
            start_date: date,
            end_date: date,
            line_ids: vec![],
            label_ids: vec![],
        })
        .await
        .unwrap();

    assert_eq!(metrics[0].unplanned_downtime_hours, 2.0);
}

#[tokio::test]
async fn test_aggregate_averages_only_scheduled_lines() {
    // One line with a schedule at 87.5%, one without any schedule; the
    // average must ignore the unscheduled line.
    let date = d(2024, 7, 1);
    let scheduled_line = line_ref();
    let unscheduled_line = LineScheduleRef {
        id: Uuid::new_v4(),
        code: "L2".into(),
        name: "Line 2".into(),
        schedule_id: None,
        schedule_name: None,
    };

    let mut base_days = HashMap::new();
    base_days.insert(1, working_base(t(8, 0), t(16, 0), vec![]));

    let intervals = vec![
        StatusInterval {
            start: at(date, 8, 0),
            end: at(date, 15, 0),
            status: Status::On,
        },
        StatusInterval {
            start: at(date, 15, 0),
            end: at(d(2024, 7, 2), 0, 0),
            status: Status::Off,
        },
    ];

    let resolver = Arc::new(ScheduleResolver::new(Arc::new(FixtureScheduleRepo {
        line: scheduled_line.clone(),
        base_days,
    })));
    let service = ComplianceService::new(
        Arc::new(FixtureLineRepo {
            refs: vec![scheduled_line, unscheduled_line],
        }),
        Arc::new(FixtureStatusLog { intervals }),
        resolver,
    );

    let aggregate = service
        .aggregate_compliance(ComplianceQuery {
            start_date: date,
            end_date: date,
            line_ids: vec![],
            label_ids: vec![],
        })
        .await
        .unwrap();

    assert_eq!(aggregate.total_lines, 2);
    assert_eq!(aggregate.lines_with_schedule, 1);
    assert_eq!(aggregate.average_compliance, 87.5);
    assert_eq!(aggregate.total_overtime, 0.0);
}

#[tokio::test]
async fn test_range_longer_than_90_days_is_rejected() {
    let line = line_ref();
    let service = service_for(line, HashMap::new(), vec![]);

    let err = service
        .line_compliance(ComplianceQuery {
            start_date: d(2024, 1, 1),
            end_date: d(2024, 6, 1),
            line_ids: vec![],
            label_ids: vec![],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Validation(_)));
}
