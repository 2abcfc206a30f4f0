use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use application::ScheduleResolver;
use domain::compliance::LineScheduleRef;
use domain::error::{DomainError, DomainResult};
use domain::line::ProductionLine;
use domain::repository::{ResolvedDay, ResolvedHoliday, ScheduleRepository};
use domain::schedule::{
    BreakInput, CreateExceptionRequest, CreateHolidayRequest, CreateLineExceptionRequest,
    CreateScheduleRequest, DayOfWeek, LineScheduleException, Schedule, ScheduleBreak,
    ScheduleDay, ScheduleException, ScheduleHoliday, ScheduleSource, ScheduleSummary,
    UpdateDayRequest, UpdateExceptionRequest, UpdateHolidayRequest, UpdateLineExceptionRequest,
    UpdateScheduleRequest,
};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct ExceptionFixture {
    start: NaiveDate,
    end: NaiveDate,
    line_ids: Vec<Uuid>,
    days: HashMap<i16, ResolvedDay>,
}

/// In-memory stand-in exposing only the resolver lookups; everything else
/// is unreachable in these tests.
#[derive(Default)]
struct FixtureScheduleRepo {
    line_id: Uuid,
    line_code: String,
    schedule_id: Option<Uuid>,
    base_days: HashMap<i16, ResolvedDay>,
    holidays: Vec<(NaiveDate, ResolvedHoliday)>,
    exceptions: Vec<ExceptionFixture>,
    line_exceptions: Vec<ExceptionFixture>,
}

fn working_day(start: NaiveTime, end: NaiveTime) -> ResolvedDay {
    ResolvedDay {
        source_id: Uuid::new_v4(),
        source_name: None,
        is_working_day: true,
        shift_start: Some(start),
        shift_end: Some(end),
        breaks: Vec::new(),
    }
}

fn rest_day() -> ResolvedDay {
    ResolvedDay {
        source_id: Uuid::new_v4(),
        source_name: None,
        is_working_day: false,
        shift_start: None,
        shift_end: None,
        breaks: Vec::new(),
    }
}

#[async_trait]
impl ScheduleRepository for FixtureScheduleRepo {
    async fn line_schedule_ref(&self, line_id: Uuid) -> DomainResult<LineScheduleRef> {
        if line_id != self.line_id {
            return Err(DomainError::NotFound);
        }
        Ok(LineScheduleRef {
            id: self.line_id,
            code: self.line_code.clone(),
            name: format!("Line {}", self.line_code),
            schedule_id: self.schedule_id,
            schedule_name: self.schedule_id.map(|_| "Default".to_string()),
        })
    }

    async fn find_line_exception_day(
        &self,
        _schedule_id: Uuid,
        line_id: Uuid,
        date: NaiveDate,
        dow: DayOfWeek,
    ) -> DomainResult<Option<ResolvedDay>> {
        Ok(self
            .line_exceptions
            .iter()
            .filter(|e| e.line_ids.contains(&line_id))
            .filter(|e| e.start <= date && date <= e.end)
            .find_map(|e| e.days.get(&dow.0).cloned()))
    }

    async fn find_exception_day(
        &self,
        _schedule_id: Uuid,
        date: NaiveDate,
        dow: DayOfWeek,
    ) -> DomainResult<Option<ResolvedDay>> {
        Ok(self
            .exceptions
            .iter()
            .filter(|e| e.start <= date && date <= e.end)
            .find_map(|e| e.days.get(&dow.0).cloned()))
    }

    async fn find_holiday(
        &self,
        _schedule_id: Uuid,
        date: NaiveDate,
    ) -> DomainResult<Option<ResolvedHoliday>> {
        Ok(self
            .holidays
            .iter()
            .find(|(holiday_date, _)| *holiday_date == date)
            .map(|(_, holiday)| ResolvedHoliday {
                id: holiday.id,
                name: holiday.name.clone(),
            }))
    }

    async fn base_day(
        &self,
        _schedule_id: Uuid,
        dow: DayOfWeek,
    ) -> DomainResult<Option<ResolvedDay>> {
        Ok(self.base_days.get(&dow.0).cloned())
    }

    // The resolver never touches the CRUD surface.
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

fn full_week(shift_start: NaiveTime, shift_end: NaiveTime) -> HashMap<i16, ResolvedDay> {
    let mut days = HashMap::new();
    for dow in 0..=6i16 {
        if dow == 0 || dow == 6 {
            days.insert(dow, rest_day());
        } else {
            days.insert(dow, working_day(shift_start, shift_end));
        }
    }
    days
}

#[tokio::test]
async fn test_line_exception_beats_schedule_exception() {
    // 2024-12-23 is a Monday. The schedule-wide exception declares the
    // week shut down, but a line exception reinstates a short shift for
    // this one line.
    let line_id = Uuid::new_v4();
    let mut repo = FixtureScheduleRepo {
        line_id,
        line_code: "L1".into(),
        schedule_id: Some(Uuid::new_v4()),
        base_days: full_week(t(8, 0), t(17, 0)),
        ..Default::default()
    };

    let mut shutdown_days = HashMap::new();
    shutdown_days.insert(1, rest_day());
    repo.exceptions.push(ExceptionFixture {
        start: d(2024, 12, 23),
        end: d(2024, 12, 27),
        line_ids: Vec::new(),
        days: shutdown_days,
    });

    let mut catchup_days = HashMap::new();
    catchup_days.insert(1, working_day(t(10, 0), t(14, 0)));
    repo.line_exceptions.push(ExceptionFixture {
        start: d(2024, 12, 23),
        end: d(2024, 12, 23),
        line_ids: vec![line_id],
        days: catchup_days,
    });

    let resolver = ScheduleResolver::new(Arc::new(repo));
    let effective = resolver
        .effective_schedule(line_id, d(2024, 12, 23))
        .await
        .unwrap();

    assert_eq!(effective.source, ScheduleSource::LineException);
    assert!(effective.is_working_day);
    assert_eq!(effective.shift_start, Some(t(10, 0)));
    assert_eq!(effective.shift_end, Some(t(14, 0)));
}

#[tokio::test]
async fn test_holiday_overrides_base_day() {
    // 2024-07-02 is a Tuesday with a working base day.
    let line_id = Uuid::new_v4();
    let mut repo = FixtureScheduleRepo {
        line_id,
        line_code: "L1".into(),
        schedule_id: Some(Uuid::new_v4()),
        base_days: full_week(t(8, 0), t(16, 0)),
        ..Default::default()
    };
    repo.holidays.push((
        d(2024, 7, 2),
        ResolvedHoliday {
            id: Uuid::new_v4(),
            name: Some("Plant Holiday".into()),
        },
    ));

    let resolver = ScheduleResolver::new(Arc::new(repo));
    let effective = resolver
        .effective_schedule(line_id, d(2024, 7, 2))
        .await
        .unwrap();

    assert_eq!(effective.source, ScheduleSource::Holiday);
    assert!(!effective.is_working_day);
    assert_eq!(effective.shift_start, None);
    assert_eq!(effective.source_name.as_deref(), Some("Plant Holiday"));
}

#[tokio::test]
async fn test_schedule_exception_overrides_holiday() {
    let line_id = Uuid::new_v4();
    let mut repo = FixtureScheduleRepo {
        line_id,
        line_code: "L2".into(),
        schedule_id: Some(Uuid::new_v4()),
        base_days: full_week(t(8, 0), t(16, 0)),
        ..Default::default()
    };

    // Holiday and a deliberate catch-up exception on the same Tuesday.
    repo.holidays.push((
        d(2024, 7, 2),
        ResolvedHoliday {
            id: Uuid::new_v4(),
            name: None,
        },
    ));
    let mut days = HashMap::new();
    days.insert(2, working_day(t(6, 0), t(12, 0)));
    repo.exceptions.push(ExceptionFixture {
        start: d(2024, 7, 1),
        end: d(2024, 7, 5),
        line_ids: Vec::new(),
        days,
    });

    let resolver = ScheduleResolver::new(Arc::new(repo));
    let effective = resolver
        .effective_schedule(line_id, d(2024, 7, 2))
        .await
        .unwrap();

    assert_eq!(effective.source, ScheduleSource::ScheduleException);
    assert!(effective.is_working_day);
}

#[tokio::test]
async fn test_no_schedule_yields_non_working_day() {
    let line_id = Uuid::new_v4();
    let repo = FixtureScheduleRepo {
        line_id,
        line_code: "L3".into(),
        schedule_id: None,
        ..Default::default()
    };

    let resolver = ScheduleResolver::new(Arc::new(repo));
    let effective = resolver
        .effective_schedule(line_id, d(2024, 7, 2))
        .await
        .unwrap();

    assert_eq!(effective.source, ScheduleSource::NoSchedule);
    assert!(!effective.is_working_day);
    assert!(effective.breaks.is_empty());
}

#[tokio::test]
async fn test_range_returns_one_result_per_day() {
    // Plain week: Monday 2024-07-01 through Sunday 2024-07-07.
    let line_id = Uuid::new_v4();
    let repo = FixtureScheduleRepo {
        line_id,
        line_code: "L1".into(),
        schedule_id: Some(Uuid::new_v4()),
        base_days: full_week(t(8, 0), t(16, 0)),
        ..Default::default()
    };

    let resolver = ScheduleResolver::new(Arc::new(repo));
    let results = resolver
        .effective_schedule_range(line_id, d(2024, 7, 1), d(2024, 7, 7))
        .await
        .unwrap();

    assert_eq!(results.len(), 7);

    let monday = &results[0];
    assert_eq!(monday.date, d(2024, 7, 1));
    assert_eq!(monday.source, ScheduleSource::Base);
    assert!(monday.is_working_day);
    assert_eq!(monday.shift_start, Some(t(8, 0)));
    assert_eq!(monday.shift_end, Some(t(16, 0)));

    // Sunday falls back to the non-working base day.
    assert!(!results[6].is_working_day);
}

#[tokio::test]
async fn test_range_rejects_inverted_dates() {
    let line_id = Uuid::new_v4();
    let repo = FixtureScheduleRepo {
        line_id,
        line_code: "L1".into(),
        schedule_id: None,
        ..Default::default()
    };

    let resolver = ScheduleResolver::new(Arc::new(repo));
    let err = resolver
        .effective_schedule_range(line_id, d(2024, 7, 7), d(2024, 7, 1))
        .await
        .unwrap_err();

    assert_eq!(err, DomainError::InvalidDateRange);
}
