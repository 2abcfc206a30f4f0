use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Day of week, 0=Sunday .. 6=Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayOfWeek(pub i16);

impl DayOfWeek {
    pub fn is_valid(&self) -> bool {
        (0..=6).contains(&self.0)
    }

    pub fn of(date: NaiveDate) -> DayOfWeek {
        DayOfWeek(date.weekday().num_days_from_sunday() as i16)
    }
}

/// A reusable weekly pattern with holidays and overrides, assignable to lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timezone: String,
    #[serde(default)]
    pub days: Vec<ScheduleDay>,
    #[serde(default)]
    pub holidays: Vec<ScheduleHoliday>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDay {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub is_working_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift_start: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift_end: Option<NaiveTime>,
    #[serde(default)]
    pub breaks: Vec<ScheduleBreak>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleBreak {
    pub id: Uuid,
    pub schedule_day_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub break_start: NaiveTime,
    pub break_end: NaiveTime,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleHoliday {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub holiday_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A date-range override of the base schedule, applying to every line on
/// the schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleException {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub days: Vec<ExceptionDay>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// As `ScheduleException`, but scoped to an explicit set of lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineScheduleException {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub line_ids: Vec<Uuid>,
    #[serde(default)]
    pub days: Vec<ExceptionDay>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One day of an exception period. Structurally identical to a base
/// `ScheduleDay` so the resolver treats all layers uniformly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionDay {
    pub id: Uuid,
    pub exception_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub is_working_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift_start: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift_end: Option<NaiveTime>,
    #[serde(default)]
    pub breaks: Vec<ExceptionBreak>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionBreak {
    pub id: Uuid,
    pub exception_day_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub break_start: NaiveTime,
    pub break_end: NaiveTime,
    pub created_at: DateTime<Utc>,
}

/// Where the effective schedule for a given day came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleSource {
    NoSchedule,
    Base,
    Holiday,
    ScheduleException,
    LineException,
}

impl ScheduleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleSource::NoSchedule => "no_schedule",
            ScheduleSource::Base => "base",
            ScheduleSource::Holiday => "holiday",
            ScheduleSource::ScheduleException => "schedule_exception",
            ScheduleSource::LineException => "line_exception",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveBreak {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub break_start: NaiveTime,
    pub break_end: NaiveTime,
}

/// The resolved shift/break description for a line on a date. Computed,
/// never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveSchedule {
    pub line_id: Uuid,
    pub line_code: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_name: Option<String>,
    pub source: ScheduleSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    pub is_working_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift_start: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift_end: Option<NaiveTime>,
    pub breaks: Vec<EffectiveBreak>,
}

/// Summary view for schedule list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timezone: String,
    pub line_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------- Requests ----------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateScheduleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub timezone: String,
    pub days: Vec<DayInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DayInput {
    pub day_of_week: DayOfWeek,
    pub is_working_day: bool,
    #[serde(default)]
    pub shift_start: Option<NaiveTime>,
    #[serde(default)]
    pub shift_end: Option<NaiveTime>,
    #[serde(default)]
    pub breaks: Vec<BreakInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakInput {
    #[serde(default)]
    pub name: Option<String>,
    pub break_start: NaiveTime,
    pub break_end: NaiveTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateScheduleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDayRequest {
    #[serde(default)]
    pub is_working_day: Option<bool>,
    #[serde(default)]
    pub shift_start: Option<NaiveTime>,
    #[serde(default)]
    pub shift_end: Option<NaiveTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetBreaksRequest {
    pub breaks: Vec<BreakInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateHolidayRequest {
    pub holiday_date: NaiveDate,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateHolidayRequest {
    #[serde(default)]
    pub holiday_date: Option<NaiveDate>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateExceptionRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Vec<DayInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateExceptionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLineExceptionRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub line_ids: Vec<Uuid>,
    pub days: Vec<DayInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLineExceptionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub line_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignScheduleRequest {
    pub schedule_id: Option<Uuid>,
}

// ---------- Holiday suggestions ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedHoliday {
    pub date: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub nationwide: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedHolidaysResponse {
    pub holidays: Vec<SuggestedHoliday>,
    pub country_code: String,
    pub year: i32,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------- Validation helpers ----------

/// Span of a shift or break in minutes, treating end < start as crossing
/// midnight.
pub fn wrapped_span_minutes(start: NaiveTime, end: NaiveTime) -> i64 {
    let start_min = start.signed_duration_since(NaiveTime::MIN).num_minutes();
    let end_min = end.signed_duration_since(NaiveTime::MIN).num_minutes();
    if end_min < start_min {
        end_min + 24 * 60 - start_min
    } else {
        end_min - start_min
    }
}

/// Validates one day's shape: working days need both shift times, the rest
/// must have none; breaks must lie within the shift and be pairwise
/// disjoint (overnight wrap considered).
pub fn validate_day(day: &DayInput) -> DomainResult<()> {
    if !day.day_of_week.is_valid() {
        return Err(DomainError::InvalidDayOfWeek);
    }

    let (start, end) = match (day.is_working_day, day.shift_start, day.shift_end) {
        (true, Some(s), Some(e)) => (s, e),
        (true, _, _) => return Err(DomainError::MissingShiftTimes),
        (false, None, None) => return Ok(()),
        (false, _, _) => return Err(DomainError::UnexpectedShiftTimes),
    };

    let shift_len = wrapped_span_minutes(start, end);

    // Offset of a time into the shift, in minutes from shift start.
    let offset = |t: NaiveTime| -> i64 {
        let mut o = t.signed_duration_since(NaiveTime::MIN).num_minutes()
            - start.signed_duration_since(NaiveTime::MIN).num_minutes();
        if o < 0 {
            o += 24 * 60;
        }
        o
    };

    let mut spans: Vec<(i64, i64)> = Vec::with_capacity(day.breaks.len());
    for brk in &day.breaks {
        let b_start = offset(brk.break_start);
        let b_len = wrapped_span_minutes(brk.break_start, brk.break_end);
        if b_len == 0 {
            return Err(DomainError::Validation(
                "break start must differ from break end".into(),
            ));
        }
        if b_start + b_len > shift_len {
            return Err(DomainError::BreakOutsideShift);
        }
        spans.push((b_start, b_start + b_len));
    }

    spans.sort();
    for pair in spans.windows(2) {
        if pair[1].0 < pair[0].1 {
            return Err(DomainError::BreaksOverlap);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn working_day(breaks: Vec<BreakInput>) -> DayInput {
        DayInput {
            day_of_week: DayOfWeek(1),
            is_working_day: true,
            shift_start: Some(t(8, 0)),
            shift_end: Some(t(16, 0)),
            breaks,
        }
    }

    #[test]
    fn test_day_of_week_of_date() {
        // 2024-12-23 is a Monday.
        let date = NaiveDate::from_ymd_opt(2024, 12, 23).unwrap();
        assert_eq!(DayOfWeek::of(date), DayOfWeek(1));
        // 2024-07-07 is a Sunday.
        let sunday = NaiveDate::from_ymd_opt(2024, 7, 7).unwrap();
        assert_eq!(DayOfWeek::of(sunday), DayOfWeek(0));
    }

    #[test]
    fn test_working_day_requires_shift_times() {
        let mut day = working_day(vec![]);
        day.shift_end = None;
        assert_eq!(validate_day(&day), Err(DomainError::MissingShiftTimes));

        let rest_day = DayInput {
            day_of_week: DayOfWeek(0),
            is_working_day: false,
            shift_start: Some(t(8, 0)),
            shift_end: None,
            breaks: vec![],
        };
        assert_eq!(
            validate_day(&rest_day),
            Err(DomainError::UnexpectedShiftTimes)
        );
    }

    #[test]
    fn test_break_must_fit_inside_shift() {
        let day = working_day(vec![BreakInput {
            name: None,
            break_start: t(15, 30),
            break_end: t(16, 30),
        }]);
        assert_eq!(validate_day(&day), Err(DomainError::BreakOutsideShift));
    }

    #[test]
    fn test_breaks_must_not_overlap() {
        let day = working_day(vec![
            BreakInput {
                name: None,
                break_start: t(12, 0),
                break_end: t(12, 45),
            },
            BreakInput {
                name: None,
                break_start: t(12, 30),
                break_end: t(13, 0),
            },
        ]);
        assert_eq!(validate_day(&day), Err(DomainError::BreaksOverlap));
    }

    #[test]
    fn test_overnight_shift_with_midnight_break() {
        let day = DayInput {
            day_of_week: DayOfWeek(5),
            is_working_day: true,
            shift_start: Some(t(22, 0)),
            shift_end: Some(t(6, 0)),
            breaks: vec![BreakInput {
                name: Some("lunch".into()),
                break_start: t(23, 45),
                break_end: t(0, 15),
            }],
        };
        assert_eq!(validate_day(&day), Ok(()));
        assert_eq!(wrapped_span_minutes(t(22, 0), t(6, 0)), 8 * 60);
        assert_eq!(wrapped_span_minutes(t(23, 45), t(0, 15)), 30);
    }
}
