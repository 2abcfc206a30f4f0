use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("production line not found")]
    NotFound,

    #[error("production line code already exists")]
    CodeExists,

    #[error("invalid status value")]
    InvalidStatus,

    #[error("invalid id format")]
    InvalidId,

    #[error("schedule not found")]
    ScheduleNotFound,

    #[error("schedule name already exists")]
    ScheduleNameExists,

    #[error("schedule day not found")]
    ScheduleDayNotFound,

    #[error("label not found")]
    LabelNotFound,

    #[error("label name already exists")]
    LabelNameExists,

    #[error("holiday not found")]
    HolidayNotFound,

    #[error("holiday date already exists for this schedule")]
    HolidayDateExists,

    #[error("schedule exception not found")]
    ExceptionNotFound,

    #[error("exception dates overlap with existing exception")]
    ExceptionDatesOverlap,

    #[error("line schedule exception not found")]
    LineExceptionNotFound,

    #[error("line exception overlaps for one or more lines")]
    LineExceptionLinesOverlap,

    #[error("device not found")]
    DeviceNotFound,

    #[error("invalid day of week value")]
    InvalidDayOfWeek,

    #[error("invalid time format")]
    InvalidTimeFormat,

    #[error("invalid date format")]
    InvalidDateFormat,

    #[error("invalid timezone")]
    InvalidTimezone,

    #[error("break times must fall within shift times")]
    BreakOutsideShift,

    #[error("breaks cannot overlap")]
    BreaksOverlap,

    #[error("working days must have shift times")]
    MissingShiftTimes,

    #[error("non-working days cannot have shift times")]
    UnexpectedShiftTimes,

    #[error("start date must be before or equal to end date")]
    InvalidDateRange,

    #[error("line exception must specify at least one line")]
    MissingLinesForException,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Internal(String),
}

impl DomainError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}

pub type DomainResult<T> = std::result::Result<T, DomainError>;
