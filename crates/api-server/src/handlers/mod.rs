pub mod analytics;
pub mod devices;
pub mod events;
pub mod health;
pub mod labels;
pub mod lines;
pub mod schedules;

use chrono::NaiveDate;
use uuid::Uuid;

use domain::DomainError;

use crate::response::AppError;

/// Path ids arrive as strings; a malformed UUID is a 400, not a 404.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError(DomainError::InvalidId))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError(DomainError::InvalidDateFormat))
}

/// Comma-separated UUID list query parameter.
pub(crate) fn parse_id_list(raw: Option<&str>) -> Result<Vec<Uuid>, AppError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Uuid::parse_str(s).map_err(|_| AppError(DomainError::InvalidId)))
        .collect()
}
