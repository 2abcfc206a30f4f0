use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use domain::DomainError;

/// Standard API envelope: `{data?, error?, meta?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub total: usize,
}

pub fn data<T: Serialize>(status: StatusCode, value: T) -> Response {
    (
        status,
        Json(Envelope {
            data: Some(value),
            error: None,
            meta: None,
        }),
    )
        .into_response()
}

pub fn ok<T: Serialize>(value: T) -> Response {
    data(StatusCode::OK, value)
}

pub fn created<T: Serialize>(value: T) -> Response {
    data(StatusCode::CREATED, value)
}

/// List responses carry their length in `meta.total` and always serialize
/// as an array, never null.
pub fn list<T: Serialize>(values: Vec<T>) -> Response {
    let total = values.len();
    (
        StatusCode::OK,
        Json(Envelope {
            data: Some(values),
            error: None,
            meta: Some(Meta { total }),
        }),
    )
        .into_response()
}

/// Wrapper that lets handlers bubble `DomainError` with `?`.
#[derive(Debug)]
pub struct AppError(pub DomainError);

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = classify(&self.0);

        let body = Envelope::<()> {
            data: None,
            error: Some(ApiError {
                code,
                message: self.0.to_string(),
            }),
            meta: None,
        };

        (status, Json(body)).into_response()
    }
}

fn classify(err: &DomainError) -> (StatusCode, &'static str) {
    use DomainError::*;

    match err {
        NotFound | ScheduleNotFound | ScheduleDayNotFound | LabelNotFound | HolidayNotFound
        | ExceptionNotFound | LineExceptionNotFound | DeviceNotFound => {
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        }
        CodeExists | ScheduleNameExists | LabelNameExists | HolidayDateExists
        | ExceptionDatesOverlap | LineExceptionLinesOverlap => (StatusCode::CONFLICT, "CONFLICT"),
        InvalidStatus => (StatusCode::BAD_REQUEST, "INVALID_STATUS"),
        InvalidId => (StatusCode::BAD_REQUEST, "INVALID_ID"),
        InvalidDayOfWeek | InvalidTimeFormat | InvalidDateFormat | InvalidTimezone
        | BreakOutsideShift | BreaksOverlap | MissingShiftTimes | UnexpectedShiftTimes
        | InvalidDateRange | MissingLinesForException | Validation(_) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
        }
        Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

pub type ApiResult = Result<Response, AppError>;
