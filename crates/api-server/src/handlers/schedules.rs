use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use domain::schedule::{
    CreateExceptionRequest, CreateHolidayRequest, CreateLineExceptionRequest,
    CreateScheduleRequest, SetBreaksRequest, UpdateDayRequest, UpdateExceptionRequest,
    UpdateHolidayRequest, UpdateLineExceptionRequest, UpdateScheduleRequest,
};

use crate::response::{self, ApiResult};
use crate::state::AppState;

use super::parse_id;

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult {
    let schedules = state.schedules.list().await?;
    Ok(response::list(schedules))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateScheduleRequest>,
) -> ApiResult {
    let schedule = state.schedules.create(req).await?;
    Ok(response::created(schedule))
}

pub async fn get(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id)?;
    let schedule = state.schedules.get_by_id(id).await?;
    Ok(response::ok(schedule))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateScheduleRequest>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let schedule = state.schedules.update(id, req).await?;
    Ok(response::ok(schedule))
}

pub async fn delete(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id)?;
    state.schedules.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn lines(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id)?;
    let lines = state.schedules.lines_for_schedule(id).await?;
    Ok(response::list(lines))
}

// ---------- Days ----------

pub async fn get_day(State(state): State<Arc<AppState>>, Path(day_id): Path<String>) -> ApiResult {
    let day_id = parse_id(&day_id)?;
    let day = state.schedules.get_day(day_id).await?;
    Ok(response::ok(day))
}

pub async fn update_day(
    State(state): State<Arc<AppState>>,
    Path(day_id): Path<String>,
    Json(req): Json<UpdateDayRequest>,
) -> ApiResult {
    let day_id = parse_id(&day_id)?;
    let day = state.schedules.update_day(day_id, req).await?;
    Ok(response::ok(day))
}

pub async fn set_day_breaks(
    State(state): State<Arc<AppState>>,
    Path(day_id): Path<String>,
    Json(req): Json<SetBreaksRequest>,
) -> ApiResult {
    let day_id = parse_id(&day_id)?;
    let breaks = state.schedules.set_day_breaks(day_id, req).await?;
    Ok(response::list(breaks))
}

// ---------- Holidays ----------

#[derive(Deserialize)]
pub struct HolidaysQuery {
    year: Option<i32>,
}

pub async fn holidays(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<HolidaysQuery>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let holidays = state.schedules.holidays(id, query.year).await?;
    Ok(response::list(holidays))
}

pub async fn create_holiday(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateHolidayRequest>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let holiday = state.schedules.create_holiday(id, req).await?;
    Ok(response::created(holiday))
}

pub async fn get_holiday(
    State(state): State<Arc<AppState>>,
    Path(holiday_id): Path<String>,
) -> ApiResult {
    let holiday_id = parse_id(&holiday_id)?;
    let holiday = state.schedules.get_holiday(holiday_id).await?;
    Ok(response::ok(holiday))
}

pub async fn update_holiday(
    State(state): State<Arc<AppState>>,
    Path(holiday_id): Path<String>,
    Json(req): Json<UpdateHolidayRequest>,
) -> ApiResult {
    let holiday_id = parse_id(&holiday_id)?;
    let holiday = state.schedules.update_holiday(holiday_id, req).await?;
    Ok(response::ok(holiday))
}

pub async fn delete_holiday(
    State(state): State<Arc<AppState>>,
    Path(holiday_id): Path<String>,
) -> ApiResult {
    let holiday_id = parse_id(&holiday_id)?;
    state.schedules.delete_holiday(holiday_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Deserialize)]
pub struct SuggestionsQuery {
    year: i32,
}

pub async fn suggested_holidays(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SuggestionsQuery>,
) -> ApiResult {
    let suggestions = state.schedules.suggested_holidays(query.year).await;
    Ok(response::ok(suggestions))
}

// ---------- Schedule exceptions ----------

pub async fn exceptions(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id)?;
    let exceptions = state.schedules.exceptions(id).await?;
    Ok(response::list(exceptions))
}

pub async fn create_exception(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateExceptionRequest>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let exception = state.schedules.create_exception(id, req).await?;
    Ok(response::created(exception))
}

pub async fn get_exception(
    State(state): State<Arc<AppState>>,
    Path(exception_id): Path<String>,
) -> ApiResult {
    let exception_id = parse_id(&exception_id)?;
    let exception = state.schedules.get_exception(exception_id).await?;
    Ok(response::ok(exception))
}

pub async fn update_exception(
    State(state): State<Arc<AppState>>,
    Path(exception_id): Path<String>,
    Json(req): Json<UpdateExceptionRequest>,
) -> ApiResult {
    let exception_id = parse_id(&exception_id)?;
    let exception = state.schedules.update_exception(exception_id, req).await?;
    Ok(response::ok(exception))
}

pub async fn delete_exception(
    State(state): State<Arc<AppState>>,
    Path(exception_id): Path<String>,
) -> ApiResult {
    let exception_id = parse_id(&exception_id)?;
    state.schedules.delete_exception(exception_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------- Line exceptions ----------

pub async fn line_exceptions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let exceptions = state.schedules.line_exceptions(id).await?;
    Ok(response::list(exceptions))
}

pub async fn create_line_exception(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateLineExceptionRequest>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let exception = state.schedules.create_line_exception(id, req).await?;
    Ok(response::created(exception))
}

pub async fn get_line_exception(
    State(state): State<Arc<AppState>>,
    Path(exception_id): Path<String>,
) -> ApiResult {
    let exception_id = parse_id(&exception_id)?;
    let exception = state.schedules.get_line_exception(exception_id).await?;
    Ok(response::ok(exception))
}

pub async fn update_line_exception(
    State(state): State<Arc<AppState>>,
    Path(exception_id): Path<String>,
    Json(req): Json<UpdateLineExceptionRequest>,
) -> ApiResult {
    let exception_id = parse_id(&exception_id)?;
    let exception = state
        .schedules
        .update_line_exception(exception_id, req)
        .await?;
    Ok(response::ok(exception))
}

pub async fn delete_line_exception(
    State(state): State<Arc<AppState>>,
    Path(exception_id): Path<String>,
) -> ApiResult {
    let exception_id = parse_id(&exception_id)?;
    state.schedules.delete_line_exception(exception_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
