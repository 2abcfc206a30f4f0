use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use domain::label::AssignLabelsRequest;
use domain::line::{CreateLineRequest, SetStatusRequest, UpdateLineRequest};
use domain::schedule::AssignScheduleRequest;

use crate::response::{self, ApiResult};
use crate::state::AppState;

use super::{parse_date, parse_id};

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult {
    let lines = state.lines.list().await?;
    Ok(response::list(lines))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLineRequest>,
) -> ApiResult {
    let line = state.lines.create(req).await?;
    Ok(response::created(line))
}

pub async fn get(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id)?;
    let line = state.lines.get_by_id(id).await?;
    Ok(response::ok(line))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateLineRequest>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let line = state.lines.update(id, req).await?;
    Ok(response::ok(line))
}

pub async fn delete(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id)?;
    state.lines.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let line = state.lines.set_status(id, req.status, "api", None).await?;
    Ok(response::ok(line))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    limit: Option<i64>,
}

pub async fn status_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let history = state
        .lines
        .status_history(id, query.limit.unwrap_or(100))
        .await?;
    Ok(response::list(history))
}

pub async fn get_labels(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id)?;
    let labels = state.labels.labels_for_line(id).await?;
    Ok(response::list(labels))
}

pub async fn assign_labels(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AssignLabelsRequest>,
) -> ApiResult {
    let id = parse_id(&id)?;
    state.labels.assign_to_line(id, req).await?;
    let labels = state.labels.labels_for_line(id).await?;
    Ok(response::list(labels))
}

pub async fn assign_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AssignScheduleRequest>,
) -> ApiResult {
    let id = parse_id(&id)?;
    state.schedules.assign_to_line(id, req.schedule_id).await?;
    let line = state.lines.get_by_id(id).await?;
    Ok(response::ok(line))
}

/// Device assigned to this line, with full device details. Raw JSON to
/// match the device surface.
pub async fn assigned_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = parse_id(&id)?;
    state.lines.get_by_id(id).await?;

    let Some(assignment) = state.devices.assignment_for_line(id).await? else {
        return Ok(axum::Json(serde_json::json!({
            "assigned": false,
            "device": null,
        }))
        .into_response());
    };

    let device = state.devices.get_by_mac(&assignment.device_mac).await?;

    Ok(axum::Json(serde_json::json!({
        "assigned": true,
        "device": device,
        "assignment": assignment,
    }))
    .into_response())
}

#[derive(Deserialize)]
pub struct EffectiveScheduleQuery {
    date: String,
}

pub async fn effective_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<EffectiveScheduleQuery>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let date = parse_date(&query.date)?;
    let effective = state.resolver.effective_schedule(id, date).await?;
    Ok(response::ok(effective))
}

#[derive(Deserialize)]
pub struct EffectiveScheduleRangeQuery {
    start_date: String,
    end_date: String,
}

pub async fn effective_schedule_range(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<EffectiveScheduleRangeQuery>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let start = parse_date(&query.start_date)?;
    let end = parse_date(&query.end_date)?;
    let effective = state.resolver.effective_schedule_range(id, start, end).await?;
    Ok(response::list(effective))
}
