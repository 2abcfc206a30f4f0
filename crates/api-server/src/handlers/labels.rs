use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use domain::label::{CreateLabelRequest, UpdateLabelRequest};

use crate::response::{self, ApiResult};
use crate::state::AppState;

use super::parse_id;

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult {
    let labels = state.labels.list().await?;
    Ok(response::list(labels))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLabelRequest>,
) -> ApiResult {
    let label = state.labels.create(req).await?;
    Ok(response::created(label))
}

pub async fn get(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id)?;
    let label = state.labels.get_by_id(id).await?;
    Ok(response::ok(label))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateLabelRequest>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let label = state.labels.update(id, req).await?;
    Ok(response::ok(label))
}

pub async fn delete(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id)?;
    state.labels.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
