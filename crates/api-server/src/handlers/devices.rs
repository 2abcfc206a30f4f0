use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use domain::device::DeviceCommand;
use domain::DomainError;

use crate::response::{ApiResult, AppError};
use crate::state::AppState;

/// Device routes speak raw JSON, matching what the controllers and the
/// dashboard device panel exchange on the bus.
pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult {
    let devices = state.devices.list().await?;
    Ok(Json(devices).into_response())
}

pub async fn get(State(state): State<Arc<AppState>>, Path(mac): Path<String>) -> ApiResult {
    let device = state
        .devices
        .get_by_mac(&mac)
        .await?
        .ok_or(AppError(DomainError::DeviceNotFound))?;

    Ok(Json(device).into_response())
}

#[derive(Deserialize)]
pub struct AssignRequest {
    line_id: Uuid,
    #[serde(default)]
    assigned_by: Option<String>,
}

pub async fn assign(
    State(state): State<Arc<AppState>>,
    Path(mac): Path<String>,
    Json(req): Json<AssignRequest>,
) -> ApiResult {
    state
        .devices
        .get_by_mac(&mac)
        .await?
        .ok_or(AppError(DomainError::DeviceNotFound))?;

    state
        .devices
        .assign_to_line(&mac, req.line_id, req.assigned_by.as_deref())
        .await?;

    Ok(Json(json!({ "message": "Device assigned successfully" })).into_response())
}

pub async fn unassign(State(state): State<Arc<AppState>>, Path(mac): Path<String>) -> ApiResult {
    state.devices.unassign(&mac).await?;
    Ok(Json(json!({ "message": "Device unassigned successfully" })).into_response())
}

#[derive(Deserialize)]
pub struct IdentifyRequest {
    #[serde(default = "default_identify_duration")]
    duration: i32,
}

fn default_identify_duration() -> i32 {
    10
}

impl Default for IdentifyRequest {
    fn default() -> Self {
        Self {
            duration: default_identify_duration(),
        }
    }
}

pub async fn identify(
    State(state): State<Arc<AppState>>,
    Path(mac): Path<String>,
    body: Option<Json<IdentifyRequest>>,
) -> ApiResult {
    state
        .devices
        .get_by_mac(&mac)
        .await?
        .ok_or(AppError(DomainError::DeviceNotFound))?;

    let req = body.map(|Json(req)| req).unwrap_or_default();
    state.bridge.identify(&mac, req.duration).await?;

    Ok(Json(json!({ "message": "Flash command sent to device" })).into_response())
}

pub async fn send_command(
    State(state): State<Arc<AppState>>,
    Path(mac): Path<String>,
    Json(command): Json<DeviceCommand>,
) -> ApiResult {
    state
        .devices
        .get_by_mac(&mac)
        .await?
        .ok_or(AppError(DomainError::DeviceNotFound))?;

    state.bridge.send_command(&mac, &command).await?;

    Ok(Json(json!({ "message": "Command sent to device" })).into_response())
}
