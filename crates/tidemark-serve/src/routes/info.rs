//! Info endpoints: tags, groups, and device metadata.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::info;
use crate::routes::run_blocking;
use crate::state::AppState;

/// `GET /v1/info/tags`
///
/// Returns the tags section of the root metadata document.
pub async fn tags_list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let tags = run_blocking(move || Ok(state.meta.tags()?)).await?;
    Ok(Json(tags))
}

/// `GET /v1/info/groups`
///
/// Returns every group's record, devices included.
pub async fn groups_list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let groups = run_blocking(move || info::groups_info(&state)).await?;
    Ok(Json(json!({ "groups": groups })))
}

/// `GET /v1/info/groups/{group}/`
///
/// Returns the device records of one group.
pub async fn group_devices_list(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let devices = run_blocking(move || info::devices_info(&state, &group)).await?;
    Ok(Json(serde_json::to_value(devices).map_err(anyhow::Error::from)?))
}

/// `GET /v1/info/devices/{group}/{device}`
///
/// Returns one device's record.
pub async fn device_info(
    State(state): State<AppState>,
    Path((group, device)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let record = run_blocking(move || info::device_info(&state, &group, &device)).await?;
    Ok(Json(serde_json::to_value(record).map_err(anyhow::Error::from)?))
}
