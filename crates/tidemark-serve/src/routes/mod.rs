//! API route definitions.
//!
//! ## Routes
//!
//! - `GET /` - Redirect to the API root
//! - `GET /chart` - Static chart page
//! - `GET /v1/` - Directory of sub-resources
//! - `GET /v1/info/tags` - List tags
//! - `GET /v1/info/groups` - List groups and their devices
//! - `GET /v1/info/groups/{group}/` - List one group's devices
//! - `GET /v1/info/devices/{group}/{device}` - Device metadata
//! - `GET /v1/data/{group}/{device}[/{channel}]` - Query samples (streamed)
//! - `POST /v1/data/{group}/{device}` - Write samples for one device
//! - `POST /v1/data` - Bulk write across groups and devices

mod data;
mod info;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the complete API router.
pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/", get(directory))
        .route("/info/tags", get(info::tags_list))
        .route("/info/groups", get(info::groups_list))
        .route("/info/groups/{group}/", get(info::group_devices_list))
        .route("/info/devices/{group}/{device}", get(info::device_info))
        .route("/data", post(data::bulk_input))
        .route(
            "/data/{group}/{device}",
            get(data::device_data).post(data::device_input),
        )
        .route("/data/{group}/{device}/{channel}", get(data::channel_data));

    Router::new()
        .route("/", get(api_root))
        .route("/chart", get(chart))
        .nest("/v1", v1)
        .fallback(not_found)
        .with_state(state)
}

/// Unmatched paths get the JSON error envelope, not a framework error body.
async fn not_found() -> ApiError {
    ApiError::NotFound("resource not found".to_string())
}

/// Redirect the bare root to the versioned API.
async fn api_root() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/v1")])
}

/// Serve the static chart page from disk.
async fn chart(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    match tokio::fs::read_to_string(&state.config.chart_path).await {
        Ok(page) => Ok(Html(page)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound("chart page not found".to_string()))
        }
        Err(err) => Err(ApiError::Internal(err.into())),
    }
}

/// List the server directory.
async fn directory(State(state): State<AppState>) -> Json<serde_json::Value> {
    let base = &state.config.base_url;
    Json(json!({
        "directory": {
            "tags": format!("{base}/v1/info/tags"),
            "devices": format!("{base}/v1/info/groups"),
        }
    }))
}

/// Run blocking filesystem work off the async runtime.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?
}
