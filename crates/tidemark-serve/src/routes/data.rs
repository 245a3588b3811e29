//! Data endpoints: streamed interval queries and sample writes.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::ApiError;
use crate::ingest::{self, DataQuery, RawDataQuery};
use crate::routes::run_blocking;
use crate::state::AppState;
use crate::stream;

/// `GET /v1/data/{group}/{device}`
///
/// Streams the device's samples in `[start, stop)` as a JSON array.
pub async fn device_data(
    State(state): State<AppState>,
    Path((group, device)): Path<(String, String)>,
    Query(raw): Query<RawDataQuery>,
) -> Result<Response, ApiError> {
    stream_query(state, group, device, None, raw).await
}

/// `GET /v1/data/{group}/{device}/{channel}`
///
/// Streams one channel's values: each sample's vector is projected down to
/// the component at the channel's declared index.
pub async fn channel_data(
    State(state): State<AppState>,
    Path((group, device, channel)): Path<(String, String, String)>,
    Query(raw): Query<RawDataQuery>,
) -> Result<Response, ApiError> {
    stream_query(state, group, device, Some(channel), raw).await
}

async fn stream_query(
    state: AppState,
    group: String,
    device: String,
    channel: Option<String>,
    raw: RawDataQuery,
) -> Result<Response, ApiError> {
    let query = DataQuery::validate(&raw)?;

    // Resolution happens before the response status is committed: an unknown
    // device or channel is a 404, not a broken stream.
    let points = run_blocking(move || {
        let device_dir = state.meta.device_dir(&group, &device)?;
        let channel_index = match &channel {
            Some(slug) => Some(state.meta.channel_index(&group, &device, slug)?),
            None => None,
        };

        let reader = state.engine.reader(&device_dir)?;
        let samples = reader.query_interval(query.start, query.stop, query.step)?;
        Ok(stream::project_samples(samples, channel_index))
    })
    .await?;

    let body = stream::stream_body(stream::JsArray::new(points));
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// `POST /v1/data/{group}/{device}`
///
/// Records samples for one device. The body is optionally gzip-compressed.
pub async fn device_input(
    State(state): State<AppState>,
    Path((group, device)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let decoded = ingest::decode_body(&headers, &body)?;
    let payload = ingest::single_write(&ingest::parse_json(&decoded)?)?;

    tracing::debug!(
        group = %group,
        device = %device,
        sent = %payload.sent,
        rows = payload.data.len(),
        "device write received"
    );

    run_blocking(move || {
        let config = state.meta.device_config(&group, &device)?;
        ingest::check_vector_lengths(&payload.data, config.channels.len(), "data")?;

        let device_dir = state.meta.device_dir(&group, &device)?;
        ingest::commit(state.engine.as_ref(), &device_dir, payload.data)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(json!({"message": "created"}))))
}

/// `POST /v1/data`
///
/// Records samples for many devices at once. Devices are written
/// independently in iteration order; the first failure aborts the loop and
/// earlier devices' writes stay committed.
pub async fn bulk_input(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let decoded = ingest::decode_body(&headers, &body)?;
    let payload = ingest::bulk_write(&ingest::parse_json(&decoded)?)?;

    tracing::debug!(
        sent = %payload.sent,
        groups = payload.data.len(),
        "bulk write received"
    );

    run_blocking(move || {
        for (group, devices) in payload.data {
            for (device, rows) in devices {
                let config = state.meta.device_config(&group, &device)?;
                ingest::check_vector_lengths(
                    &rows,
                    config.channels.len(),
                    &format!("data.{group}.{device}"),
                )?;

                let device_dir = state.meta.device_dir(&group, &device)?;
                ingest::commit(state.engine.as_ref(), &device_dir, rows)?;
            }
        }
        Ok(())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(json!({"message": "created"}))))
}
