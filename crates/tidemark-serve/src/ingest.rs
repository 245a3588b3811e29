//! Write-payload validation and the commit path.
//!
//! Incoming bodies are decoded (optionally gzip), parsed as JSON, and
//! validated into typed payloads. Validation never bails on the first
//! problem: it walks the whole payload and collects a message per offending
//! field, so a 422 response tells the client everything that is wrong at
//! once.
//!
//! Accepted timestamps are ISO-8601: RFC 3339 strings, or naive datetimes
//! which are taken as UTC.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use axum::http::{header, HeaderMap};
use chrono::{DateTime, NaiveDateTime, Utc};
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::Value;

use tidemark_core::StorageEngine;

use crate::error::{ApiError, FieldErrors};

fn single_error(field: &str, message: String) -> ApiError {
    let mut errors = FieldErrors::new();
    errors.push(field, message);
    ApiError::Validation(errors)
}

/// Undo gzip transfer encoding if the request declared it.
///
/// Runs before any schema parsing; a body that claims `Content-Encoding:
/// gzip` but does not inflate is a validation failure, not a schema one.
pub fn decode_body(headers: &HeaderMap, body: &[u8]) -> Result<Vec<u8>, ApiError> {
    let compressed = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("gzip"));

    if !compressed {
        return Ok(body.to_vec());
    }

    let mut decoded = Vec::new();
    GzDecoder::new(body)
        .read_to_end(&mut decoded)
        .map_err(|err| single_error("body", format!("invalid gzip payload: {err}")))?;
    Ok(decoded)
}

/// Parse a decoded body as JSON.
pub fn parse_json(body: &[u8]) -> Result<Value, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| single_error("body", format!("invalid JSON payload: {err}")))
}

/// Parse an ISO-8601 timestamp string.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }
    // Naive datetimes are taken as UTC.
    raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
}

/// One submitted observation: timestamp plus value vector.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    /// Instant the observation was taken.
    pub timestamp: DateTime<Utc>,
    /// One value per channel, in channel declaration order.
    pub values: Vec<f64>,
}

/// Validated single-device write payload.
#[derive(Debug, Clone)]
pub struct SingleWrite {
    /// Submission-time audit stamp. Logged, never stored with samples.
    pub sent: DateTime<Utc>,
    /// Submitted rows, in whatever order the client sent them.
    pub data: Vec<SampleRow>,
}

/// Validated bulk write payload: group → device → rows.
#[derive(Debug, Clone)]
pub struct BulkWrite {
    /// Submission-time audit stamp. Logged, never stored with samples.
    pub sent: DateTime<Utc>,
    /// Rows per device, keyed by group then device name.
    pub data: BTreeMap<String, BTreeMap<String, Vec<SampleRow>>>,
}

/// Validate a single-device write body:
/// `{sent: <timestamp>, data: [[<timestamp>, [<float>, ...]], ...]}`.
pub fn single_write(body: &Value) -> Result<SingleWrite, ApiError> {
    let mut errors = FieldErrors::new();

    let Some(object) = body.as_object() else {
        errors.push("body", "expected a JSON object");
        return Err(ApiError::Validation(errors));
    };

    let sent = object_timestamp(object, "sent", &mut errors);

    let data = match object.get("data") {
        Some(Value::Array(rows)) => parse_rows(rows, "data", &mut errors),
        Some(_) => {
            errors.push("data", "expected an array of [timestamp, values] pairs");
            Vec::new()
        }
        None => {
            errors.push("data", "missing required field");
            Vec::new()
        }
    };

    match sent {
        Some(sent) if errors.is_empty() => Ok(SingleWrite { sent, data }),
        _ => Err(ApiError::Validation(errors)),
    }
}

/// Validate a bulk write body:
/// `{sent: <timestamp>, data: {<group>: {<device>: [[<timestamp>, [<float>, ...]], ...]}}}`.
pub fn bulk_write(body: &Value) -> Result<BulkWrite, ApiError> {
    let mut errors = FieldErrors::new();

    let Some(object) = body.as_object() else {
        errors.push("body", "expected a JSON object");
        return Err(ApiError::Validation(errors));
    };

    let sent = object_timestamp(object, "sent", &mut errors);

    let mut data = BTreeMap::new();
    match object.get("data") {
        Some(Value::Object(groups)) => {
            for (group, devices) in groups {
                let Some(devices) = devices.as_object() else {
                    errors.push(format!("data.{group}"), "expected an object of devices");
                    continue;
                };

                let mut group_data = BTreeMap::new();
                for (device, rows) in devices {
                    let field = format!("data.{group}.{device}");
                    match rows {
                        Value::Array(rows) => {
                            group_data
                                .insert(device.clone(), parse_rows(rows, &field, &mut errors));
                        }
                        _ => errors
                            .push(field, "expected an array of [timestamp, values] pairs"),
                    }
                }
                data.insert(group.clone(), group_data);
            }
        }
        Some(_) => errors.push("data", "expected an object of groups"),
        None => errors.push("data", "missing required field"),
    }

    match sent {
        Some(sent) if errors.is_empty() => Ok(BulkWrite { sent, data }),
        _ => Err(ApiError::Validation(errors)),
    }
}

fn object_timestamp(
    object: &serde_json::Map<String, Value>,
    field: &str,
    errors: &mut FieldErrors,
) -> Option<DateTime<Utc>> {
    match object.get(field) {
        Some(Value::String(raw)) => match parse_timestamp(raw) {
            Some(timestamp) => Some(timestamp),
            None => {
                errors.push(field, "not a valid timestamp");
                None
            }
        },
        Some(_) => {
            errors.push(field, "not a valid timestamp");
            None
        }
        None => {
            errors.push(field, "missing required field");
            None
        }
    }
}

fn parse_rows(rows: &[Value], field: &str, errors: &mut FieldErrors) -> Vec<SampleRow> {
    let mut parsed = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        let pair = match row.as_array() {
            Some(pair) if pair.len() == 2 => pair,
            _ => {
                errors.push(
                    format!("{field}[{index}]"),
                    "expected a [timestamp, values] pair",
                );
                continue;
            }
        };

        let timestamp = match pair[0].as_str().and_then(parse_timestamp) {
            Some(timestamp) => timestamp,
            None => {
                errors.push(format!("{field}[{index}]"), "not a valid timestamp");
                continue;
            }
        };

        let Some(raw_values) = pair[1].as_array() else {
            errors.push(format!("{field}[{index}]"), "expected an array of numbers");
            continue;
        };

        let mut values = Vec::with_capacity(raw_values.len());
        let mut ok = true;
        for value in raw_values {
            match value.as_f64() {
                Some(value) => values.push(value),
                None => {
                    errors.push(format!("{field}[{index}]"), "not a valid number");
                    ok = false;
                    break;
                }
            }
        }

        if ok {
            parsed.push(SampleRow { timestamp, values });
        }
    }

    parsed
}

/// Require every row's value vector to match the device's declared channel
/// count.
pub fn check_vector_lengths(
    rows: &[SampleRow],
    channel_count: usize,
    field: &str,
) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();

    for (index, row) in rows.iter().enumerate() {
        if row.values.len() != channel_count {
            errors.push(
                format!("{field}[{index}]"),
                format!(
                    "expected {channel_count} values, got {}",
                    row.values.len()
                ),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Commit one device's rows through the engine's write capability.
///
/// The engine's append path assumes monotonically non-decreasing timestamps;
/// rows are re-sorted here whatever order the client submitted them in.
pub fn commit(
    engine: &dyn StorageEngine,
    device_dir: &Path,
    mut rows: Vec<SampleRow>,
) -> Result<(), ApiError> {
    rows.sort_by_key(|row| row.timestamp);

    let mut writer = engine.writer(device_dir)?;
    for row in &rows {
        writer.append(row.timestamp, &row.values)?;
    }
    writer.finish()?;
    Ok(())
}

/// Raw query parameters for data reads, validated by [`DataQuery::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDataQuery {
    /// Interval start, ISO-8601. Required.
    pub start: Option<String>,
    /// Interval stop, ISO-8601. Defaults to the request time.
    pub stop: Option<String>,
    /// Decimation stride, positive integer.
    pub step: Option<String>,
}

/// Validated data query: half-open interval plus optional stride.
#[derive(Debug, Clone, Copy)]
pub struct DataQuery {
    /// Interval start (inclusive).
    pub start: DateTime<Utc>,
    /// Interval stop (exclusive).
    pub stop: DateTime<Utc>,
    /// Decimation stride.
    pub step: Option<u32>,
}

impl DataQuery {
    /// Validate raw query parameters. A missing `stop` defaults to "now" at
    /// the moment of validation, never a cached value.
    pub fn validate(raw: &RawDataQuery) -> Result<Self, ApiError> {
        let mut errors = FieldErrors::new();

        let start = match raw.start.as_deref() {
            Some(raw_start) => match parse_timestamp(raw_start) {
                Some(start) => Some(start),
                None => {
                    errors.push("start", "not a valid timestamp");
                    None
                }
            },
            None => {
                errors.push("start", "missing required parameter");
                None
            }
        };

        let stop = match raw.stop.as_deref() {
            Some(raw_stop) => match parse_timestamp(raw_stop) {
                Some(stop) => Some(stop),
                None => {
                    errors.push("stop", "not a valid timestamp");
                    None
                }
            },
            None => Some(Utc::now()),
        };

        let step = match raw.step.as_deref() {
            Some(raw_step) => match raw_step.parse::<u32>() {
                Ok(step) if step >= 1 => Some(Some(step)),
                _ => {
                    errors.push("step", "not a valid positive integer");
                    None
                }
            },
            None => Some(None),
        };

        match (start, stop, step) {
            (Some(start), Some(stop), Some(step)) if errors.is_empty() => {
                Ok(Self { start, stop, step })
            }
            _ => Err(ApiError::Validation(errors)),
        }
    }
}
