//! API error types and response formatting.
//!
//! Every domain error crosses the HTTP boundary here, serialized as the
//! uniform `{code, name, description}` envelope instead of the framework's
//! default error bodies. Handlers return typed errors; nothing sets a status
//! code ad hoc.

use std::collections::BTreeMap;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

/// Per-field validation messages, keyed by a dotted/indexed field path.
#[derive(Debug, Clone, Default)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Empty message map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one message against a field path.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Whether any message has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The map as a JSON value, for the error envelope's `description`.
    pub fn into_value(self) -> Value {
        let mut map = serde_json::Map::new();
        for (field, messages) in self.0 {
            map.insert(field, Value::from(messages));
        }
        Value::Object(map)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Requested group/device/channel/document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request body or query parameters failed schema checks.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// Storage engine or other internal failure.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<tidemark_core::Error> for ApiError {
    fn from(err: tidemark_core::Error) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else {
            ApiError::Internal(err.into())
        }
    }
}

impl From<tidemark_core::EngineError> for ApiError {
    fn from(err: tidemark_core::EngineError) -> Self {
        ApiError::Internal(err.into())
    }
}

/// JSON error envelope used for every non-2xx response.
#[derive(Debug, Clone, Serialize)]
struct ErrorEnvelope {
    code: u16,
    name: &'static str,
    description: Value,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, name, description) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", Value::String(msg)),
            Self::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Unprocessable Entity",
                errors.into_value(),
            ),
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    Value::String("An internal error occurred".to_string()),
                )
            }
        };

        let body = ErrorEnvelope {
            code: status.as_u16(),
            name,
            description,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_status() {
        let response = ApiError::NotFound("device 'hut/th1' not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_status() {
        let mut errors = FieldErrors::new();
        errors.push("start", "missing required parameter");
        let response = ApiError::Validation(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn internal_status() {
        let response = ApiError::Internal(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn core_not_found_maps_to_not_found() {
        let core = tidemark_core::Error::GroupNotFound {
            group: "hut".to_string(),
        };
        let err: ApiError = core.into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn core_engine_error_maps_to_internal() {
        let core = tidemark_core::Error::Engine(tidemark_core::EngineError::OutOfOrder);
        let err: ApiError = core.into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
