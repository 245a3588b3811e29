//! Tidemark Serve - HTTP API for the measurement hierarchy.
//!
//! This crate exposes the group/device/channel hierarchy resolved from a
//! directory tree and provides read/write access to per-device time-series
//! samples. Query responses are streamed as they are produced by the storage
//! engine; write payloads are validated, re-sorted into timestamp order, and
//! committed through the engine's write capability.
//!
//! # Architecture
//!
//! - **AppState**: Shared application state (metadata resolver, storage
//!   engine, configuration)
//! - **Routes**: Endpoint handlers for the info and data surfaces
//! - **Ingest**: Write-payload validation and the commit path
//! - **Stream**: Incremental JSON array encoding for query responses

mod error;
mod info;
mod ingest;
mod routes;
mod state;
mod stream;

pub use self::error::{ApiError, FieldErrors};
pub use self::routes::router;
pub use self::state::{AppState, Config};
