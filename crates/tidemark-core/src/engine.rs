//! Storage-engine capability traits.
//!
//! Durable sample persistence is owned by an engine reached through two
//! narrow capabilities: a read handle yielding time-ordered samples for an
//! interval, and a write handle accepting ordered appends. The facade never
//! sees the on-disk format; it resolves a device's directory and asks the
//! engine for a handle over it.
//!
//! Handles are scoped: a read handle turns into a lazy iterator whose drop
//! releases any underlying file handles, so resources are reclaimed on every
//! exit path including a client disconnecting mid-stream.

use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::sample::Sample;

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors raised by a storage engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// I/O failure in the engine's files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be decoded.
    #[error("corrupt sample record: {0}")]
    Corrupt(String),

    /// An append arrived with a timestamp earlier than the previous one.
    #[error("appends must arrive in non-decreasing timestamp order")]
    OutOfOrder,
}

/// Lazy, time-ordered stream of samples produced by a read handle.
pub type SampleIter = Box<dyn Iterator<Item = EngineResult<Sample>> + Send>;

/// Scoped read capability over one device's samples.
pub trait ReadHandle: Send {
    /// Samples in `[start, stop)` in ascending timestamp order.
    ///
    /// `step` decimates the result: only every `step`-th sample of the
    /// interval is yielded. Consumes the handle; dropping the returned
    /// iterator releases the underlying resources.
    fn query_interval(
        self: Box<Self>,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        step: Option<u32>,
    ) -> EngineResult<SampleIter>;
}

/// Scoped write capability over one device's samples.
pub trait WriteHandle: Send {
    /// Append one sample. Calls must arrive in non-decreasing timestamp
    /// order; the engine does not re-sort.
    fn append(&mut self, timestamp: DateTime<Utc>, values: &[f64]) -> EngineResult<()>;

    /// Flush and release the handle, surfacing any deferred I/O errors.
    fn finish(self: Box<Self>) -> EngineResult<()>;
}

/// Factory for per-device read and write handles.
pub trait StorageEngine: Send + Sync {
    /// Open a read handle over the device stored at `device_dir`.
    fn reader(&self, device_dir: &Path) -> EngineResult<Box<dyn ReadHandle>>;

    /// Open a write handle over the device stored at `device_dir`.
    fn writer(&self, device_dir: &Path) -> EngineResult<Box<dyn WriteHandle>>;
}
