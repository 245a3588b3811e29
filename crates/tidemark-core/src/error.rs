//! Error types shared across the Tidemark crates.

use thiserror::Error;

use crate::engine::EngineError;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving metadata or touching storage.
///
/// The first four variants describe entities a client asked for that do not
/// exist on disk; the HTTP layer maps them to 404. The remaining variants are
/// operator or storage faults and stay opaque to clients.
#[derive(Error, Debug)]
pub enum Error {
    /// Group directory or its metadata document is missing.
    #[error("group '{group}' not found")]
    GroupNotFound {
        /// The requested group name.
        group: String,
    },

    /// Device directory or its metadata document is missing.
    #[error("device '{group}/{device}' not found")]
    DeviceNotFound {
        /// The group the device was looked up in.
        group: String,
        /// The requested device name.
        device: String,
    },

    /// Channel slug not declared by the device.
    #[error("channel '{channel}' not found on device '{group}/{device}'")]
    ChannelNotFound {
        /// The group the device belongs to.
        group: String,
        /// The device whose channels were searched.
        device: String,
        /// The slug that matched no declared channel.
        channel: String,
    },

    /// A required metadata document is absent (or, for the root document,
    /// unreadable).
    #[error("metadata document not found: {0}")]
    MetadataNotFound(String),

    /// A metadata document exists but failed to parse.
    #[error("malformed metadata document '{path}': {source}")]
    MetadataParse {
        /// Path of the offending document.
        path: String,
        /// The underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// Storage engine failure.
    #[error("storage engine error: {0}")]
    Engine(#[from] EngineError),

    /// I/O error outside the storage engine (directory listing etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error names a missing entity (as opposed to an internal
    /// fault). Missing entities surface to clients as 404s.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::GroupNotFound { .. }
                | Error::DeviceNotFound { .. }
                | Error::ChannelNotFound { .. }
                | Error::MetadataNotFound(_)
        )
    }
}
