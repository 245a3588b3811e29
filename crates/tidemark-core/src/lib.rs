//! Core types, metadata resolution, and storage capabilities for Tidemark.
//!
//! This crate provides:
//! - The measurement hierarchy model (groups, devices, channels) resolved
//!   from a directory tree of metadata documents
//! - The `Sample` value type and its record codec
//! - Capability traits for the external storage engine (scoped read and
//!   write handles over per-device sample logs)
//! - A minimal flat-file engine implementing those capabilities
//! - Shared error types

mod error;
pub mod engine;
pub mod meta;
mod sample;
pub mod store;

pub use error::{Error, Result};
pub use engine::{EngineError, EngineResult, ReadHandle, SampleIter, StorageEngine, WriteHandle};
pub use meta::{ChannelConfig, DeviceConfig, GroupConfig, MetaStore, INFO_FILENAME};
pub use sample::Sample;
pub use store::FlatFileEngine;
