//! Application state and configuration.

use std::path::PathBuf;
use std::sync::Arc;

use tidemark_core::{FlatFileEngine, MetaStore, StorageEngine};

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// Root of the metadata/data directory tree.
    pub data_dir: PathBuf,

    /// Base URL used for computed `url`/`data_url` fields in responses.
    pub base_url: String,

    /// Path to the static chart page.
    pub chart_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `TIDEMARK_DATA_DIR`: Root of the metadata/data directory tree
    ///
    /// Optional environment variables:
    /// - `TIDEMARK_BIND_ADDR`: Server bind address (default: "0.0.0.0:8080")
    /// - `TIDEMARK_BASE_URL`: Base URL for computed links (default:
    ///   "http://localhost:8080")
    /// - `TIDEMARK_CHART_PATH`: Static chart page (default: "static/chart.html")
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("TIDEMARK_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("TIDEMARK_DATA_DIR")
            .map(PathBuf::from)
            .map_err(|_| anyhow::anyhow!("TIDEMARK_DATA_DIR environment variable is required"))?;

        let base_url = std::env::var("TIDEMARK_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let chart_path = std::env::var("TIDEMARK_CHART_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("static/chart.html"));

        tracing::info!(
            bind_addr = %bind_addr,
            data_dir = %data_dir.display(),
            base_url = %base_url,
            chart_path = %chart_path.display(),
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            data_dir,
            base_url,
            chart_path,
        })
    }
}

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Metadata resolver rooted at the data directory.
    pub meta: MetaStore,

    /// Storage engine providing per-device read/write capabilities.
    pub engine: Arc<dyn StorageEngine>,

    /// Application configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Create application state backed by the default flat-file engine.
    pub fn new(config: Config) -> Self {
        Self::with_engine(config, Arc::new(FlatFileEngine))
    }

    /// Create application state with an explicit storage engine.
    pub fn with_engine(config: Config, engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            meta: MetaStore::new(config.data_dir.clone()),
            engine,
            config: Arc::new(config),
        }
    }
}
