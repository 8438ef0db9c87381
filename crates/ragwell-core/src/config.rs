//! Configuration and data directory management.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Model key used when no model has been switched to yet.
pub const DEFAULT_MODEL_KEY: &str = "all-minilm-l6-v2";
pub const DEFAULT_CACHE_SIZE: usize = 1000;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Paths to all Ragwell data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// ONNX model directories (`data/models/`).
    pub models: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            models: root.join("models"),
            root,
        };
        std::fs::create_dir_all(&paths.models)?;
        Ok(paths)
    }
}

/// Weights of the benchmark performance score:
/// `speed * min(1, 1/avg_time) + dimensionality * min(1, dims/reference_dimensions)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub speed: f64,
    pub dimensionality: f64,
    pub reference_dimensions: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            speed: 0.6,
            dimensionality: 0.4,
            reference_dimensions: 1000.0,
        }
    }
}

/// Settings for the embedding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model switched to on the first key-less request.
    pub default_model: String,
    /// Maximum number of cached vectors.
    pub cache_max_size: usize,
    /// Lifetime of a cached vector.
    pub cache_ttl: Duration,
    /// Number of blocking workers for model load/encode.
    pub worker_pool_size: usize,
    /// Batch size handed to the model when none is requested.
    pub default_batch_size: usize,
    pub score_weights: ScoreWeights,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL_KEY.into(),
            cache_max_size: DEFAULT_CACHE_SIZE,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            worker_pool_size: default_worker_pool_size(),
            default_batch_size: DEFAULT_BATCH_SIZE,
            score_weights: ScoreWeights::default(),
        }
    }
}

impl EmbeddingConfig {
    /// Build from defaults overridden by `RAGWELL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(model) = lookup("RAGWELL_EMBEDDING_MODEL") {
            config.default_model = model.trim().to_lowercase();
        }
        if let Some(size) = parse_var(&lookup, "RAGWELL_CACHE_SIZE")? {
            config.cache_max_size = size;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "RAGWELL_CACHE_TTL_SECS")? {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(workers) = parse_var(&lookup, "RAGWELL_WORKERS")? {
            config.worker_pool_size = workers;
        }
        if let Some(batch) = parse_var(&lookup, "RAGWELL_BATCH_SIZE")? {
            config.default_batch_size = batch;
        }

        config.validate()?;
        tracing::debug!(
            "Embedding config: model={} cache={}/{}s workers={} batch={}",
            config.default_model,
            config.cache_max_size,
            config.cache_ttl.as_secs(),
            config.worker_pool_size,
            config.default_batch_size
        );
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.worker_pool_size == 0 {
            return Err(Error::Config("worker pool size must be at least 1".into()));
        }
        if self.default_batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".into()));
        }
        if self.default_model.is_empty() {
            return Err(Error::Config("default model key is empty".into()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{name}: cannot parse {raw:?}"))),
    }
}

/// Half the cores, kept within 2..=4.
pub fn default_worker_pool_size() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores / 2).clamp(2, 4)
}

/// Top-level Ragwell configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagwellConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    pub embedding: EmbeddingConfig,
}

impl RagwellConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3003);

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            data_paths,
            embedding: EmbeddingConfig::from_env()?,
        })
    }
}
