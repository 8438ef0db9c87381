//! Error types for Ragwell.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid model key: {0:?} (allowed: a-z, 0-9, '-', '_')")]
    InvalidModelKey(String),

    #[error("Failed to load model {model}: {cause}")]
    ModelLoad { model: String, cause: String },

    #[error("Embedding generation failed for model {model}: {cause}")]
    EmbeddingGeneration { model: String, cause: String },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the failure comes from the environment (backend, worker pool)
    /// rather than from the caller, so retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ModelLoad { .. } | Self::EmbeddingGeneration { .. } | Self::WorkerPool(_)
        )
    }

    /// Underlying cause for backend failures, if any.
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::ModelLoad { cause, .. } | Self::EmbeddingGeneration { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
