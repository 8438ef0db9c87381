//! Ragwell Core — error taxonomy and configuration.

pub mod config;
pub mod error;

pub use config::{DataPaths, EmbeddingConfig, RagwellConfig, ScoreWeights};
pub use error::{Error, Result};
