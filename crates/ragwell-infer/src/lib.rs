//! Ragwell Infer — embedding models, lazy loading, worker pool, embedding cache.
//!
//! `EmbeddingService` is the entry point. It owns a `ModelRegistry` of known
//! models, loads them on demand through a `ModelBackend` on a bounded
//! `WorkerPool`, and caches vectors per `(text, model)` in an `EmbeddingCache`.
//! When the `onnx` feature is enabled, `OnnxBackend` serves models from
//! `<data>/models`; without it every load fails and embeddings are unavailable.

pub mod backend;
pub mod benchmark;
pub mod cache;
pub mod loader;
pub mod onnx_embedder;
pub mod pool;
pub mod registry;
pub mod service;

#[cfg(test)]
mod testing;

pub use backend::{Embedding, ModelBackend, ModelHandle, UnavailableBackend};
pub use benchmark::{BenchmarkOutcome, BenchmarkReport, BenchmarkResult, ModelBenchmark};
pub use cache::{CacheStats, Clock, EmbeddingCache, SystemClock};
pub use pool::WorkerPool;
pub use registry::{ModelDescriptor, ModelInfo, ModelRegistry, ModelRuntimeState, ModelStatus};
pub use service::{BatchEmbedding, EmbeddingResult, EmbeddingService, ServiceStats};

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxBackend;

use std::path::Path;
use std::sync::Arc;

/// Create the model backend for the given models directory.
///
/// ONNX when the feature is enabled, otherwise a backend that refuses loads.
pub fn create_backend(models_dir: &Path) -> Arc<dyn ModelBackend> {
    #[cfg(feature = "onnx")]
    {
        tracing::info!("Using ONNX model backend ({})", models_dir.display());
        Arc::new(OnnxBackend::new(models_dir))
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = models_dir;
        tracing::warn!("ONNX feature disabled. Embedding models cannot be loaded.");
        Arc::new(UnavailableBackend::new("onnx feature disabled"))
    }
}
