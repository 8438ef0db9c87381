//! Shared application state.

use std::sync::Arc;
use std::time::Instant;

use ragwell_core::RagwellConfig;
use ragwell_infer::{EmbeddingService, ModelBackend};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: RagwellConfig,
    pub embeddings: EmbeddingService,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: RagwellConfig, backend: Arc<dyn ModelBackend>) -> Self {
        let embeddings = EmbeddingService::new(config.embedding.clone(), backend);
        Self {
            config,
            embeddings,
            started_at: Instant::now(),
        }
    }
}
