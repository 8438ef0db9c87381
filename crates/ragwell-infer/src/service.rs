//! Embedding service: the single entry point used by request handlers.
//!
//! Composes the model registry, the loader and the embedding cache. Every
//! model load and encode crosses into the worker pool; cache and registry
//! access happens inline under short locks.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use ragwell_core::{EmbeddingConfig, Error, Result};

use crate::backend::{Embedding, ModelBackend};
use crate::benchmark::{
    BenchmarkOutcome, BenchmarkReport, BenchmarkResult, ModelBenchmark, DEFAULT_BENCHMARK_TEXTS,
};
use crate::cache::{CacheStats, Clock, EmbeddingCache, SystemClock};
use crate::loader::ModelLoader;
use crate::pool::WorkerPool;
use crate::registry::{normalize_key, ModelInfo, ModelRegistry};

/// Result of embedding one text.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingResult {
    pub embedding: Embedding,
    pub model_key: String,
    pub dimensions: usize,
    /// Whether this was served from cache.
    pub cached: bool,
}

/// Result of embedding a batch; `embeddings[i]` belongs to `texts[i]`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEmbedding {
    pub embeddings: Vec<Embedding>,
    pub model_key: String,
    pub dimensions: usize,
    pub processing_time: f64,
    pub cached_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub active_model: Option<String>,
    pub loaded_models: Vec<String>,
    pub available_model_count: usize,
    pub cache_stats: CacheStats,
    pub worker_pool_size: usize,
    pub backend: String,
}

pub struct EmbeddingService {
    config: EmbeddingConfig,
    registry: Arc<RwLock<ModelRegistry>>,
    cache: EmbeddingCache,
    loader: ModelLoader,
    pool: Arc<WorkerPool>,
}

impl EmbeddingService {
    /// Service over the built-in model catalogue.
    pub fn new(config: EmbeddingConfig, backend: Arc<dyn ModelBackend>) -> Self {
        Self::with_registry(config, backend, ModelRegistry::with_default_catalogue())
    }

    pub fn with_registry(
        config: EmbeddingConfig,
        backend: Arc<dyn ModelBackend>,
        registry: ModelRegistry,
    ) -> Self {
        Self::with_clock(config, backend, registry, Arc::new(SystemClock))
    }

    /// Full constructor; the clock drives cache expiry.
    pub fn with_clock(
        config: EmbeddingConfig,
        backend: Arc<dyn ModelBackend>,
        registry: ModelRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = Arc::new(RwLock::new(registry));
        let pool = Arc::new(WorkerPool::new(config.worker_pool_size));
        let cache = EmbeddingCache::with_clock(config.cache_max_size, config.cache_ttl, clock);
        let loader = ModelLoader::new(backend, Arc::clone(&registry), Arc::clone(&pool));

        info!(
            "Embedding service ready: {} models, {} workers, cache {} entries / {}s",
            registry.read().len(),
            pool.size(),
            config.cache_max_size,
            config.cache_ttl.as_secs()
        );

        Self {
            config,
            registry,
            cache,
            loader,
            pool,
        }
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.registry.read().list()
    }

    pub fn get_model(&self, key: &str) -> Result<ModelInfo> {
        self.registry.read().get(key)
    }

    /// None until a model has been switched to.
    pub fn active_model(&self) -> Option<ModelInfo> {
        self.registry.read().active()
    }

    /// Make sure a model is loaded, without changing the active model.
    pub async fn load_model(&self, key: &str, force_reload: bool) -> Result<ModelInfo> {
        self.loader.load(key, force_reload).await
    }

    /// Load `key`, make it the active model and drop every cached vector.
    /// Nothing changes if the load fails.
    pub async fn switch_model(&self, key: &str) -> Result<ModelInfo> {
        let loaded = self.loader.load(key, false).await?;
        let key = loaded.descriptor.key;

        let previous = {
            let mut registry = self.registry.write();
            let previous = registry.active().map(|m| m.descriptor.key);
            registry.set_active(&key)?;
            previous
        };
        self.cache.clear();

        info!(
            "Active embedding model: {} -> {}",
            previous.as_deref().unwrap_or("none"),
            key
        );
        self.registry.read().get(&key)
    }

    /// Embed one text with `model_key`, else the active model, else the default.
    pub async fn embed(&self, text: &str, model_key: Option<&str>) -> Result<EmbeddingResult> {
        let key = self.resolve_model(model_key).await?;

        if let Some(embedding) = self.cache.get(text, &key) {
            debug!("Cache hit for {} ({} chars)", key, text.len());
            return Ok(EmbeddingResult {
                dimensions: embedding.len(),
                embedding,
                model_key: key,
                cached: true,
            });
        }

        let handle = self.loader.handle(&key).await?;
        let owned = text.to_string();
        let embedding = self
            .pool
            .run(move || handle.encode_one(&owned))
            .await?
            .map_err(|cause| Error::EmbeddingGeneration {
                model: key.clone(),
                cause,
            })?;

        self.cache.put(text, &key, embedding.clone());
        Ok(EmbeddingResult {
            dimensions: embedding.len(),
            embedding,
            model_key: key,
            cached: false,
        })
    }

    /// Embed many texts. Cached texts are served from cache; the rest go to the
    /// model in one call. Output order always matches input order.
    pub async fn embed_batch(
        &self,
        texts: &[String],
        model_key: Option<&str>,
        batch_size: Option<usize>,
    ) -> Result<BatchEmbedding> {
        let started = Instant::now();

        if texts.is_empty() {
            return Ok(BatchEmbedding {
                embeddings: Vec::new(),
                model_key: self.peek_model_key(model_key)?,
                dimensions: 0,
                processing_time: 0.0,
                cached_count: 0,
            });
        }

        let key = self.resolve_model(model_key).await?;
        let batch_size = batch_size.unwrap_or(self.config.default_batch_size).max(1);

        let mut slots: Vec<Option<Embedding>> = Vec::with_capacity(texts.len());
        let mut uncached_positions = Vec::new();
        let mut uncached_texts = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let hit = self.cache.get(text, &key);
            if hit.is_none() {
                uncached_positions.push(i);
                uncached_texts.push(text.clone());
            }
            slots.push(hit);
        }
        let cached_count = texts.len() - uncached_texts.len();
        debug!(
            "Batch of {} for {}: {} cached, {} to encode",
            texts.len(),
            key,
            cached_count,
            uncached_texts.len()
        );

        if !uncached_texts.is_empty() {
            let handle = self.loader.handle(&key).await?;
            let expected = uncached_texts.len();
            let (uncached_texts, encoded) = self
                .pool
                .run(move || {
                    let encoded = handle.encode_many(&uncached_texts, batch_size);
                    (uncached_texts, encoded)
                })
                .await?;
            let encoded = encoded.map_err(|cause| Error::EmbeddingGeneration {
                model: key.clone(),
                cause,
            })?;
            if encoded.len() != expected {
                return Err(Error::EmbeddingGeneration {
                    model: key,
                    cause: format!("backend returned {} vectors for {} texts", encoded.len(), expected),
                });
            }

            for ((position, text), embedding) in uncached_positions
                .into_iter()
                .zip(uncached_texts.iter())
                .zip(encoded)
            {
                self.cache.put(text, &key, embedding.clone());
                slots[position] = Some(embedding);
            }
        }

        let embeddings: Vec<Embedding> = slots.into_iter().flatten().collect();
        if embeddings.len() != texts.len() {
            return Err(Error::Internal(format!(
                "batch produced {} vectors for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or(0);
        Ok(BatchEmbedding {
            embeddings,
            model_key: key,
            dimensions,
            processing_time: started.elapsed().as_secs_f64(),
            cached_count,
        })
    }

    /// Time load + batch embed for each model. A failing model is recorded
    /// as `failed` and the sweep continues.
    pub async fn benchmark(
        &self,
        test_texts: Option<Vec<String>>,
        model_keys: Option<Vec<String>>,
    ) -> BenchmarkReport {
        let texts: Vec<String> = match test_texts {
            Some(texts) if !texts.is_empty() => texts,
            _ => DEFAULT_BENCHMARK_TEXTS.iter().map(|s| s.to_string()).collect(),
        };
        let keys = model_keys.unwrap_or_else(|| self.registry.read().keys());
        let started_at = Utc::now();

        info!("Benchmarking {} model(s) on {} texts", keys.len(), texts.len());

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let outcome = match self.benchmark_one(&key, &texts).await {
                Ok(result) => BenchmarkOutcome::Success(result),
                Err(e) => {
                    warn!("Benchmark of {} failed: {}", key, e);
                    BenchmarkOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            results.push(ModelBenchmark {
                model_key: normalize_key(&key).unwrap_or(key),
                outcome,
            });
        }

        BenchmarkReport {
            results,
            text_count: texts.len(),
            started_at,
        }
    }

    async fn benchmark_one(&self, key: &str, texts: &[String]) -> Result<BenchmarkResult> {
        let load_started = Instant::now();
        let info = self.loader.load(key, false).await?;
        let load_time = load_started.elapsed().as_secs_f64();

        let key = info.descriptor.key;
        // Time the model, not the cache
        for text in texts {
            self.cache.remove(text, &key);
        }
        let embed_started = Instant::now();
        let batch = self.embed_batch(texts, Some(&key), None).await?;
        let embed_time = embed_started.elapsed().as_secs_f64();

        let result = BenchmarkResult::new(
            load_time,
            embed_time,
            batch.dimensions,
            texts.len(),
            batch.cached_count,
            &self.config.score_weights,
        );
        self.registry
            .write()
            .record_benchmark(&key, result.performance_score, Utc::now())?;
        Ok(result)
    }

    pub fn stats(&self) -> ServiceStats {
        let (active_model, available_model_count) = {
            let registry = self.registry.read();
            (registry.active().map(|m| m.descriptor.key), registry.len())
        };
        ServiceStats {
            active_model,
            loaded_models: self.loader.loaded_keys(),
            available_model_count,
            cache_stats: self.cache.stats(),
            worker_pool_size: self.pool.size(),
            backend: self.loader.backend_name().to_string(),
        }
    }

    /// Drop cached vectors, release models and stop the worker pool.
    /// Safe to call more than once.
    pub fn cleanup(&self) {
        // Pool first, so loads still in flight discard their handles
        self.pool.shutdown();
        self.cache.clear();
        self.loader.unload_all();
        self.registry.write().clear_active();
    }

    /// Explicit key, else the active model, else the default model, which is
    /// switched to on first use.
    async fn resolve_model(&self, model_key: Option<&str>) -> Result<String> {
        if let Some(key) = model_key {
            let key = normalize_key(key)?;
            if !self.registry.read().contains(&key) {
                return Err(Error::ModelNotFound(key));
            }
            return Ok(key);
        }

        if let Some(active) = self.active_model() {
            return Ok(active.descriptor.key);
        }

        let default = self.config.default_model.clone();
        info!("No active model; switching to default {}", default);
        let info = self.switch_model(&default).await?;
        Ok(info.descriptor.key)
    }

    /// The key a request would use, without loading anything.
    fn peek_model_key(&self, model_key: Option<&str>) -> Result<String> {
        match model_key {
            Some(key) => normalize_key(key),
            None => match self.active_model() {
                Some(active) => Ok(active.descriptor.key),
                None => normalize_key(&self.config.default_model),
            },
        }
    }
}
