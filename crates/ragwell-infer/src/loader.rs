//! Lazy model loading.
//!
//! A model goes `unavailable -> loading -> available | error`. Loads run on
//! the worker pool; the registry and handle map are only locked for the
//! bookkeeping around them, never across the load itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use ragwell_core::{Error, Result};

use crate::backend::{ModelBackend, ModelHandle};
use crate::pool::WorkerPool;
use crate::registry::{normalize_key, ModelInfo, ModelRegistry};

/// Fixed text encoded right after a load to learn the real dimensionality.
pub const PROBE_TEXT: &str = "dimension probe";

pub struct ModelLoader {
    backend: Arc<dyn ModelBackend>,
    registry: Arc<RwLock<ModelRegistry>>,
    pool: Arc<WorkerPool>,
    handles: RwLock<HashMap<String, Arc<dyn ModelHandle>>>,
    /// One async lock per model key so concurrent loads of a key run once.
    load_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ModelLoader {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        registry: Arc<RwLock<ModelRegistry>>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            backend,
            registry,
            pool,
            handles: RwLock::new(HashMap::new()),
            load_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Load `key` unless it is already loaded (or `force_reload` is set).
    pub async fn load(&self, key: &str, force_reload: bool) -> Result<ModelInfo> {
        let key = normalize_key(key)?;
        let backend_name = self.registry.read().get(&key)?.descriptor.backend_name;

        let lock = self.load_lock(&key);
        let _guard = lock.lock().await;

        if !force_reload && self.is_loaded(&key) {
            return self.registry.read().get(&key);
        }

        self.registry.write().mark_loading(&key)?;
        info!("Loading model {} ({})", key, backend_name);

        let backend = Arc::clone(&self.backend);
        let outcome = self
            .pool
            .run(move || {
                let started = Instant::now();
                let handle = backend.load(&backend_name)?;
                let load_time = started.elapsed().as_secs_f64();
                let probe = handle
                    .encode_one(PROBE_TEXT)
                    .map_err(|e| format!("probe encode failed: {e}"))?;
                Ok::<_, String>((handle, load_time, probe.len()))
            })
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r);

        match outcome {
            Ok((handle, load_time, dimensions)) => {
                {
                    // Checked under the handle lock so cleanup cannot miss this insert
                    let mut handles = self.handles.write();
                    if self.pool.is_shut_down() {
                        drop(handles);
                        self.registry.write().mark_unloaded(&key)?;
                        warn!("Discarding model {}: worker pool shut down during load", key);
                        return Err(Error::WorkerPool("worker pool is shut down".into()));
                    }
                    handles.insert(key.clone(), Arc::from(handle));
                }
                let mut registry = self.registry.write();
                registry.mark_loaded(&key, dimensions, load_time)?;
                info!(
                    "Model {} loaded in {:.2}s (dim={})",
                    key, load_time, dimensions
                );
                registry.get(&key)
            }
            Err(cause) => {
                self.handles.write().remove(&key);
                self.registry.write().mark_failed(&key, &cause)?;
                warn!("Model {} failed to load: {}", key, cause);
                Err(Error::ModelLoad { model: key, cause })
            }
        }
    }

    /// Handle for a loaded model, loading it first if needed.
    pub async fn handle(&self, key: &str) -> Result<Arc<dyn ModelHandle>> {
        let resident = self.handles.read().get(key).cloned();
        if let Some(handle) = resident {
            return Ok(handle);
        }
        self.load(key, false).await?;
        self.handles
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::ModelLoad {
                model: key.to_string(),
                cause: "model was unloaded during request".into(),
            })
    }

    pub fn is_loaded(&self, key: &str) -> bool {
        self.handles.read().contains_key(key)
    }

    /// Keys of loaded models, sorted.
    pub fn loaded_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handles.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Release every model handle.
    pub fn unload_all(&self) {
        let released: Vec<String> = self.handles.write().drain().map(|(k, _)| k).collect();
        let mut registry = self.registry.write();
        for key in &released {
            let _ = registry.mark_unloaded(key);
        }
        if !released.is_empty() {
            info!("Released {} model(s)", released.len());
        }
    }

    fn load_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.load_locks
                .lock()
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelStatus;
    use crate::testing::{registry_of, FakeBackend};

    fn loader_with(backend: Arc<FakeBackend>) -> (ModelLoader, Arc<RwLock<ModelRegistry>>) {
        let registry = Arc::new(RwLock::new(registry_of(&[("m1", 384), ("m2", 768), ("bad", 16)])));
        let loader = ModelLoader::new(backend, Arc::clone(&registry), Arc::new(WorkerPool::new(2)));
        (loader, registry)
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let backend = Arc::new(FakeBackend::new());
        let (loader, _) = loader_with(Arc::clone(&backend));

        let first = loader.load("m1", false).await.unwrap();
        let second = loader.load("m1", false).await.unwrap();

        assert_eq!(backend.load_count(), 1);
        assert_eq!(first, second);
        assert_eq!(first.state.status, ModelStatus::Available);
    }

    #[tokio::test]
    async fn test_force_reload_loads_again() {
        let backend = Arc::new(FakeBackend::new());
        let (loader, _) = loader_with(Arc::clone(&backend));

        loader.load("m1", false).await.unwrap();
        loader.load("m1", true).await.unwrap();
        assert_eq!(backend.load_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_loads_run_once() {
        let backend = Arc::new(FakeBackend::new().with_load_delay_ms(30));
        let (loader, _) = loader_with(Arc::clone(&backend));
        let loader = Arc::new(loader);

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let loader = Arc::clone(&loader);
                tokio::spawn(async move { loader.load("m2", false).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(backend.load_count(), 1);
    }

    #[tokio::test]
    async fn test_probe_sets_observed_dimensions() {
        // Declared 768, backend actually produces 32
        let backend = Arc::new(FakeBackend::new().with_dimensions(32));
        let (loader, registry) = loader_with(Arc::clone(&backend));

        let info = loader.load("m2", false).await.unwrap();
        assert_eq!(info.descriptor.dimensions, 32);
        assert_eq!(registry.read().get("m2").unwrap().descriptor.dimensions, 32);
        assert!(info.state.load_time_seconds.is_some());
        // The probe is the only encode so far
        assert_eq!(backend.encode_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_model() {
        let backend = Arc::new(FakeBackend::new());
        let (loader, registry) = loader_with(Arc::clone(&backend));
        let before = registry.read().list();

        let err = loader.load("does-not-exist", false).await.unwrap_err();
        assert!(matches!(err, Error::ModelNotFound(_)));
        assert_eq!(registry.read().list(), before);
        assert_eq!(backend.load_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_load_marks_error_and_allows_retry() {
        let backend = Arc::new(FakeBackend::new().failing("bad"));
        let (loader, registry) = loader_with(Arc::clone(&backend));

        let err = loader.load("bad", false).await.unwrap_err();
        assert!(matches!(err, Error::ModelLoad { ref model, .. } if model == "bad"));
        let info = registry.read().get("bad").unwrap();
        assert_eq!(info.state.status, ModelStatus::Error);
        assert!(info.state.last_error.is_some());
        assert!(!loader.is_loaded("bad"));

        backend.heal("bad");
        loader.load("bad", false).await.unwrap();
        assert!(loader.is_loaded("bad"));
        assert_eq!(backend.load_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_probe_is_a_load_error() {
        let backend = Arc::new(FakeBackend::new().failing_encode("m1"));
        let (loader, registry) = loader_with(Arc::clone(&backend));

        let err = loader.load("m1", false).await.unwrap_err();
        assert!(matches!(err, Error::ModelLoad { .. }));
        assert!(err.to_string().contains("probe"));
        assert_eq!(registry.read().get("m1").unwrap().state.status, ModelStatus::Error);
    }

    #[tokio::test]
    async fn test_failed_force_reload_drops_previous_handle() {
        let backend = Arc::new(FakeBackend::new());
        let (loader, registry) = loader_with(Arc::clone(&backend));
        loader.load("m1", false).await.unwrap();
        registry.write().set_active("m1").unwrap();

        backend.break_loads("m1");
        let err = loader.load("m1", true).await.unwrap_err();
        assert!(matches!(err, Error::ModelLoad { .. }));

        assert!(!loader.is_loaded("m1"));
        let info = registry.read().get("m1").unwrap();
        assert_eq!(info.state.status, ModelStatus::Error);
        assert!(!info.state.loaded);
        assert!(info.state.is_active);
        assert!(info.state.last_error.as_deref().unwrap().contains("corrupt"));
    }

    #[tokio::test]
    async fn test_load_finishing_after_shutdown_is_discarded() {
        let backend = Arc::new(FakeBackend::new().with_load_delay_ms(100));
        let registry = Arc::new(RwLock::new(registry_of(&[("m1", 8)])));
        let pool = Arc::new(WorkerPool::new(1));
        let loader = Arc::new(ModelLoader::new(
            backend,
            Arc::clone(&registry),
            Arc::clone(&pool),
        ));

        let task = {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load("m1", false).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        pool.shutdown();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::WorkerPool(_)));
        assert!(loader.loaded_keys().is_empty());
        assert_eq!(
            registry.read().get("m1").unwrap().state.status,
            ModelStatus::Unavailable
        );
    }

    #[tokio::test]
    async fn test_unload_all() {
        let backend = Arc::new(FakeBackend::new());
        let (loader, registry) = loader_with(Arc::clone(&backend));
        loader.load("m1", false).await.unwrap();
        loader.load("m2", false).await.unwrap();
        assert_eq!(loader.loaded_keys(), vec!["m1", "m2"]);

        loader.unload_all();
        assert!(loader.loaded_keys().is_empty());
        assert_eq!(
            registry.read().get("m1").unwrap().state.status,
            ModelStatus::Unavailable
        );
    }
}
