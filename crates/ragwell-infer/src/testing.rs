//! Fake model backend for unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::backend::{Embedding, ModelBackend, ModelHandle};
use crate::registry::{ModelDescriptor, ModelRegistry};

/// Registry whose models use their key as backend name.
pub(crate) fn registry_of(models: &[(&str, usize)]) -> ModelRegistry {
    ModelRegistry::new(models.iter().map(|(key, dims)| ModelDescriptor {
        key: key.to_string(),
        name: key.to_string(),
        description: format!("test model {key}"),
        dimensions: *dims,
        declared_size: "1MB".into(),
        max_sequence_length: 128,
        supported_languages: vec!["en".into()],
        is_multilingual: false,
        backend_name: key.to_string(),
    }))
    .unwrap()
}

/// Deterministic vector for `text` from model `model`.
pub(crate) fn fake_vector(model: &str, text: &str, dims: usize) -> Embedding {
    let seed: u32 = model.bytes().chain(text.bytes()).map(u32::from).sum();
    (0..dims)
        .map(|i| ((seed as usize + i) as f32 * 0.01).sin())
        .collect()
}

#[derive(Default)]
struct Shared {
    loads: AtomicUsize,
    encode_calls: AtomicUsize,
    encoded_texts: AtomicUsize,
    failing_loads: Mutex<HashSet<String>>,
    failing_encodes: Mutex<HashSet<String>>,
}

pub(crate) struct FakeBackend {
    shared: Arc<Shared>,
    dimensions: Option<usize>,
    load_delay: Duration,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            dimensions: None,
            load_delay: Duration::ZERO,
        }
    }

    /// Produce vectors of this length regardless of the model (default 8).
    pub(crate) fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = Some(dims);
        self
    }

    pub(crate) fn with_load_delay_ms(mut self, ms: u64) -> Self {
        self.load_delay = Duration::from_millis(ms);
        self
    }

    /// Every load of `model` fails.
    pub(crate) fn failing(self, model: &str) -> Self {
        self.shared.failing_loads.lock().insert(model.to_string());
        self
    }

    /// Every encode by `model` fails, the load probe included.
    pub(crate) fn failing_encode(self, model: &str) -> Self {
        self.shared.failing_encodes.lock().insert(model.to_string());
        self
    }

    /// Make later loads of `model` fail.
    pub(crate) fn break_loads(&self, model: &str) {
        self.shared.failing_loads.lock().insert(model.to_string());
    }

    pub(crate) fn heal(&self, model: &str) {
        self.shared.failing_loads.lock().remove(model);
        self.shared.failing_encodes.lock().remove(model);
    }

    pub(crate) fn load_count(&self) -> usize {
        self.shared.loads.load(Ordering::SeqCst)
    }

    /// Number of encode calls (one per `encode_one` or `encode_many`).
    pub(crate) fn encode_count(&self) -> usize {
        self.shared.encode_calls.load(Ordering::SeqCst)
    }

    /// Number of texts encoded across all calls.
    pub(crate) fn encoded_texts(&self) -> usize {
        self.shared.encoded_texts.load(Ordering::SeqCst)
    }
}

impl ModelBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn load(&self, model_name: &str) -> Result<Box<dyn ModelHandle>, String> {
        self.shared.loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            std::thread::sleep(self.load_delay);
        }
        if self.shared.failing_loads.lock().contains(model_name) {
            return Err(format!("weights for {model_name} are corrupt"));
        }
        Ok(Box::new(FakeModel {
            model: model_name.to_string(),
            dims: self.dimensions.unwrap_or(8),
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FakeModel {
    model: String,
    dims: usize,
    shared: Arc<Shared>,
}

impl FakeModel {
    fn check(&self, text: &str) -> Result<(), String> {
        if self.shared.failing_encodes.lock().contains(&self.model) || text.contains("poison") {
            return Err(format!("{} cannot encode {:?}", self.model, text));
        }
        Ok(())
    }
}

impl ModelHandle for FakeModel {
    fn encode_one(&self, text: &str) -> Result<Embedding, String> {
        self.shared.encode_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.encoded_texts.fetch_add(1, Ordering::SeqCst);
        self.check(text)?;
        Ok(fake_vector(&self.model, text, self.dims))
    }

    fn encode_many(&self, texts: &[String], _batch_size: usize) -> Result<Vec<Embedding>, String> {
        self.shared.encode_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.encoded_texts.fetch_add(texts.len(), Ordering::SeqCst);
        texts
            .iter()
            .map(|t| {
                self.check(t)?;
                Ok(fake_vector(&self.model, t, self.dims))
            })
            .collect()
    }
}
