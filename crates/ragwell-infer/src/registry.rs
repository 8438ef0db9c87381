//! Catalogue of known embedding models and their runtime state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ragwell_core::{Error, Result};

/// Static information about an embedding model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDescriptor {
    /// Normalized identifier, `[a-z0-9_-]+`.
    pub key: String,
    pub name: String,
    pub description: String,
    /// Declared until the first load; then the observed vector length.
    pub dimensions: usize,
    /// Approximate download size, e.g. "90MB".
    pub declared_size: String,
    pub max_sequence_length: usize,
    pub supported_languages: Vec<String>,
    pub is_multilingual: bool,
    /// Name the model backend knows this model by.
    pub backend_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    /// Loaded and ready to encode.
    Available,
    Loading,
    /// Known but not loaded.
    Unavailable,
    /// Last load attempt failed.
    Error,
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Loading => write!(f, "loading"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Mutable state attached to each descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelRuntimeState {
    pub status: ModelStatus,
    pub is_active: bool,
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_time_seconds: Option<f64>,
    /// 0..=1, set by a benchmark run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Default for ModelRuntimeState {
    fn default() -> Self {
        Self {
            status: ModelStatus::Unavailable,
            is_active: false,
            loaded: false,
            load_time_seconds: None,
            performance_score: None,
            benchmark_timestamp: None,
            last_error: None,
        }
    }
}

/// Descriptor plus state, as handed out to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    #[serde(flatten)]
    pub descriptor: ModelDescriptor,
    #[serde(flatten)]
    pub state: ModelRuntimeState,
}

/// Normalize a model key: trimmed, lowercase, only `[a-z0-9_-]`.
pub fn normalize_key(key: &str) -> Result<String> {
    let normalized = key.trim().to_lowercase();
    let valid = !normalized.is_empty()
        && normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(normalized)
    } else {
        Err(Error::InvalidModelKey(key.to_string()))
    }
}

/// Ordered catalogue of models with their state.
pub struct ModelRegistry {
    models: Vec<ModelInfo>,
}

impl ModelRegistry {
    /// Build a registry from descriptors. Keys are normalized; a later
    /// descriptor with an already-seen key replaces the earlier one in place.
    pub fn new(descriptors: impl IntoIterator<Item = ModelDescriptor>) -> Result<Self> {
        let mut models: Vec<ModelInfo> = Vec::new();
        for mut descriptor in descriptors {
            descriptor.key = normalize_key(&descriptor.key)?;
            let info = ModelInfo {
                descriptor,
                state: ModelRuntimeState::default(),
            };
            match models.iter_mut().find(|m| m.descriptor.key == info.descriptor.key) {
                Some(existing) => *existing = info,
                None => models.push(info),
            }
        }
        Ok(Self { models })
    }

    /// Registry holding the built-in catalogue.
    pub fn with_default_catalogue() -> Self {
        Self {
            models: default_catalogue()
                .into_iter()
                .map(|descriptor| ModelInfo {
                    descriptor,
                    state: ModelRuntimeState::default(),
                })
                .collect(),
        }
    }

    /// All models, in insertion order.
    pub fn list(&self) -> Vec<ModelInfo> {
        self.models.clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.models.iter().map(|m| m.descriptor.key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, key: &str) -> Result<ModelInfo> {
        let key = normalize_key(key)?;
        self.find(&key).cloned().ok_or(Error::ModelNotFound(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        normalize_key(key).map(|k| self.find(&k).is_some()).unwrap_or(false)
    }

    /// The active model, if any has been switched to.
    pub fn active(&self) -> Option<ModelInfo> {
        self.models.iter().find(|m| m.state.is_active).cloned()
    }

    /// Mark `key` active and every other model inactive.
    pub fn set_active(&mut self, key: &str) -> Result<()> {
        let key = normalize_key(key)?;
        if self.find(&key).is_none() {
            return Err(Error::ModelNotFound(key));
        }
        for model in &mut self.models {
            model.state.is_active = model.descriptor.key == key;
        }
        Ok(())
    }

    pub fn clear_active(&mut self) {
        for model in &mut self.models {
            model.state.is_active = false;
        }
    }

    pub fn mark_loading(&mut self, key: &str) -> Result<()> {
        let state = self.state_mut(key)?;
        state.status = ModelStatus::Loading;
        Ok(())
    }

    /// Record a successful load and the observed dimensionality.
    pub fn mark_loaded(&mut self, key: &str, dimensions: usize, load_time_seconds: f64) -> Result<()> {
        let model = self.find_mut(key)?;
        model.descriptor.dimensions = dimensions;
        model.state.status = ModelStatus::Available;
        model.state.loaded = true;
        model.state.load_time_seconds = Some(load_time_seconds);
        model.state.last_error = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, key: &str, error: &str) -> Result<()> {
        let state = self.state_mut(key)?;
        state.status = ModelStatus::Error;
        state.loaded = false;
        state.last_error = Some(error.to_string());
        Ok(())
    }

    /// Back to known-but-not-loaded (handle released).
    pub fn mark_unloaded(&mut self, key: &str) -> Result<()> {
        let state = self.state_mut(key)?;
        state.status = ModelStatus::Unavailable;
        state.loaded = false;
        Ok(())
    }

    pub fn record_benchmark(&mut self, key: &str, score: f64, at: DateTime<Utc>) -> Result<()> {
        let state = self.state_mut(key)?;
        state.performance_score = Some(score.clamp(0.0, 1.0));
        state.benchmark_timestamp = Some(at);
        Ok(())
    }

    fn find(&self, normalized: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|m| m.descriptor.key == normalized)
    }

    fn find_mut(&mut self, key: &str) -> Result<&mut ModelInfo> {
        let key = normalize_key(key)?;
        self.models
            .iter_mut()
            .find(|m| m.descriptor.key == key)
            .ok_or(Error::ModelNotFound(key))
    }

    fn state_mut(&mut self, key: &str) -> Result<&mut ModelRuntimeState> {
        self.find_mut(key).map(|m| &mut m.state)
    }
}

#[allow(clippy::too_many_arguments)]
fn descriptor(
    key: &str,
    name: &str,
    description: &str,
    dimensions: usize,
    declared_size: &str,
    max_sequence_length: usize,
    languages: &[&str],
    backend_name: &str,
) -> ModelDescriptor {
    ModelDescriptor {
        key: key.into(),
        name: name.into(),
        description: description.into(),
        dimensions,
        declared_size: declared_size.into(),
        max_sequence_length,
        supported_languages: languages.iter().map(|l| l.to_string()).collect(),
        is_multilingual: languages.len() > 1,
        backend_name: backend_name.into(),
    }
}

/// Built-in sentence-transformer models.
pub fn default_catalogue() -> Vec<ModelDescriptor> {
    vec![
        descriptor(
            "all-minilm-l6-v2",
            "all-MiniLM-L6-v2",
            "Fast general-purpose English model; good default for semantic search",
            384,
            "90MB",
            256,
            &["en"],
            "sentence-transformers/all-MiniLM-L6-v2",
        ),
        descriptor(
            "all-mpnet-base-v2",
            "all-mpnet-base-v2",
            "Higher quality English embeddings at roughly 5x the cost of MiniLM",
            768,
            "420MB",
            384,
            &["en"],
            "sentence-transformers/all-mpnet-base-v2",
        ),
        descriptor(
            "multi-qa-minilm-l6-cos-v1",
            "multi-qa-MiniLM-L6-cos-v1",
            "Tuned for question-answer retrieval",
            384,
            "90MB",
            512,
            &["en"],
            "sentence-transformers/multi-qa-MiniLM-L6-cos-v1",
        ),
        descriptor(
            "paraphrase-multilingual-minilm-l12-v2",
            "paraphrase-multilingual-MiniLM-L12-v2",
            "Multilingual paraphrase model covering 50+ languages",
            384,
            "470MB",
            128,
            &["en", "de", "fr", "es", "it", "nl", "pl", "pt", "ru", "zh", "ja", "ko", "ar"],
            "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2",
        ),
        descriptor(
            "bge-small-en-v1-5",
            "bge-small-en-v1.5",
            "BAAI general embedding, small English variant",
            384,
            "130MB",
            512,
            &["en"],
            "BAAI/bge-small-en-v1.5",
        ),
    ]
}
