//! Model backend capability.
//!
//! The service never touches a concrete embedding library. It asks a
//! `ModelBackend` to materialise a model by its backend name and gets back a
//! `ModelHandle` that turns text into vectors. Implementations:
//! - `OnnxBackend`: ONNX Runtime sentence-transformer models (requires the `onnx` feature)
//! - `UnavailableBackend`: refuses every load (no inference runtime compiled in)
//!
//! Both calls are blocking; the service only invokes them from its worker pool.

/// A dense embedding vector.
pub type Embedding = Vec<f32>;

/// A model resident in memory.
pub trait ModelHandle: Send + Sync {
    /// Encode a single text.
    fn encode_one(&self, text: &str) -> Result<Embedding, String>;

    /// Encode many texts, `batch_size` at a time. Output order matches input order.
    fn encode_many(&self, texts: &[String], batch_size: usize) -> Result<Vec<Embedding>, String> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size.max(1)) {
            for text in chunk {
                out.push(self.encode_one(text)?);
            }
        }
        Ok(out)
    }
}

/// Something that can load models by name.
pub trait ModelBackend: Send + Sync {
    /// Short backend identifier for logs and stats.
    fn name(&self) -> &str;

    /// Load a model into memory. Slow; may allocate hundreds of MB.
    fn load(&self, model_name: &str) -> Result<Box<dyn ModelHandle>, String>;
}

/// Backend used when no inference runtime is compiled in. Every load fails,
/// so models surface as `error` while the rest of the service stays up.
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ModelBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn load(&self, model_name: &str) -> Result<Box<dyn ModelHandle>, String> {
        Err(format!("cannot load {}: {}", model_name, self.reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthModel;

    impl ModelHandle for LengthModel {
        fn encode_one(&self, text: &str) -> Result<Embedding, String> {
            Ok(vec![text.len() as f32])
        }
    }

    #[test]
    fn test_default_encode_many_preserves_order() {
        let texts: Vec<String> = ["a", "bbb", "cc", "dddd", "e"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let out = LengthModel.encode_many(&texts, 2).unwrap();
        assert_eq!(out, vec![vec![1.0], vec![3.0], vec![2.0], vec![4.0], vec![1.0]]);
    }

    #[test]
    fn test_zero_batch_size_still_encodes() {
        let texts = vec!["xy".to_string()];
        assert_eq!(LengthModel.encode_many(&texts, 0).unwrap(), vec![vec![2.0]]);
    }

    #[test]
    fn test_unavailable_backend_refuses() {
        let backend = UnavailableBackend::new("onnx feature disabled");
        let err = backend.load("sentence-transformers/all-MiniLM-L6-v2").err().unwrap();
        assert!(err.contains("onnx feature disabled"));
        assert!(err.contains("all-MiniLM-L6-v2"));
    }
}
