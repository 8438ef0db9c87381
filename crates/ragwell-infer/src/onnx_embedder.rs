//! ONNX-based model backend for sentence-transformer models.
//!
//! Each model lives in its own directory under the models root, named after
//! the backend model name with `/` replaced by `__`:
//!
//! ```text
//! models/sentence-transformers__all-MiniLM-L6-v2/model.onnx
//! models/sentence-transformers__all-MiniLM-L6-v2/tokenizer.json
//! ```
//!
//! Requires the `onnx` feature.

use std::path::{Path, PathBuf};

/// Directory holding the files of `model_name` under `models_dir`.
pub fn model_dir(models_dir: &Path, model_name: &str) -> PathBuf {
    models_dir.join(model_name.replace('/', "__"))
}

#[cfg(feature = "onnx")]
mod inner {
    use std::path::{Path, PathBuf};

    use ndarray::{Array1, ArrayView1};
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use tokenizers::Tokenizer;
    use tracing::{debug, info};

    use super::model_dir;
    use crate::backend::{Embedding, ModelBackend, ModelHandle};

    /// Maximum sequence length fed to any model.
    const MAX_SEQ_LEN: usize = 512;

    /// Intra-op threads per session; parallelism comes from the worker pool.
    const INTRA_THREADS: usize = 2;

    /// Loads ONNX sentence-transformer models from a directory tree.
    pub struct OnnxBackend {
        models_dir: PathBuf,
    }

    impl OnnxBackend {
        pub fn new(models_dir: impl Into<PathBuf>) -> Self {
            Self {
                models_dir: models_dir.into(),
            }
        }
    }

    impl ModelBackend for OnnxBackend {
        fn name(&self) -> &str {
            "onnx"
        }

        fn load(&self, model_name: &str) -> Result<Box<dyn ModelHandle>, String> {
            let dir = model_dir(&self.models_dir, model_name);
            let model = OnnxModel::load(&dir)?;
            Ok(Box::new(model))
        }
    }

    /// One loaded ONNX session plus its tokenizer.
    pub struct OnnxModel {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
    }

    impl OnnxModel {
        /// Expects `model.onnx` and `tokenizer.json` inside `dir`.
        fn load(dir: &Path) -> Result<Self, String> {
            let model_path = dir.join("model.onnx");
            let tokenizer_path = dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(format!("Model not found: {}", model_path.display()));
            }
            if !tokenizer_path.exists() {
                return Err(format!("Tokenizer not found: {}", tokenizer_path.display()));
            }

            // With load-dynamic, ORT_DYLIB_PATH must point to libonnxruntime.so
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| format!("Failed to create session builder: {}", e))?
                .with_intra_threads(INTRA_THREADS)
                .map_err(|e| format!("Failed to set threads: {}", e))?
                .commit_from_file(&model_path)
                .map_err(|e| format!("Failed to load ONNX model: {}", e))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| format!("Failed to load tokenizer: {}", e))?;

            info!("ONNX model loaded from {}", dir.display());

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
            })
        }

        /// Run one padded batch through the session.
        fn infer(&self, texts: &[&str]) -> Result<Vec<Embedding>, String> {
            let encodings = self
                .tokenizer
                .encode_batch(texts.to_vec(), true)
                .map_err(|e| format!("Tokenization failed: {}", e))?;

            let batch = encodings.len();
            let seq_len = encodings
                .iter()
                .map(|e| e.get_ids().len().min(MAX_SEQ_LEN))
                .max()
                .unwrap_or(0)
                .max(1);

            // Row-major [batch, seq_len], zero padded
            let mut ids = vec![0i64; batch * seq_len];
            let mut mask = vec![0i64; batch * seq_len];
            for (row, encoding) in encodings.iter().enumerate() {
                let n = encoding.get_ids().len().min(seq_len);
                for i in 0..n {
                    ids[row * seq_len + i] = encoding.get_ids()[i] as i64;
                    mask[row * seq_len + i] = encoding.get_attention_mask()[i] as i64;
                }
            }
            let type_ids = vec![0i64; batch * seq_len];

            let ids_tensor = Tensor::from_array(([batch, seq_len], ids))
                .map_err(|e| format!("Failed to create ids tensor: {}", e))?;
            let mask_tensor = Tensor::from_array(([batch, seq_len], mask.clone()))
                .map_err(|e| format!("Failed to create mask tensor: {}", e))?;
            let type_ids_tensor = Tensor::from_array(([batch, seq_len], type_ids))
                .map_err(|e| format!("Failed to create type_ids tensor: {}", e))?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_ids_tensor])
                .map_err(|e| format!("ONNX inference failed: {}", e))?;

            // Either [batch, seq_len, dim] token embeddings or [batch, dim] pooled
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| format!("Failed to extract output tensor: {}", e))?;
            let dims: Vec<i64> = shape.iter().copied().collect();

            let mut out = Vec::with_capacity(batch);
            match dims.as_slice() {
                [_, tokens, dim] => {
                    let (tokens, dim) = (*tokens as usize, *dim as usize);
                    for row in 0..batch {
                        let mut pooled = Array1::<f32>::zeros(dim);
                        let mut weight = 0.0f32;
                        for t in 0..tokens.min(seq_len) {
                            if mask[row * seq_len + t] == 0 {
                                continue;
                            }
                            let offset = (row * tokens + t) * dim;
                            pooled += &ArrayView1::from(&data[offset..offset + dim]);
                            weight += 1.0;
                        }
                        if weight < 1.0 {
                            return Err("empty attention mask".into());
                        }
                        out.push(normalize(pooled / weight));
                    }
                }
                [_, dim] => {
                    let dim = *dim as usize;
                    for row in 0..batch {
                        let view = ArrayView1::from(&data[row * dim..(row + 1) * dim]);
                        out.push(normalize(view.to_owned()));
                    }
                }
                other => return Err(format!("Unexpected output shape: {:?}", other)),
            }

            debug!("Encoded batch of {} (seq_len={})", batch, seq_len);
            Ok(out)
        }
    }

    fn normalize(v: Array1<f32>) -> Embedding {
        let norm = v.dot(&v).sqrt();
        if norm > 1e-12 {
            (v / norm).to_vec()
        } else {
            v.to_vec()
        }
    }

    impl ModelHandle for OnnxModel {
        fn encode_one(&self, text: &str) -> Result<Embedding, String> {
            self.infer(&[text])?
                .pop()
                .ok_or_else(|| "model returned no output".to_string())
        }

        fn encode_many(&self, texts: &[String], batch_size: usize) -> Result<Vec<Embedding>, String> {
            let mut out = Vec::with_capacity(texts.len());
            for chunk in texts.chunks(batch_size.max(1)) {
                let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
                out.extend(self.infer(&refs)?);
            }
            Ok(out)
        }
    }

}

#[cfg(feature = "onnx")]
pub use inner::{OnnxBackend, OnnxModel};
