use std::sync::Mutex;

use tracing::info;

use crate::{EmbedError, Embedder};

const MODEL_NAME: &str = "all-MiniLM-L6-v2";
const MODEL_DIM: usize = 384;

/// Sentence-transformer embedder backed by a local ONNX model.
///
/// `TextEmbedding::embed` takes `&mut self`, hence the mutex.
pub struct FastEmbedEmbedder {
    model: Mutex<fastembed::TextEmbedding>,
}

impl FastEmbedEmbedder {
    pub fn try_default() -> Result<Self, EmbedError> {
        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
                .with_show_download_progress(false),
        )
        .map_err(|err| EmbedError::ModelLoad {
            model: MODEL_NAME.to_string(),
            reason: err.to_string(),
        })?;
        info!(model = MODEL_NAME, "embedding model loaded");
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for FastEmbedEmbedder {
    fn name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> usize {
        MODEL_DIM
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut batch = self.embed_batch(&[text])?;
        batch.pop().ok_or(EmbedError::BatchSize {
            expected: 1,
            got: 0,
        })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut model = self.model.lock().map_err(|_| EmbedError::Inference {
            reason: "embedding model mutex poisoned".to_string(),
        })?;
        let vectors = model
            .embed(texts.to_vec(), None)
            .map_err(|err| EmbedError::Inference {
                reason: err.to_string(),
            })?;
        if vectors.len() != texts.len() {
            return Err(EmbedError::BatchSize {
                expected: texts.len(),
                got: vectors.len(),
            });
        }
        Ok(vectors)
    }
}
