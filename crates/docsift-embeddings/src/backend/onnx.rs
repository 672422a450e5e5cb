//! ONNX embedding backend (all-MiniLM-L6-v2) via `ort`.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::TensorRef;
use tracing::info;

use super::mock::l2_normalize;
use super::{EMBEDDING_DIM, EmbeddingModel};
use crate::{EmbeddingError, Result};

/// Sentence embedder backed by ONNX Runtime.
///
/// Expects two files in the model directory:
/// - `model.onnx`: the exported model weights
/// - `tokenizer.json`: the HuggingFace tokenizer definition
///
/// `Session::run` needs `&mut self`, so the session sits behind a `Mutex`
/// to keep [`EmbeddingModel::embed`] callable through a shared reference.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
}

impl OnnxEmbedder {
    /// Load the model and tokenizer from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        for required in [&model_path, &tokenizer_path] {
            if !required.exists() {
                return Err(EmbeddingError::ModelNotFound(required.clone()));
            }
        }

        let session = Session::builder()
            .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;

        info!(dir = %model_dir.display(), "ONNX embedding model loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    fn infer(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::Tokenization(e.to_string()))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| i64::from(m))
            .collect();
        let token_type_ids: Vec<i64> = encoding
            .get_type_ids()
            .iter()
            .map(|&t| i64::from(t))
            .collect();
        let seq_len = input_ids.len();

        let ids = tensor_2d(seq_len, input_ids)?;
        let mask = tensor_2d(seq_len, attention_mask.clone())?;
        let types = tensor_2d(seq_len, token_type_ids)?;

        let ids_tensor = TensorRef::from_array_view(&ids)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        let mask_tensor = TensorRef::from_array_view(&mask)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        let types_tensor = TensorRef::from_array_view(&types)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EmbeddingError::Inference("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![ids_tensor, mask_tensor, types_tensor])
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        // Token embeddings come out as [1, seq_len, EMBEDDING_DIM].
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        if shape.len() != 3 || shape[2] as usize != EMBEDDING_DIM {
            return Err(EmbeddingError::Inference(format!(
                "unexpected output shape {shape:?}, expected [1, {seq_len}, {EMBEDDING_DIM}]"
            )));
        }

        Ok(mean_pool(data, &attention_mask, seq_len))
    }
}

impl EmbeddingModel for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.infer(text)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}

fn tensor_2d(seq_len: usize, values: Vec<i64>) -> Result<ndarray::Array2<i64>> {
    ndarray::Array2::from_shape_vec((1, seq_len), values)
        .map_err(|e| EmbeddingError::Inference(e.to_string()))
}

/// Attention-mask-weighted mean over token embeddings, L2-normalized.
fn mean_pool(data: &[f32], attention_mask: &[i64], seq_len: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; EMBEDDING_DIM];
    let mut mask_sum = 0.0f32;

    for (token_idx, &mask_val) in attention_mask.iter().enumerate().take(seq_len) {
        let weight = mask_val as f32;
        mask_sum += weight;
        let offset = token_idx * EMBEDDING_DIM;
        for (dim_idx, slot) in pooled.iter_mut().enumerate() {
            *slot += data[offset + dim_idx] * weight;
        }
    }

    if mask_sum > 0.0 {
        for value in &mut pooled {
            *value /= mask_sum;
        }
    }

    l2_normalize(&mut pooled);
    pooled
}
