//! Deterministic embedder for tests and model-free environments.

use super::{EMBEDDING_DIM, EmbeddingModel};
use crate::Result;

/// Embedding model that derives a unit vector from the input bytes.
///
/// Produces stable, text-dependent vectors without any model files, so
/// retrieval code can be exercised offline. Not semantically meaningful.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    /// Create a mock embedder with the reference dimension.
    pub fn new() -> Self {
        Self {
            dimension: EMBEDDING_DIM,
        }
    }

    /// Override the output dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingModel for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let bytes = text.as_bytes();
        let mut vector = vec![0.0f32; self.dimension];

        for (i, slot) in vector.iter_mut().enumerate() {
            let byte = if bytes.is_empty() {
                0
            } else {
                bytes[(i * 7 + 3) % bytes.len()]
            };
            *slot = f32::from(byte) / 255.0 + (i as f32) / (self.dimension as f32);
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_returns_configured_dimension() {
        let embedder = MockEmbedder::new();
        assert_eq!(embedder.embed("hello").unwrap().len(), EMBEDDING_DIM);

        let small = MockEmbedder::new().with_dimension(8);
        assert_eq!(small.embed("hello").unwrap().len(), 8);
    }

    #[test]
    fn embed_is_deterministic() {
        let embedder = MockEmbedder::new();
        assert_eq!(
            embedder.embed("same text").unwrap(),
            embedder.embed("same text").unwrap()
        );
    }

    #[test]
    fn different_texts_produce_different_vectors() {
        let embedder = MockEmbedder::new();
        assert_ne!(
            embedder.embed("text A").unwrap(),
            embedder.embed("text B").unwrap()
        );
    }

    #[test]
    fn vectors_are_l2_normalized() {
        let embedder = MockEmbedder::new();
        let vector = embedder.embed("normalize me").unwrap();
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01, "expected unit norm, got {norm}");
    }

    #[test]
    fn empty_text_is_handled() {
        let embedder = MockEmbedder::new();
        assert_eq!(embedder.embed("").unwrap().len(), EMBEDDING_DIM);
    }
}
