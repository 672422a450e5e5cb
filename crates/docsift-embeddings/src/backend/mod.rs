//! Embedding model implementations.

#[cfg(feature = "onnx")]
pub mod onnx;

mod mock;

pub use mock::MockEmbedder;

use crate::Result;

/// Embedding dimension of all-MiniLM-L6-v2, the reference model.
pub const EMBEDDING_DIM: usize = 384;

/// Trait for text-to-vector embedding models.
///
/// Implementations must be cheap to call through a shared reference;
/// any interior state (e.g. a runtime session) handles its own locking.
pub trait EmbeddingModel: Send + Sync {
    /// Embed a text into a fixed-length vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of the vectors produced by [`embed`](Self::embed).
    fn dimension(&self) -> usize;
}
