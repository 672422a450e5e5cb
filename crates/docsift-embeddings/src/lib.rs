//! Sentence-embedding layer for docsift.
//!
//! This crate provides:
//! - A backend-agnostic [`EmbeddingModel`] trait
//! - An ONNX implementation (all-MiniLM-L6-v2 via `ort`) behind the `onnx` feature
//! - A deterministic [`MockEmbedder`] for tests and model-free environments
//! - [`EmbeddingProvider`], a lazily-initialized capability that degrades to
//!   "no embedding available" instead of failing

mod backend;
mod error;
mod provider;

pub use backend::{EMBEDDING_DIM, EmbeddingModel, MockEmbedder};
pub use error::EmbeddingError;
pub use provider::EmbeddingProvider;

#[cfg(feature = "onnx")]
pub use backend::onnx::OnnxEmbedder;

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;
