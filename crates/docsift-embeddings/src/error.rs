//! Error types for the embedding layer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or running an embedding model.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// A required model file is missing.
    #[error("model file not found: {0}")]
    ModelNotFound(PathBuf),

    /// Failed to initialize the model or its runtime session.
    #[error("failed to initialize model: {0}")]
    ModelInit(String),

    /// Tokenization of the input text failed.
    #[error("tokenization failed: {0}")]
    Tokenization(String),

    /// Inference execution failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// I/O error when reading model files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
