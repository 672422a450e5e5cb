//! Error types for the docsift-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the docsift library.
#[derive(Error, Debug)]
pub enum DocsiftError {
    /// Cache persistence error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Document fingerprinting error.
    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    /// Embedding layer error.
    #[error("embedding error: {0}")]
    Embedding(#[from] docsift_embeddings::EmbeddingError),

    /// Currency conversion error.
    #[error("currency error: {0}")]
    Currency(#[from] CurrencyError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors while deriving cache identifiers from a document.
///
/// These are the only cache-related failures that propagate to the
/// extraction pipeline: without a content hash no cache key exists, so the
/// caller has passed something that cannot be cached at all.
#[derive(Error, Debug)]
pub enum FingerprintError {
    /// The source document could not be read for hashing.
    #[error("failed to read document {path}: {source}")]
    UnreadableDocument {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors related to cache persistence.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading or writing a cache file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A cache record could not be serialized or parsed.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors related to exchange-rate retrieval.
#[derive(Error, Debug)]
pub enum CurrencyError {
    /// The rate endpoint could not be reached or returned an error status.
    #[error("rate request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The rate endpoint answered with an unexpected payload.
    #[error("malformed rate response: {0}")]
    MalformedResponse(String),
}

/// Result type for the docsift library.
pub type Result<T> = std::result::Result<T, DocsiftError>;
