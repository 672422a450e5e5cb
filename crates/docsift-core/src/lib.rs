//! Core library for LLM-based document field extraction with multi-tier caching.
//!
//! This crate provides:
//! - Per-label pattern caching: accumulated schemas plus a bounded pool of
//!   few-shot examples with embedding-based retrieval
//! - Content-addressed result caching with TTL expiry and document-template
//!   matching
//! - Local regex extraction for structured Brazilian fields (CPF, CNPJ, CEP,
//!   dates, amounts)
//! - Text cleanup and USD to BRL cost conversion

pub mod cache;
pub mod currency;
pub mod error;
pub mod matcher;
pub mod models;
pub mod text;

pub use cache::{
    CacheManager, Example, ExtractionContext, LabelCache, PatternStore, ResultStore, TemplateMatch,
};
pub use currency::{AwesomeApiSource, CurrencyConverter, ExchangeInfo, RateSource};
pub use error::{CacheError, CurrencyError, DocsiftError, FingerprintError, Result};
pub use matcher::PatternMatcher;
pub use models::config::{CacheConfig, CurrencyConfig, DocsiftConfig, EmbeddingConfig};
pub use models::extraction::{ExtractedFields, ExtractionOutcome, ExtractionSchema, TokenUsage};

/// Re-export embedding types.
pub use docsift_embeddings::{EmbeddingModel, EmbeddingProvider, MockEmbedder};

#[cfg(feature = "onnx")]
pub use docsift_embeddings::OnnxEmbedder;
