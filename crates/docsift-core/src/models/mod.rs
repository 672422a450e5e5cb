//! Data models: extraction records and configuration.

pub mod config;
pub mod extraction;

pub use config::{CacheConfig, CurrencyConfig, DocsiftConfig, EmbeddingConfig};
pub use extraction::{ExtractedFields, ExtractionOutcome, ExtractionSchema, TokenUsage};
