//! Configuration structures for the docsift pipeline.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the docsift core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsiftConfig {
    /// Cache configuration.
    pub cache: CacheConfig,

    /// Embedding model configuration.
    pub embedding: EmbeddingConfig,

    /// Currency conversion configuration.
    pub currency: CurrencyConfig,
}

/// Cache directories and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory for per-label pattern caches.
    pub pattern_dir: PathBuf,

    /// Directory for per-document result caches.
    pub results_dir: PathBuf,

    /// Time-to-live for cached results, in hours.
    pub ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            pattern_dir: PathBuf::from("cache"),
            results_dir: PathBuf::from(".results_cache"),
            ttl_hours: 24,
        }
    }
}

/// Embedding model location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Directory containing `model.onnx` and `tokenizer.json`.
    pub model_dir: PathBuf,

    /// Whether semantic example retrieval is enabled at all.
    pub enabled: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            enabled: true,
        }
    }
}

/// Exchange-rate retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    /// Rate endpoint (AwesomeAPI `last/USD-BRL` format).
    pub endpoint: String,

    /// How long a fetched rate stays fresh, in seconds.
    pub cache_secs: u64,

    /// Rate used when no fetch has ever succeeded.
    pub fallback_rate: Decimal,

    /// Request timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://economia.awesomeapi.com.br/last/USD-BRL".to_string(),
            cache_secs: 3600,
            fallback_rate: Decimal::new(500, 2),
            timeout_secs: 5,
        }
    }
}

impl DocsiftConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_expected_layout() {
        let config = DocsiftConfig::default();
        assert_eq!(config.cache.pattern_dir, PathBuf::from("cache"));
        assert_eq!(config.cache.results_dir, PathBuf::from(".results_cache"));
        assert_eq!(config.cache.ttl_hours, 24);
        assert_eq!(config.currency.fallback_rate, Decimal::new(500, 2));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: DocsiftConfig =
            serde_json::from_str(r#"{"cache": {"ttl_hours": 48}}"#).unwrap();
        assert_eq!(config.cache.ttl_hours, 48);
        assert_eq!(config.cache.pattern_dir, PathBuf::from("cache"));
        assert!(config.embedding.enabled);
    }
}
