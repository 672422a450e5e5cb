//! Multi-tier caching for the extraction pipeline.
//!
//! Two independent tiers, combined behind [`CacheManager`]:
//! - the pattern cache accumulates per-label schema knowledge and few-shot
//!   examples, ranked semantically at retrieval time (accuracy);
//! - the result cache stores full extraction results by content hash with
//!   TTL expiry and template matching (speed).

pub mod fingerprint;

mod pattern_store;
mod result_store;

pub use pattern_store::{
    Example, ExtractionContext, LabelCache, MAX_EXAMPLES, PatternStore, SNIPPET_CHARS,
};
pub use result_store::{ResultCacheEntry, ResultStore, TEXT_PREFIX_CHARS, TemplateMatch};

use std::path::Path;
use std::sync::Arc;

use chrono::Duration;

use docsift_embeddings::EmbeddingProvider;

use crate::error::{CacheError, FingerprintError};
use crate::models::config::CacheConfig;
use crate::models::extraction::{ExtractedFields, ExtractionOutcome, ExtractionSchema};

/// Single entry point the extraction pipeline talks to.
///
/// Owns both cache tiers and a shared embedding capability. Construct one
/// per worker process and pass it by reference to whatever builds the
/// pipeline; every failure mode inside the caches either surfaces as a
/// `Result` here or degrades to a miss, so caching stays strictly additive
/// to extraction.
pub struct CacheManager {
    patterns: PatternStore,
    results: ResultStore,
}

impl CacheManager {
    /// Open both cache tiers under the configured directories.
    pub fn new(
        config: &CacheConfig,
        embeddings: Arc<EmbeddingProvider>,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            patterns: PatternStore::new(&config.pattern_dir, embeddings)?,
            results: ResultStore::new(
                &config.results_dir,
                Duration::hours(config.ttl_hours as i64),
            )?,
        })
    }

    /// Prompt context for a new extraction.
    ///
    /// Merges the requested schema into the label's accumulated fields
    /// first, so `known_fields` stays a superset of every field ever
    /// requested, then retrieves the closest stored example for
    /// `current_text` (or the latest one without it).
    pub fn get_context(
        &self,
        label: &str,
        schema: &ExtractionSchema,
        current_text: Option<&str>,
    ) -> Result<ExtractionContext, CacheError> {
        self.patterns.merge_schema(label, schema)?;
        self.patterns.get_context(label, current_text)
    }

    /// Merge newly requested fields into the label's accumulated schema.
    pub fn merge_schema(&self, label: &str, schema: &ExtractionSchema) -> Result<(), CacheError> {
        self.patterns.merge_schema(label, schema)
    }

    /// Record a successful, validated extraction as a few-shot example.
    pub fn add_example(
        &self,
        label: &str,
        text: &str,
        extracted: ExtractedFields,
    ) -> Result<(), CacheError> {
        self.patterns.add_example(label, text, extracted)
    }

    /// Cached result for a document file, if present and unexpired.
    pub fn cached_result(
        &self,
        document: &Path,
        label: &str,
        schema: &ExtractionSchema,
    ) -> Result<Option<ExtractionOutcome>, FingerprintError> {
        self.results.get(document, label, schema)
    }

    /// Cached result for in-memory document bytes.
    pub fn cached_result_bytes(
        &self,
        bytes: &[u8],
        label: &str,
        schema: &ExtractionSchema,
    ) -> Option<ExtractionOutcome> {
        self.results.get_bytes(bytes, label, schema)
    }

    /// Cache an extraction result for a document file.
    pub fn save_result(
        &self,
        document: &Path,
        label: &str,
        schema: &ExtractionSchema,
        result: &ExtractionOutcome,
    ) -> Result<(), FingerprintError> {
        self.results.put(document, label, schema, result)
    }

    /// Cache an extraction result, retaining leading text for template
    /// matching.
    pub fn save_result_with_text(
        &self,
        document: &Path,
        text: &str,
        label: &str,
        schema: &ExtractionSchema,
        result: &ExtractionOutcome,
    ) -> Result<(), FingerprintError> {
        self.results.put_with_text(document, text, label, schema, result)
    }

    /// Cache an extraction result for in-memory document bytes.
    pub fn save_result_bytes(
        &self,
        bytes: &[u8],
        label: &str,
        schema: &ExtractionSchema,
        result: &ExtractionOutcome,
    ) {
        self.results.put_bytes(bytes, label, schema, result);
    }

    /// Cache an extraction result for in-memory bytes, retaining text.
    pub fn save_result_bytes_with_text(
        &self,
        bytes: &[u8],
        text: &str,
        label: &str,
        schema: &ExtractionSchema,
        result: &ExtractionOutcome,
    ) {
        self.results.put_bytes_with_text(bytes, text, label, schema, result);
    }

    /// Find a cached, structurally identical document for template reuse.
    pub fn find_similar_template(
        &self,
        text: &str,
        label: &str,
        schema: &ExtractionSchema,
        threshold: f64,
    ) -> Option<TemplateMatch> {
        self.results.find_similar_template(text, label, schema, threshold)
    }

    /// Garbage-collect expired result entries.
    pub fn sweep_expired(&self) -> usize {
        self.results.sweep()
    }

    /// The pattern cache tier.
    pub fn patterns(&self) -> &PatternStore {
        &self.patterns
    }

    /// The result cache tier.
    pub fn results(&self) -> &ResultStore {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::extraction::TokenUsage;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn manager(root: &TempDir) -> CacheManager {
        let config = CacheConfig {
            pattern_dir: root.path().join("cache"),
            results_dir: root.path().join("results"),
            ttl_hours: 24,
        };
        CacheManager::new(&config, Arc::new(EmbeddingProvider::disabled())).unwrap()
    }

    fn schema(fields: &[(&str, &str)]) -> ExtractionSchema {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn get_context_merges_the_requested_schema() {
        let root = TempDir::new().unwrap();
        let manager = manager(&root);
        let wide = schema(&[("nome", "Nome"), ("inscricao", "Número")]);

        let context = manager.get_context("carteira_oab", &wide, None).unwrap();
        assert_eq!(context.known_fields, wide);
        assert!(context.examples.is_empty());

        // Fields requested earlier stay known on later, narrower requests.
        let narrower = schema(&[("nome", "Nome")]);
        let context = manager.get_context("carteira_oab", &narrower, None).unwrap();
        assert!(context.known_fields.contains_key("inscricao"));
    }

    #[test]
    fn extraction_flow_round_trip() {
        let root = TempDir::new().unwrap();
        let manager = manager(&root);
        let schema = schema(&[("nome", "Nome")]);

        // Miss, extract, record, hit.
        assert!(manager.cached_result_bytes(b"PDF-A", "rg", &schema).is_none());

        let mut data = ExtractedFields::new();
        data.insert("nome".to_string(), serde_json::json!("SON GOKU"));
        let result = ExtractionOutcome {
            success: true,
            label: "rg".to_string(),
            data: data.clone(),
            cost: 0.001,
            tokens: TokenUsage::new(100, 20),
            from_cache: false,
            used_examples: false,
        };

        manager.add_example("rg", "texto do documento", data).unwrap();
        manager.save_result_bytes(b"PDF-A", "rg", &schema, &result);

        assert_eq!(
            manager.cached_result_bytes(b"PDF-A", "rg", &schema),
            Some(result)
        );
        let context = manager.get_context("rg", &schema, Some("texto novo")).unwrap();
        assert_eq!(context.examples.len(), 1);
    }
}
