//! Per-label pattern cache: accumulated schemas and few-shot examples.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use docsift_embeddings::EmbeddingProvider;

use crate::cache::fingerprint::safe_label;
use crate::error::CacheError;
use crate::models::extraction::ExtractedFields;
use crate::text::char_prefix;

/// Maximum few-shot examples retained per label; oldest evicted first.
pub const MAX_EXAMPLES: usize = 5;

/// Characters of source text kept as an example snippet.
pub const SNIPPET_CHARS: usize = 500;

/// One successful extraction kept for few-shot prompting.
///
/// Never mutated after creation; removed only by FIFO eviction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// First 500 characters of the source text.
    pub text_snippet: String,

    /// Validated field values from the extraction.
    pub extracted: ExtractedFields,

    /// Embedding of `text_snippet`, absent when generation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Everything known about one document-type label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelCache {
    /// Every field ever requested for this label, with its latest
    /// description. Grows monotonically; later descriptions win.
    #[serde(default)]
    pub known_fields: BTreeMap<String, String>,

    /// Few-shot examples in insertion order, at most [`MAX_EXAMPLES`].
    #[serde(default)]
    pub examples: Vec<Example>,
}

/// Context handed to prompt construction: the accumulated schema plus at
/// most one example, the closest structural analog of the current document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionContext {
    /// Accumulated field descriptions for the label.
    pub known_fields: BTreeMap<String, String>,

    /// Zero or one few-shot example.
    pub examples: Vec<Example>,
}

/// Persistent store of [`LabelCache`] records, one JSON file per label.
///
/// An in-process memo avoids re-reading label files on every request; each
/// label sits behind its own mutex so load, mutate, save sequences never lose
/// updates under concurrent request handling. Disk writes are atomic
/// (temp file + rename), and disk remains the source of truth across
/// processes; the memo is only ever a per-process accelerator.
pub struct PatternStore {
    dir: PathBuf,
    embeddings: Arc<EmbeddingProvider>,
    loaded: Mutex<HashMap<String, Arc<Mutex<LabelCache>>>>,
}

impl PatternStore {
    /// Open a pattern store rooted at `dir`, creating it if needed.
    pub fn new(
        dir: impl Into<PathBuf>,
        embeddings: Arc<EmbeddingProvider>,
    ) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            embeddings,
            loaded: Mutex::new(HashMap::new()),
        })
    }

    fn label_path(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_label(label)))
    }

    /// Memoized handle for a label; reads disk at most once per process
    /// until an explicit write replaces the record.
    fn entry(&self, label: &str) -> Result<Arc<Mutex<LabelCache>>, CacheError> {
        let mut loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = loaded.get(label) {
            return Ok(Arc::clone(slot));
        }

        let path = self.label_path(label);
        let cache = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            LabelCache::default()
        };

        let slot = Arc::new(Mutex::new(cache));
        loaded.insert(label.to_string(), Arc::clone(&slot));
        Ok(slot)
    }

    fn persist(&self, label: &str, cache: &LabelCache) -> Result<(), CacheError> {
        let json = serde_json::to_vec_pretty(cache)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.persist(self.label_path(label))
            .map_err(|e| CacheError::Io(e.error))?;
        Ok(())
    }

    /// The current cache for `label`, empty if nothing is stored yet.
    pub fn load(&self, label: &str) -> Result<LabelCache, CacheError> {
        let slot = self.entry(label)?;
        let guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }

    /// Replace the stored cache for `label`.
    pub fn save(&self, label: &str, cache: &LabelCache) -> Result<(), CacheError> {
        let slot = self.entry(label)?;
        let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        *guard = cache.clone();
        self.persist(label, &guard)
    }

    /// Merge newly requested fields into the label's accumulated schema.
    ///
    /// Union semantics: unknown fields are added, and a later description
    /// overwrites an earlier one for the same field. Persists immediately.
    pub fn merge_schema(
        &self,
        label: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), CacheError> {
        let slot = self.entry(label)?;
        let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        for (name, description) in fields {
            guard.known_fields.insert(name.clone(), description.clone());
        }
        self.persist(label, &guard)
    }

    /// Record a successful extraction as a few-shot example.
    ///
    /// Embeds the leading snippet (absence of an embedding is a routine
    /// outcome, not an error), appends, evicts the oldest example beyond
    /// [`MAX_EXAMPLES`], and persists immediately.
    pub fn add_example(
        &self,
        label: &str,
        text: &str,
        extracted: ExtractedFields,
    ) -> Result<(), CacheError> {
        let snippet = char_prefix(text, SNIPPET_CHARS).to_string();
        // Inference can be slow; run it before taking the label lock.
        let embedding = self.embeddings.embed(&snippet);

        let slot = self.entry(label)?;
        let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());

        while guard.examples.len() >= MAX_EXAMPLES {
            guard.examples.remove(0);
            debug!(label, "evicted oldest few-shot example");
        }
        guard.examples.push(Example {
            text_snippet: snippet,
            extracted,
            embedding,
        });

        self.persist(label, &guard)
    }

    /// Retrieve prompt context for `label`.
    ///
    /// With `current_text`, returns the stored example whose embedding is
    /// most cosine-similar to the current document (earliest wins a tie);
    /// without it, or whenever embeddings are unusable on either side,
    /// falls back to the most recently added example.
    pub fn get_context(
        &self,
        label: &str,
        current_text: Option<&str>,
    ) -> Result<ExtractionContext, CacheError> {
        let slot = self.entry(label)?;
        let guard = slot.lock().unwrap_or_else(|e| e.into_inner());

        let chosen = if guard.examples.is_empty() {
            None
        } else {
            match current_text {
                Some(text) => self.most_similar(&guard.examples, text),
                None => guard.examples.last(),
            }
        };

        Ok(ExtractionContext {
            known_fields: guard.known_fields.clone(),
            examples: chosen.into_iter().cloned().collect(),
        })
    }

    fn most_similar<'a>(&self, examples: &'a [Example], text: &str) -> Option<&'a Example> {
        let query = match self.embeddings.embed(char_prefix(text, SNIPPET_CHARS)) {
            Some(query) => query,
            None => {
                debug!("query embedding unavailable, falling back to latest example");
                return examples.last();
            }
        };

        let mut best: Option<&Example> = None;
        let mut best_score = -1.0f32;
        for example in examples {
            let Some(stored) = example.embedding.as_deref() else {
                continue;
            };
            // Strict comparison keeps the earliest example on exact ties.
            let score = cosine_similarity(&query, stored);
            if score > best_score {
                best_score = score;
                best = Some(example);
            }
        }

        if best.is_none() {
            warn!("no stored example carries an embedding, falling back to latest");
        }
        best.or_else(|| examples.last())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsift_embeddings::{EmbeddingModel, MockEmbedder};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Maps texts to fixed 2-d vectors by their first character so tests
    /// can dictate similarity rankings.
    struct AxisEmbedder;

    impl EmbeddingModel for AxisEmbedder {
        fn embed(&self, text: &str) -> docsift_embeddings::Result<Vec<f32>> {
            Ok(match text.chars().next() {
                Some('A') => vec![1.0, 0.0],
                Some('B') => vec![0.0, 1.0],
                _ => vec![0.7, 0.7],
            })
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn store_with(dir: &TempDir, provider: EmbeddingProvider) -> PatternStore {
        PatternStore::new(dir.path(), Arc::new(provider)).unwrap()
    }

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn payload(marker: &str) -> ExtractedFields {
        let mut data = ExtractedFields::new();
        data.insert("nome".to_string(), serde_json::json!(marker));
        data
    }

    #[test]
    fn load_returns_empty_cache_for_unknown_label() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, EmbeddingProvider::disabled());

        let cache = store.load("carteira_oab").unwrap();
        assert!(cache.known_fields.is_empty());
        assert!(cache.examples.is_empty());
    }

    #[test]
    fn merge_schema_accumulates_with_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, EmbeddingProvider::disabled());

        store
            .merge_schema("carteira_oab", &fields(&[("nome", "Nome"), ("inscricao", "Número")]))
            .unwrap();
        store
            .merge_schema(
                "carteira_oab",
                &fields(&[("nome", "Nome completo"), ("seccional", "Sigla UF")]),
            )
            .unwrap();

        let cache = store.load("carteira_oab").unwrap();
        assert_eq!(
            cache.known_fields,
            fields(&[
                ("nome", "Nome completo"),
                ("inscricao", "Número"),
                ("seccional", "Sigla UF"),
            ])
        );
    }

    #[test]
    fn examples_are_bounded_to_five_fifo() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, EmbeddingProvider::disabled());

        for i in 1..=6 {
            store
                .add_example("carteira_oab", &format!("documento {i}"), payload(&format!("E{i}")))
                .unwrap();
        }

        let cache = store.load("carteira_oab").unwrap();
        assert_eq!(cache.examples.len(), MAX_EXAMPLES);
        let markers: Vec<_> = cache
            .examples
            .iter()
            .map(|e| e.extracted["nome"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(markers, vec!["E2", "E3", "E4", "E5", "E6"]);
    }

    #[test]
    fn snippets_keep_only_the_leading_characters() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, EmbeddingProvider::disabled());

        let text = "x".repeat(SNIPPET_CHARS + 200);
        store.add_example("rg", &text, payload("E1")).unwrap();

        let cache = store.load("rg").unwrap();
        assert_eq!(cache.examples[0].text_snippet.chars().count(), SNIPPET_CHARS);
    }

    #[test]
    fn context_without_examples_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, EmbeddingProvider::disabled());

        store
            .merge_schema("carteira_oab", &fields(&[("nome", "Nome")]))
            .unwrap();
        let context = store.get_context("carteira_oab", Some("qualquer")).unwrap();

        assert_eq!(context.known_fields, fields(&[("nome", "Nome")]));
        assert!(context.examples.is_empty());
    }

    #[test]
    fn context_without_query_text_returns_latest_example() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, EmbeddingProvider::disabled());

        store.add_example("rg", "primeiro", payload("E1")).unwrap();
        store.add_example("rg", "segundo", payload("E2")).unwrap();

        let context = store.get_context("rg", None).unwrap();
        assert_eq!(context.examples.len(), 1);
        assert_eq!(context.examples[0].extracted["nome"], "E2");
    }

    #[test]
    fn context_picks_the_most_similar_example() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, EmbeddingProvider::from_model(AxisEmbedder));

        store.add_example("rg", "A primeira via", payload("EA")).unwrap();
        store.add_example("rg", "B segunda via", payload("EB")).unwrap();

        let context = store.get_context("rg", Some("A consulta nova")).unwrap();
        assert_eq!(context.examples[0].extracted["nome"], "EA");

        let context = store.get_context("rg", Some("B consulta nova")).unwrap();
        assert_eq!(context.examples[0].extracted["nome"], "EB");
    }

    #[test]
    fn exact_similarity_ties_keep_the_earliest_example() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, EmbeddingProvider::from_model(AxisEmbedder));

        // Both map to the same vector; the query matches both equally.
        store.add_example("rg", "A um", payload("E1")).unwrap();
        store.add_example("rg", "A dois", payload("E2")).unwrap();

        let context = store.get_context("rg", Some("A consulta")).unwrap();
        assert_eq!(context.examples[0].extracted["nome"], "E1");
    }

    #[test]
    fn examples_without_embeddings_are_skipped_in_ranking() {
        let dir = TempDir::new().unwrap();

        // First example stored while embeddings were unavailable.
        {
            let store = store_with(&dir, EmbeddingProvider::disabled());
            store.add_example("rg", "B sem embedding", payload("E1")).unwrap();
        }
        let store = store_with(&dir, EmbeddingProvider::from_model(AxisEmbedder));
        store.add_example("rg", "A com embedding", payload("E2")).unwrap();

        let context = store.get_context("rg", Some("B consulta")).unwrap();
        // E1 would win on text, but it has no embedding: E2 is the only candidate.
        assert_eq!(context.examples[0].extracted["nome"], "E2");
    }

    #[test]
    fn query_embedding_failure_falls_back_to_latest() {
        let dir = TempDir::new().unwrap();

        {
            let store = store_with(&dir, EmbeddingProvider::from_model(AxisEmbedder));
            store.add_example("rg", "A um", payload("E1")).unwrap();
            store.add_example("rg", "B dois", payload("E2")).unwrap();
        }

        let store = store_with(&dir, EmbeddingProvider::disabled());
        let context = store.get_context("rg", Some("A consulta")).unwrap();
        assert_eq!(context.examples[0].extracted["nome"], "E2");
    }

    #[test]
    fn save_replaces_the_stored_record() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, EmbeddingProvider::disabled());

        store
            .merge_schema("rg", &fields(&[("nome", "Nome"), ("cpf", "CPF")]))
            .unwrap();

        let mut cache = store.load("rg").unwrap();
        cache.known_fields.insert("cpf".to_string(), "CPF do titular".to_string());
        store.save("rg", &cache).unwrap();

        assert_eq!(store.load("rg").unwrap(), cache);

        // The replacement is on disk, not just memoized.
        let reopened = store_with(&dir, EmbeddingProvider::disabled());
        assert_eq!(reopened.load("rg").unwrap(), cache);
    }

    #[test]
    fn records_survive_a_store_restart() {
        let dir = TempDir::new().unwrap();

        {
            let store = store_with(&dir, EmbeddingProvider::from_model(MockEmbedder::new()));
            store
                .merge_schema("carteira_oab", &fields(&[("nome", "Nome")]))
                .unwrap();
            store
                .add_example("carteira_oab", "texto do documento", payload("E1"))
                .unwrap();
        }

        let store = store_with(&dir, EmbeddingProvider::disabled());
        let cache = store.load("carteira_oab").unwrap();
        assert_eq!(cache.known_fields, fields(&[("nome", "Nome")]));
        assert_eq!(cache.examples.len(), 1);
        assert!(cache.examples[0].embedding.is_some());
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
