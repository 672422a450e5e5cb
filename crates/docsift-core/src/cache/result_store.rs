//! Content-addressed cache of full extraction results with TTL expiry.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::cache::fingerprint::{
    content_hash, content_hash_file, document_fingerprint, result_cache_key, safe_label,
    schema_hash,
};
use crate::error::{CacheError, FingerprintError};
use crate::models::extraction::{ExtractionOutcome, ExtractionSchema};
use crate::text::char_prefix;

/// Characters of source text retained for template matching.
pub const TEXT_PREFIX_CHARS: usize = 1000;

/// On-disk record for one cached extraction result.
///
/// Self-describing: each file carries its own timestamp, label, and schema
/// field list, so entries are independently readable and removable with no
/// index or log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultCacheEntry {
    /// When the result was cached (ISO-8601).
    pub cached_at: DateTime<Utc>,

    /// Document-type label.
    pub label: String,

    /// Ordered schema field names the result was extracted against.
    pub schema_fields: Vec<String>,

    /// First 1000 characters of source text; present only for entries
    /// written through the text-preserving save path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_prefix: Option<String>,

    /// The cached extraction result.
    pub result: ExtractionOutcome,
}

/// A structurally identical cached document found by template matching.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateMatch {
    /// The cached result to reuse.
    pub template: ExtractionOutcome,

    /// Fingerprint similarity; currently always `1.0` (exact match).
    pub similarity: f64,

    /// Path of the entry the match came from.
    pub source: PathBuf,
}

/// Result cache keyed by `{content_hash}_{label}_{schema_hash}`.
///
/// Reads fail open: any I/O or parse problem is a miss, never an error.
/// Writes are atomic and, when they fail, logged and swallowed: losing a
/// cache write must never abort an extraction that already succeeded.
/// Expiry is lazy (checked on read) plus an explicit [`sweep`](Self::sweep).
pub struct ResultStore {
    dir: PathBuf,
    ttl: Duration,
}

impl ResultStore {
    /// Open a result store rooted at `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, ttl })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn expired(&self, entry: &ResultCacheEntry) -> bool {
        Utc::now() - entry.cached_at > self.ttl
    }

    /// Look up the cached result for a document file.
    ///
    /// The key is derived internally from the document bytes, label, and
    /// schema; only an unreadable document propagates as an error.
    pub fn get(
        &self,
        document: &Path,
        label: &str,
        schema: &ExtractionSchema,
    ) -> Result<Option<ExtractionOutcome>, FingerprintError> {
        let hash = content_hash_file(document)?;
        Ok(self.lookup(&result_cache_key(&hash, label, &schema_hash(schema))))
    }

    /// Look up the cached result for in-memory document bytes.
    pub fn get_bytes(
        &self,
        bytes: &[u8],
        label: &str,
        schema: &ExtractionSchema,
    ) -> Option<ExtractionOutcome> {
        self.lookup(&result_cache_key(&content_hash(bytes), label, &schema_hash(schema)))
    }

    fn lookup(&self, key: &str) -> Option<ExtractionOutcome> {
        let path = self.entry_path(key);

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(key, error = %e, "result cache read failed, treating as miss");
                return None;
            }
        };

        let entry: ResultCacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "malformed result cache entry, treating as miss");
                return None;
            }
        };

        if self.expired(&entry) {
            debug!(key, "result cache entry expired, removing");
            if let Err(e) = fs::remove_file(&path) {
                warn!(key, error = %e, "failed to remove expired result cache entry");
            }
            return None;
        }

        debug!(key, "result cache hit");
        Some(entry.result)
    }

    /// Cache the result for a document file, overwriting any prior entry.
    pub fn put(
        &self,
        document: &Path,
        label: &str,
        schema: &ExtractionSchema,
        result: &ExtractionOutcome,
    ) -> Result<(), FingerprintError> {
        let hash = content_hash_file(document)?;
        self.store(&hash, label, schema, None, result);
        Ok(())
    }

    /// Cache the result for a document file, retaining the leading source
    /// text so the entry can later serve as a template candidate.
    pub fn put_with_text(
        &self,
        document: &Path,
        text: &str,
        label: &str,
        schema: &ExtractionSchema,
        result: &ExtractionOutcome,
    ) -> Result<(), FingerprintError> {
        let hash = content_hash_file(document)?;
        let prefix = char_prefix(text, TEXT_PREFIX_CHARS).to_string();
        self.store(&hash, label, schema, Some(prefix), result);
        Ok(())
    }

    /// Cache the result for in-memory document bytes.
    pub fn put_bytes(
        &self,
        bytes: &[u8],
        label: &str,
        schema: &ExtractionSchema,
        result: &ExtractionOutcome,
    ) {
        self.store(&content_hash(bytes), label, schema, None, result);
    }

    /// Cache the result for in-memory document bytes, retaining text.
    pub fn put_bytes_with_text(
        &self,
        bytes: &[u8],
        text: &str,
        label: &str,
        schema: &ExtractionSchema,
        result: &ExtractionOutcome,
    ) {
        let prefix = char_prefix(text, TEXT_PREFIX_CHARS).to_string();
        self.store(&content_hash(bytes), label, schema, Some(prefix), result);
    }

    fn store(
        &self,
        content_hash: &str,
        label: &str,
        schema: &ExtractionSchema,
        text_prefix: Option<String>,
        result: &ExtractionOutcome,
    ) {
        let key = result_cache_key(content_hash, label, &schema_hash(schema));
        let entry = ResultCacheEntry {
            cached_at: Utc::now(),
            label: label.to_string(),
            schema_fields: schema.keys().cloned().collect(),
            text_prefix,
            result: result.clone(),
        };

        // A lost cache write only costs a future miss.
        if let Err(e) = self.write_entry(&key, &entry) {
            warn!(key, error = %e, "failed to write result cache entry");
        }
    }

    fn write_entry(&self, key: &str, entry: &ResultCacheEntry) -> Result<(), CacheError> {
        let json = serde_json::to_vec_pretty(entry)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.persist(self.entry_path(key))
            .map_err(|e| CacheError::Io(e.error))?;
        Ok(())
    }

    /// Find an unexpired entry for the same label and schema whose retained
    /// text has the same structural fingerprint as `text`.
    ///
    /// Matching is exact fingerprint equality: `threshold` is accepted for
    /// interface stability but not applied to a graded similarity score, so
    /// a returned match always reports `similarity = 1.0`. Entries stored
    /// without text can never match. The scan is linear in the label's
    /// cached documents.
    pub fn find_similar_template(
        &self,
        text: &str,
        label: &str,
        schema: &ExtractionSchema,
        threshold: f64,
    ) -> Option<TemplateMatch> {
        let wanted = document_fingerprint(text, label);
        let wanted_fields: Vec<String> = schema.keys().cloned().collect();
        let marker = format!("_{}_", safe_label(label));

        debug!(label, threshold, "scanning result cache for a template match");

        for dirent in fs::read_dir(&self.dir).ok()?.flatten() {
            let path = dirent.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".json") || !name.contains(&marker) {
                continue;
            }
            let Ok(raw) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(entry) = serde_json::from_str::<ResultCacheEntry>(&raw) else {
                continue;
            };

            if entry.label != label
                || entry.schema_fields != wanted_fields
                || self.expired(&entry)
            {
                continue;
            }

            let candidate =
                document_fingerprint(entry.text_prefix.as_deref().unwrap_or(""), label);
            if candidate == wanted {
                info!(label, source = %path.display(), "template match found");
                return Some(TemplateMatch {
                    template: entry.result,
                    similarity: 1.0,
                    source: path,
                });
            }
        }

        None
    }

    /// Remove expired and unreadable entries; returns how many were removed.
    ///
    /// Lazy expiry only reclaims entries that are read again, so deployments
    /// with churn in document content should run this periodically.
    pub fn sweep(&self) -> usize {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return 0;
        };

        let mut removed = 0;
        for dirent in entries.flatten() {
            let path = dirent.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let stale = match fs::read_to_string(&path)
                .ok()
                .and_then(|raw| serde_json::from_str::<ResultCacheEntry>(&raw).ok())
            {
                Some(entry) => self.expired(&entry),
                // An unreadable entry can never be served again.
                None => true,
            };

            if stale && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "swept stale result cache entries");
        }
        removed
    }
}
