//! Stable identifiers for documents, schemas, and cache entries.
//!
//! All digests are 128-bit MD5, hex-encoded. Collisions are treated as
//! cryptographically negligible; nothing here attempts to detect them.

use std::fs;
use std::path::Path;

use md5::{Digest, Md5};

use crate::error::FingerprintError;
use crate::models::extraction::ExtractionSchema;
use crate::text::char_prefix;

/// Characters of leading text that define a document's structural shape.
pub const FINGERPRINT_CHARS: usize = 500;

/// Hash of raw document bytes, 32 lowercase hex characters.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// Hash of a document file's contents.
///
/// An unreadable file is a hard error: without a content hash no cache key
/// can be formed, so this is the caller's problem to surface, never a miss.
pub fn content_hash_file(path: &Path) -> Result<String, FingerprintError> {
    let bytes = fs::read(path).map_err(|source| FingerprintError::UnreadableDocument {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content_hash(&bytes))
}

/// Short hash of an extraction schema, 8 hex characters.
///
/// The schema map is key-sorted, so field order at the call site never
/// changes the hash: two schemas with the same name and description pairs are
/// the same schema.
pub fn schema_hash(schema: &ExtractionSchema) -> String {
    let canonical = serde_json::to_string(schema).expect("string map serializes");
    let digest = hex::encode(Md5::digest(canonical.as_bytes()));
    digest[..8].to_string()
}

/// Composite key addressing one result-cache entry.
///
/// Format: `{content_hash}_{label}_{schema_hash}`. The label segment is
/// sanitized so the key is always usable as a file name.
pub fn result_cache_key(content_hash: &str, label: &str, schema_hash: &str) -> String {
    format!("{content_hash}_{}_{schema_hash}", safe_label(label))
}

/// Structural fingerprint of a document: hash of the label plus the first
/// 500 characters of text. Detects repeated templates independent of exact
/// byte-for-byte identity.
pub fn document_fingerprint(text: &str, label: &str) -> String {
    let structure = char_prefix(text, FINGERPRINT_CHARS);
    content_hash(format!("{label}:{structure}").as_bytes())
}

/// Label restricted to `[A-Za-z0-9._-]`, safe inside file names.
pub fn safe_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
