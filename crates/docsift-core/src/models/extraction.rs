//! Extraction payload types shared between the cache and the pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An extraction schema: field name to human-readable description.
///
/// Backed by a `BTreeMap`, so serialization is canonically key-sorted and
/// two schemas with the same fields are identical regardless of the order
/// the caller supplied them in.
pub type ExtractionSchema = BTreeMap<String, String>;

/// Validated field values produced by an extraction (null when absent).
pub type ExtractedFields = BTreeMap<String, serde_json::Value>;

/// The full result of one extraction, as cached and returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    /// Whether the extraction succeeded.
    pub success: bool,

    /// Document-type label this result belongs to.
    pub label: String,

    /// Extracted field values, keyed by schema field name.
    pub data: ExtractedFields,

    /// LLM cost of the extraction in USD (zero when served from cache).
    pub cost: f64,

    /// Token accounting for the LLM call.
    pub tokens: TokenUsage,

    /// Whether this result was served from the result cache.
    #[serde(default)]
    pub from_cache: bool,

    /// Whether few-shot examples were included in the prompt.
    #[serde(default)]
    pub used_examples: bool,
}

/// Token counts for a single LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input: u64,

    /// Completion tokens.
    pub output: u64,

    /// Total tokens billed.
    pub total: u64,
}

impl TokenUsage {
    /// Build a usage record from prompt and completion counts.
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn token_usage_totals() {
        let usage = TokenUsage::new(450, 120);
        assert_eq!(usage.total, 570);
    }

    #[test]
    fn outcome_round_trips_through_json() {
        let mut data = ExtractedFields::new();
        data.insert("nome".to_string(), serde_json::json!("SON GOKU"));
        data.insert("inscricao".to_string(), serde_json::Value::Null);

        let outcome = ExtractionOutcome {
            success: true,
            label: "carteira_oab".to_string(),
            data,
            cost: 0.002499,
            tokens: TokenUsage::new(450, 120),
            from_cache: false,
            used_examples: true,
        };

        let json = serde_json::to_string(&outcome).unwrap();
        let back: ExtractionOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn outcome_tolerates_missing_flags() {
        // Records written before the cache flags existed still load.
        let json = r#"{
            "success": true,
            "label": "x",
            "data": {},
            "cost": 0.0,
            "tokens": {"input": 0, "output": 0, "total": 0}
        }"#;
        let outcome: ExtractionOutcome = serde_json::from_str(json).unwrap();
        assert!(!outcome.from_cache);
        assert!(!outcome.used_examples);
    }
}
