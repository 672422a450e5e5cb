//! Brazilian date (dd/mm/yyyy) extraction.

use std::collections::HashSet;

use super::patterns::DATE_BR;

/// Extract the first dd/mm/yyyy date from text.
pub fn extract_first_date(text: &str) -> Option<String> {
    DATE_BR.find(text).map(|m| m.as_str().to_string())
}

/// Extract every distinct dd/mm/yyyy date, in first-seen order.
///
/// Documents routinely carry several dates (issue, due, reference); the
/// pipeline lists all of them and lets the LLM pick the right one per field.
pub fn extract_all_dates(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    DATE_BR
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|date| seen.insert(date.clone()))
        .collect()
}
