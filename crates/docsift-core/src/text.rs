//! Text cleanup and truncation helpers for extracted document text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Control characters except \n and \t.
    static ref CONTROL_CHARS: Regex =
        Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F-\u{9F}]").unwrap();

    // Runs of spaces/tabs.
    static ref SPACE_RUNS: Regex = Regex::new(r"[ \t]+").unwrap();

    // Three or more consecutive newlines.
    static ref BLANK_RUNS: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Longest prefix of `text` holding at most `max_chars` characters.
///
/// Counts characters, not bytes, so multi-byte text is never split inside
/// a code point. Snippets, stored prefixes, and fingerprints all truncate
/// through here so their boundaries agree.
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Normalize raw extracted text before prompting or caching.
///
/// Removes control characters (keeping newlines and tabs), collapses runs
/// of spaces, trims every line, and caps consecutive blank lines at one.
pub fn clean_text(text: &str) -> String {
    let no_control = CONTROL_CHARS.replace_all(text, "");
    let single_spaced = SPACE_RUNS.replace_all(&no_control, " ");

    let trimmed: String = single_spaced
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_RUNS.replace_all(&trimmed, "\n\n").trim().to_string()
}
