//! Word-overlap similarity between a short phrase and a longer description.
//!
//! The phrase is split into tokens on a delimiter pattern; the score is the
//! fraction of tokens that occur as substrings of the description. Both
//! sides are lower-cased and transliterated to ASCII first, so `"Café"`
//! matches `"CAFE"`.

use std::sync::LazyLock;

use deunicode::deunicode;
use regex::Regex;

/// Whitespace, slash and underscore.
pub const DEFAULT_DELIMITERS: &str = r"\s|/|_";

static DEFAULT_DELIMITER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_DELIMITERS).expect("Invalid regex"));

/// Scores how much of a phrase is found inside a description.
pub trait WordSimilarity: Send + Sync {
    /// Returns a value in `[0, 1]`.
    fn similarity(&self, phrase: &str, description: &str) -> f64;
}

/// Token-overlap scorer with a configurable delimiter pattern.
#[derive(Clone, Debug)]
pub struct TokenOverlap {
    delimiters: Regex,
}

impl TokenOverlap {
    /// Build a scorer splitting on the given regex alternation,
    /// e.g. `r"\s|/|_"`.
    pub fn new(delimiters: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            delimiters: Regex::new(delimiters)?,
        })
    }
}

impl Default for TokenOverlap {
    fn default() -> Self {
        Self {
            delimiters: DEFAULT_DELIMITER_RE.clone(),
        }
    }
}

impl WordSimilarity for TokenOverlap {
    fn similarity(&self, phrase: &str, description: &str) -> f64 {
        word_similarity(phrase, description, &self.delimiters)
    }
}

fn normalize(text: &str) -> String {
    deunicode(&text.to_lowercase())
}

/// Fraction of `phrase` tokens contained in `description`.
///
/// Empty tokens produced by adjacent delimiters are kept in the denominator
/// and count as found, so a whitespace-only phrase scores 1. Only the empty
/// phrase scores 0.
pub fn word_similarity(phrase: &str, description: &str, delimiters: &Regex) -> f64 {
    let phrase = normalize(phrase);
    if phrase.is_empty() {
        return 0.0;
    }
    let description = normalize(description);

    let mut total = 0usize;
    let mut found = 0usize;
    for token in delimiters.split(&phrase) {
        total += 1;
        if description.contains(token) {
            found += 1;
        }
    }

    if total == 0 {
        return 0.0;
    }
    found as f64 / total as f64
}
