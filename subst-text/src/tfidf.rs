//! TF-IDF description vectors and nearest-neighbour distances.
//!
//! The vectorizer is fitted on the candidate descriptions only, so the
//! reference description is projected onto the candidates' vocabulary.
//! Rows are L2-normalised; distance is euclidean.

use std::collections::HashMap;
use std::sync::LazyLock;

use ndarray::Array1;
use rayon::prelude::*;
use regex::Regex;

/// Words of two or more word characters.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("Invalid regex"));

/// Distance between a reference description and a set of candidates.
pub trait DescriptionDistance: Send + Sync {
    /// Returns one distance per candidate, in candidate order. Only the `k`
    /// closest candidates get a finite distance; the rest are
    /// `f64::INFINITY`. Must be deterministic for a fixed candidate list.
    fn distances(&self, reference: &str, candidates: &[&str], k: usize) -> Vec<f64>;
}

fn tokenize(doc: &str) -> Vec<String> {
    let lowered = doc.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Fitted vocabulary and inverse document frequencies.
#[derive(Clone, Debug)]
pub struct TfidfModel {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfModel {
    /// Fit on a corpus using smoothed idf: `ln((1 + n) / (1 + df)) + 1`.
    pub fn fit(docs: &[&str]) -> Self {
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<usize> = Vec::new();

        for doc in docs {
            let mut tokens = tokenize(doc);
            tokens.sort();
            tokens.dedup();
            for token in tokens {
                let next = vocabulary.len();
                let idx = *vocabulary.entry(token).or_insert(next);
                if idx == doc_freq.len() {
                    doc_freq.push(0);
                }
                doc_freq[idx] += 1;
            }
        }

        let n = docs.len() as f64;
        let idf = doc_freq
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        Self { vocabulary, idf }
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Project a document onto the fitted vocabulary. Unknown words are
    /// ignored; a document with no known words maps to the zero vector.
    pub fn transform(&self, doc: &str) -> Array1<f64> {
        let mut row = Array1::<f64>::zeros(self.idf.len());
        for token in tokenize(doc) {
            if let Some(&idx) = self.vocabulary.get(&token) {
                row[idx] += 1.0;
            }
        }
        for (value, idf) in row.iter_mut().zip(self.idf.iter()) {
            *value *= idf;
        }
        let norm = row.dot(&row).sqrt();
        if norm > 1e-15 {
            row /= norm;
        }
        row
    }
}

fn euclidean(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    let diff = a - b;
    diff.dot(&diff).sqrt()
}

/// K-nearest-neighbour scorer over TF-IDF vectors.
#[derive(Clone, Copy, Debug, Default)]
pub struct TfidfNeighbours;

impl DescriptionDistance for TfidfNeighbours {
    fn distances(&self, reference: &str, candidates: &[&str], k: usize) -> Vec<f64> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let k = k.min(candidates.len());

        let model = TfidfModel::fit(candidates);
        let reference_row = model.transform(reference);

        let raw: Vec<f64> = candidates
            .par_iter()
            .map(|doc| euclidean(&reference_row, &model.transform(doc)))
            .collect();

        // Closest first; equal distances keep candidate order.
        let mut order: Vec<usize> = (0..raw.len()).collect();
        order.sort_by(|&a, &b| raw[a].total_cmp(&raw[b]).then(a.cmp(&b)));

        let mut out = vec![f64::INFINITY; raw.len()];
        for &idx in order.iter().take(k) {
            out[idx] = raw[idx];
        }
        log::debug!(
            "tfidf neighbours: {} candidates, vocabulary {}, k={}",
            candidates.len(),
            model.vocabulary_len(),
            k
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_description_has_zero_distance() {
        let candidates = ["whole milk 2l", "skim milk 1l", "white bread"];
        let d = TfidfNeighbours.distances("whole milk 2l", &candidates, 3);
        assert!(d[0].abs() < 1e-12, "expected 0, got {}", d[0]);
        assert!(d[1] > 0.0);
        assert!(d[2] > d[1], "unrelated item should be farther");
    }

    #[test]
    fn only_k_nearest_are_finite() {
        let candidates = ["whole milk", "skim milk", "white bread", "rye bread"];
        let d = TfidfNeighbours.distances("whole milk", &candidates, 2);
        assert_eq!(d.iter().filter(|x| x.is_finite()).count(), 2);
        assert!(d[0].is_finite());
    }

    #[test]
    fn k_larger_than_candidates_is_clamped() {
        let candidates = ["a bb", "cc dd"];
        let d = TfidfNeighbours.distances("bb", &candidates, 50);
        assert!(d.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn zero_k_gives_all_infinite() {
        let d = TfidfNeighbours.distances("milk", &["milk"], 0);
        assert_eq!(d, vec![f64::INFINITY]);
    }

    #[test]
    fn empty_candidates_gives_empty_output() {
        assert!(TfidfNeighbours.distances("milk", &[], 5).is_empty());
    }

    #[test]
    fn unknown_reference_is_equidistant() {
        // Zero reference vector: every normalised candidate sits at distance 1.
        let candidates = ["whole milk", "white bread"];
        let d = TfidfNeighbours.distances("zzz qqq", &candidates, 2);
        assert!((d[0] - 1.0).abs() < 1e-12);
        assert!((d[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn distances_are_deterministic() {
        let candidates = ["cheddar cheese 400g", "mozzarella cheese", "cheddar crackers"];
        let a = TfidfNeighbours.distances("old cheddar", &candidates, 2);
        let b = TfidfNeighbours.distances("old cheddar", &candidates, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn transform_rows_are_unit_length() {
        let model = TfidfModel::fit(&["apple pie", "apple juice", "grape juice"]);
        let row = model.transform("apple juice");
        assert!((row.dot(&row) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn single_character_tokens_are_ignored() {
        let model = TfidfModel::fit(&["a b c", "milk"]);
        assert_eq!(model.vocabulary_len(), 1);
    }
}
