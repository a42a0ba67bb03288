//! Text scoring oracles used by the substitution funnel.
//!
//! The funnel treats these as pure functions: a word-overlap similarity
//! between an offer's representative name and an item description, a
//! TF-IDF nearest-neighbour distance between two item descriptions, and
//! the average-rank statistic used by rank normalization.

pub mod math;
pub mod rank;
pub mod similarity;
pub mod tfidf;

pub use math::{derive_seed, fnv1a_hash};
pub use rank::rank_average;
pub use similarity::{word_similarity, TokenOverlap, WordSimilarity, DEFAULT_DELIMITERS};
pub use tfidf::{DescriptionDistance, TfidfModel, TfidfNeighbours};
