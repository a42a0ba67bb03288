//! Named predicates and score retrievers used by the funnel.

mod predicates;
mod retrievers;

pub use predicates::{MatchingUom, ScoreAtLeast, ScoreAtMost, SoldAtOutlet};
pub use retrievers::{CurrentRevenue, StoredScore};
