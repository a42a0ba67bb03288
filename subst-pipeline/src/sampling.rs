//! Weighted random selection of a substitute from a scored pool.
//!
//! The candidate list and the probability vector depend on the strategy:
//!
//! | strategy           | candidates          | probabilities         |
//! |--------------------|---------------------|-----------------------|
//! | `cutoff`           | inner               | uniform               |
//! | `proportional`     | inner ∪ outer       | score over the union  |
//! | `top_proportional` | inner               | score over inner      |
//! | anything else      | outer               | uniform               |
//!
//! A probability vector whose mass is zero or not finite degrades to a
//! uniform draw over the same candidates.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::SamplingError;
use crate::pool::CandidatePool;
use crate::selector::ItemScore;
use crate::types::ItemId;

/// How the final candidate list and its probabilities are chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SamplingStrategy {
    Cutoff,
    Proportional,
    TopProportional,
    #[default]
    Random,
}

impl SamplingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingStrategy::Cutoff => "cutoff",
            SamplingStrategy::Proportional => "proportional",
            SamplingStrategy::TopProportional => "top_proportional",
            SamplingStrategy::Random => "random",
        }
    }
}

impl fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SamplingStrategy {
    /// Unrecognised tags select `Random`.
    fn from(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "cutoff" => SamplingStrategy::Cutoff,
            "proportional" => SamplingStrategy::Proportional,
            "top_proportional" => SamplingStrategy::TopProportional,
            _ => SamplingStrategy::Random,
        }
    }
}

impl From<String> for SamplingStrategy {
    fn from(tag: String) -> Self {
        SamplingStrategy::from(tag.as_str())
    }
}

impl From<SamplingStrategy> for String {
    fn from(strategy: SamplingStrategy) -> Self {
        strategy.as_str().to_string()
    }
}

impl FromStr for SamplingStrategy {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SamplingStrategy::from(s))
    }
}

/// Draw `n` item ids from `pool` (with replacement).
///
/// Ids in `inner`/`outer` that are no longer in the pool are skipped. A
/// missing score counts as zero probability.
pub fn sample<S, R>(
    pool: &CandidatePool,
    inner: &BTreeSet<ItemId>,
    outer: &BTreeSet<ItemId>,
    probability: &S,
    strategy: SamplingStrategy,
    n: usize,
    rng: &mut R,
) -> Result<Vec<ItemId>, SamplingError>
where
    S: ItemScore + ?Sized,
    R: Rng + ?Sized,
{
    if pool.is_empty() {
        return Err(SamplingError::EmptyPopulation {
            strategy,
            inner: inner.len(),
            outer: outer.len(),
        });
    }

    let (candidates, weighted): (Vec<ItemId>, bool) = match strategy {
        SamplingStrategy::Cutoff => (live_ids(pool, inner.iter()), false),
        SamplingStrategy::Proportional => (live_ids(pool, inner.union(outer)), true),
        SamplingStrategy::TopProportional => (live_ids(pool, inner.iter()), true),
        SamplingStrategy::Random => (live_ids(pool, outer.iter()), false),
    };

    if candidates.is_empty() {
        return Err(SamplingError::EmptySubpopulation {
            strategy,
            inner: inner.len(),
            outer: outer.len(),
        });
    }

    let weights = if weighted {
        probabilities(pool, &candidates, probability)
    } else {
        None
    };

    let drawn = match weights.and_then(|w| WeightedIndex::new(&w).ok()) {
        Some(index) => (0..n).map(|_| candidates[index.sample(rng)]).collect(),
        None => (0..n).filter_map(|_| candidates.choose(rng).copied()).collect(),
    };
    Ok(drawn)
}

fn live_ids<'a>(pool: &CandidatePool, ids: impl Iterator<Item = &'a ItemId>) -> Vec<ItemId> {
    ids.copied().filter(|id| pool.contains(*id)).collect()
}

/// Normalised probabilities, or `None` when the draw must be uniform.
fn probabilities<S>(
    pool: &CandidatePool,
    candidates: &[ItemId],
    probability: &S,
) -> Option<Vec<f64>>
where
    S: ItemScore + ?Sized,
{
    let raw: Vec<f64> = candidates
        .iter()
        .map(|id| {
            pool.item(*id)
                .and_then(|item| probability.score(item))
                .unwrap_or(0.0)
        })
        .collect();

    let total: f64 = raw.iter().sum();
    if total == 0.0 || !total.is_finite() {
        log::debug!(
            "sampling: probability mass {} over {} candidates, drawing uniformly",
            total,
            candidates.len()
        );
        return None;
    }

    Some(raw.iter().map(|p| (p / total).max(0.0)).collect())
}
