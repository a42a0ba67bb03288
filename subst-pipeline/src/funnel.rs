//! Resolution of a single unassigned offer against its candidate pool.
//!
//! The funnel narrows the pool through named filter sets:
//!
//! ```text
//! ALL -> CURRENT -> OUTLET -+-> RELAUNCH                      (continuing offers)
//!                           +-> TOP_SELLERS -> SIMILAR -> DISTANCE (continuing)
//! ```
//!
//! and draws the substitute from the last non-empty set. A narrowing step
//! that empties its set falls back to the set it started from, except
//! `OUTLET`, whose emptiness ends the offer as out of stock.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rand::Rng;
use subst_text::{DescriptionDistance, WordSimilarity};

use crate::components::{
    CurrentRevenue, MatchingUom, ScoreAtLeast, ScoreAtMost, SoldAtOutlet, StoredScore,
};
use crate::config::FunnelConfig;
use crate::error::{FilterError, SubstitutionResult};
use crate::offers::{Offer, OfferStatus};
use crate::pool::{CandidatePool, MaskMode, NormMode};
use crate::sampling::{sample, SamplingStrategy};
use crate::types::{ItemCatalog, ItemId, OfferId, PeriodId, ScoreKey, SetName};

/// Status tag reported for a resolved offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Assigned,
    Relaunch,
    Unassigned,
    EmptyCluster,
    EmptyOutlet,
}

impl Outcome {
    /// True when the offer now occupies an item.
    pub fn is_assigned(self) -> bool {
        matches!(self, Outcome::Assigned | Outcome::Relaunch)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Outcome::Assigned => "ASSIGNED",
            Outcome::Relaunch => "RELAUNCH",
            Outcome::Unassigned => "UNASSIGNED",
            Outcome::EmptyCluster => "OUT OF STOCK - EMPTY CLUSTER",
            Outcome::EmptyOutlet => "OUT OF STOCK - EMPTY OUTLET",
        };
        f.write_str(tag)
    }
}

/// Filter-set sizes and flags captured when an offer resolves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FunnelAudit {
    pub pool_size: usize,
    pub set_sizes: BTreeMap<String, usize>,
    /// The offer had a real item in the previous period.
    pub continuing: bool,
    /// Sets that were emptied by their filter and restored.
    pub reverted: Vec<SetName>,
}

impl FunnelAudit {
    pub fn set_size(&self, name: &SetName) -> usize {
        self.set_sizes.get(&name.to_string()).copied().unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub outcome: Outcome,
    /// Item written onto the offer for the current period.
    pub item: ItemId,
    pub audit: FunnelAudit,
}

/// Substitution funnel bound to a configuration and two scoring oracles.
pub struct Funnel<'a, D: ?Sized, W: ?Sized> {
    config: &'a FunnelConfig,
    distance: &'a D,
    similarity: &'a W,
    catalog: Option<&'a ItemCatalog>,
}

impl<'a, D, W> Funnel<'a, D, W>
where
    D: DescriptionDistance + ?Sized,
    W: WordSimilarity + ?Sized,
{
    pub fn new(config: &'a FunnelConfig, distance: &'a D, similarity: &'a W) -> Self {
        Self {
            config,
            distance,
            similarity,
            catalog: None,
        }
    }

    /// Look up previous-item descriptions that are no longer in the pool.
    pub fn with_catalog(mut self, catalog: &'a ItemCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Resolve `offer` for `period` and write the outcome onto it.
    ///
    /// `occupied` holds the items already assigned to other offers of the
    /// same commodity at the offer's outlet. Scores and filter sets left by
    /// a previous resolution are cleared first. Sampling failures never
    /// escape; they end the offer as `Unassigned`.
    pub fn resolve<R>(
        &self,
        pool: &mut CandidatePool,
        offer: &mut Offer,
        period: PeriodId,
        occupied: &BTreeSet<ItemId>,
        rng: &mut R,
    ) -> SubstitutionResult<Resolution>
    where
        R: Rng + ?Sized,
    {
        pool.clear_filter_sets();
        pool.clear_scores();

        let previous = offer.previous_item(period);
        let carried = offer.carried_item(period);
        let mut audit = FunnelAudit {
            pool_size: pool.len(),
            continuing: previous.is_some(),
            ..FunnelAudit::default()
        };

        if pool.is_empty() {
            offer.add_period(period, OfferStatus::OutOfStock, carried);
            return Ok(finish(pool, Outcome::EmptyCluster, carried, audit));
        }

        if build_outlet_sets(pool, offer, period, occupied)? {
            log::warn!(
                "offer {}: every candidate is already assigned, CURRENT restored to the full pool",
                offer.id
            );
            audit.reverted.push(SetName::Current);
        }

        if pool.set_len(&SetName::Outlet) == 0 {
            offer.add_period(period, OfferStatus::OutOfStock, carried);
            return Ok(finish(pool, Outcome::EmptyOutlet, carried, audit));
        }

        if let Some(previous) = previous {
            self.score_distances(pool, previous, offer.id);

            pool.copy_filter_set(&SetName::Outlet, SetName::Relaunch)?;
            let near = ScoreAtMost {
                key: ScoreKey::Distance,
                max: self.config.relaunch_distance_cutoff,
            };
            pool.apply_predicate(&SetName::Relaunch, &near)?;

            if let Some(relaunched) = self.draw_relaunch(pool, offer.id, rng) {
                offer.add_period(period, OfferStatus::Continuity, relaunched);
                return Ok(finish(pool, Outcome::Relaunch, relaunched, audit));
            }
        }

        // Quantity
        pool.normalize(
            ScoreKey::Quantity,
            &CurrentRevenue { period },
            Some(&SetName::Outlet),
            NormMode::Rank,
            false,
        )?;
        pool.copy_filter_set(&SetName::Outlet, SetName::TopSellers)?;
        pool.apply_cutoff(
            &SetName::TopSellers,
            &StoredScore(ScoreKey::Quantity),
            Some(self.config.lower_quantity_cutoff),
            Some(self.config.upper_quantity_cutoff),
        )?;
        if pool.set_len(&SetName::TopSellers) == 0 {
            log::warn!(
                "offer {}: quantity cutoffs [{}, {}] removed every candidate, TOP_SELLERS restored to OUTLET",
                offer.id,
                self.config.lower_quantity_cutoff,
                self.config.upper_quantity_cutoff
            );
            pool.copy_filter_set(&SetName::Outlet, SetName::TopSellers)?;
            audit.reverted.push(SetName::TopSellers);
        }

        // Word similarity
        self.score_similarity(pool, &offer.rp_name);
        let best = pool
            .find_max(Some(&SetName::TopSellers), &StoredScore(ScoreKey::Similarity))?
            .map_or(0.0, |(_, value)| value);
        pool.copy_filter_set(&SetName::TopSellers, SetName::Similar)?;
        if best != 0.0 {
            let at_best = ScoreAtLeast {
                key: ScoreKey::Similarity,
                min: best,
            };
            pool.apply_predicate(&SetName::Similar, &at_best)?;
        }

        // Distance
        if previous.is_some() {
            pool.normalize(
                ScoreKey::NormDistance,
                &StoredScore(ScoreKey::Distance),
                Some(&SetName::Similar),
                NormMode::Rank,
                true,
            )?;
            pool.copy_filter_set(&SetName::Similar, SetName::Distance)?;
            pool.apply_cutoff(
                &SetName::Distance,
                &StoredScore(ScoreKey::NormDistance),
                Some(self.config.lower_distance_cutoff),
                Some(self.config.upper_distance_cutoff),
            )?;
            if pool.set_len(&SetName::Distance) == 0 {
                log::warn!(
                    "offer {}: distance cutoffs [{}, {}] removed every candidate, DISTANCE restored to SIMILAR",
                    offer.id,
                    self.config.lower_distance_cutoff,
                    self.config.upper_distance_cutoff
                );
                pool.copy_filter_set(&SetName::Similar, SetName::Distance)?;
                audit.reverted.push(SetName::Distance);
            }
        }

        let (inner, weight) = if previous.is_some() {
            (SetName::Distance, ScoreKey::NormDistance)
        } else {
            (SetName::Similar, ScoreKey::Quantity)
        };
        let inner_ids = set_or_empty(pool, &inner);
        let outer_ids = set_or_empty(pool, &SetName::Outlet);

        match sample(
            pool,
            &inner_ids,
            &outer_ids,
            &StoredScore(weight),
            self.config.sampling_strategy,
            1,
            rng,
        ) {
            Ok(drawn) if !drawn.is_empty() => {
                let chosen = drawn[0];
                if let Some(item) = pool.item_mut(chosen) {
                    item.set_score(ScoreKey::Selected, 1.0);
                }
                offer.add_period(period, OfferStatus::Substitution, chosen);
                Ok(finish(pool, Outcome::Assigned, chosen, audit))
            }
            Ok(_) => {
                log::warn!("offer {}: sampler returned no item", offer.id);
                offer.add_period(period, OfferStatus::OutOfStock, carried);
                Ok(finish(pool, Outcome::Unassigned, carried, audit))
            }
            Err(e) => {
                log::warn!("offer {}: {}", offer.id, e);
                offer.add_period(period, OfferStatus::OutOfStock, carried);
                Ok(finish(pool, Outcome::Unassigned, carried, audit))
            }
        }
    }

    /// Word similarity between `phrase` and `description` under this
    /// funnel's oracle.
    pub fn similarity(&self, phrase: &str, description: &str) -> f64 {
        self.similarity.similarity(phrase, description)
    }

    /// Store `Distance` on every `OUTLET` item: the oracle's distance from
    /// the previous item's description, bounded to the configured number of
    /// neighbours.
    fn score_distances(&self, pool: &mut CandidatePool, previous: ItemId, offer_id: OfferId) {
        let ids: Vec<ItemId> = set_or_empty(pool, &SetName::Outlet)
            .into_iter()
            .filter(|id| pool.contains(*id))
            .collect();

        let reference = pool
            .item(previous)
            .map(|item| item.description.clone())
            .or_else(|| {
                self.catalog
                    .and_then(|catalog| catalog.description(previous))
                    .map(str::to_string)
            });

        let distances = match reference {
            Some(reference) => {
                let descriptions: Vec<&str> = ids
                    .iter()
                    .filter_map(|id| pool.item(*id))
                    .map(|item| item.description.as_str())
                    .collect();
                let k = self.config.neighbour_count.unwrap_or(descriptions.len());
                self.distance.distances(&reference, &descriptions, k)
            }
            None => {
                log::warn!(
                    "offer {}: no description for previous item {}, distances unbounded",
                    offer_id,
                    previous
                );
                vec![f64::INFINITY; ids.len()]
            }
        };

        for (id, distance) in ids.iter().zip(distances) {
            if let Some(item) = pool.item_mut(*id) {
                item.set_score(ScoreKey::Distance, distance);
            }
        }
    }

    fn score_similarity(&self, pool: &mut CandidatePool, phrase: &str) {
        let ids = set_or_empty(pool, &SetName::TopSellers);
        for id in ids {
            if let Some(item) = pool.item_mut(id) {
                let value = self.similarity.similarity(phrase, &item.description);
                item.set_score(ScoreKey::Similarity, value);
            }
        }
    }

    fn draw_relaunch<R>(
        &self,
        pool: &CandidatePool,
        offer_id: OfferId,
        rng: &mut R,
    ) -> Option<ItemId>
    where
        R: Rng + ?Sized,
    {
        let relaunch = set_or_empty(pool, &SetName::Relaunch);
        if relaunch.is_empty() {
            return None;
        }
        let outlet = set_or_empty(pool, &SetName::Outlet);
        match sample(
            pool,
            &relaunch,
            &outlet,
            &StoredScore(ScoreKey::Distance),
            SamplingStrategy::Cutoff,
            1,
            rng,
        ) {
            Ok(drawn) => drawn.first().copied(),
            Err(e) => {
                log::debug!("offer {}: relaunch draw failed: {}", offer_id, e);
                None
            }
        }
    }
}

/// Build `ALL`, `CURRENT` and `OUTLET` for `offer`.
///
/// `CURRENT` drops the `occupied` items, falling back to every item when
/// that leaves nothing. `OUTLET` keeps the `CURRENT` items sold at the
/// offer's outlet in `period` with the offer's unit of measure. Returns
/// whether `CURRENT` fell back.
pub fn build_outlet_sets(
    pool: &mut CandidatePool,
    offer: &Offer,
    period: PeriodId,
    occupied: &BTreeSet<ItemId>,
) -> Result<bool, FilterError> {
    pool.create_filter_set(SetName::All);
    pool.create_filter_set(SetName::Current);
    pool.apply_mask(&SetName::Current, occupied, MaskMode::Drop)?;

    let reverted = pool.set_len(&SetName::Current) == 0;
    if reverted {
        pool.create_filter_set(SetName::Current);
    }

    pool.copy_filter_set(&SetName::Current, SetName::Outlet)?;
    pool.apply_predicate(
        &SetName::Outlet,
        &SoldAtOutlet {
            outlet: offer.outlet,
            period,
        },
    )?;
    pool.apply_predicate(&SetName::Outlet, &MatchingUom { uom: &offer.uom })?;
    Ok(reverted)
}

fn set_or_empty(pool: &CandidatePool, name: &SetName) -> BTreeSet<ItemId> {
    pool.filter_set(name).cloned().unwrap_or_default()
}

fn finish(
    pool: &CandidatePool,
    outcome: Outcome,
    item: ItemId,
    mut audit: FunnelAudit,
) -> Resolution {
    audit.set_sizes = pool
        .filter_set_names()
        .map(|name| (name.to_string(), pool.set_len(name)))
        .collect();
    Resolution {
        outcome,
        item,
        audit,
    }
}
