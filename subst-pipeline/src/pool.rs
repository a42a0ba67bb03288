//! Candidate pool: the items of one commodity within one geography, plus
//! the named filter sets the funnel narrows step by step.
//!
//! Filter sets freeze at creation. Removing an item scrubs it from every
//! set, but sets built by other means may still name ids that are no
//! longer in the pool; every operation tolerates such stale ids.

use std::collections::{BTreeMap, BTreeSet};

use subst_text::rank_average;

use crate::error::FilterError;
use crate::filter::ItemPredicate;
use crate::records::SuggestionRow;
use crate::selector::{descending_nan_last, ItemScore};
use crate::types::{CatalogEntry, Item, ItemId, OfferId, OutletId, PeriodId, ScoreKey, SetName};

/// What `apply_mask` does with the supplied ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskMode {
    /// Remove the ids from the set.
    Drop,
    /// Replace the set with the ids verbatim. The caller must pass a subset
    /// of the target set when containment matters; nothing is intersected.
    Keep,
}

/// How raw scores are rescaled by `normalize`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormMode {
    /// Average rank over the scope divided by its size.
    Rank,
    /// Min-max scaling onto [0, 1].
    Magnitude,
    /// Share of the scope's total.
    Weight,
}

#[derive(Clone, Debug, Default)]
pub struct CandidatePool {
    items: BTreeMap<ItemId, Item>,
    filter_sets: BTreeMap<SetName, BTreeSet<ItemId>>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Record a sales observation, creating the item from its catalog entry
    /// on first sight.
    pub fn add_observation(
        &mut self,
        entry: &CatalogEntry,
        period: PeriodId,
        outlet: OutletId,
        unit_size: f64,
        unit_count: f64,
        revenue: f64,
    ) {
        self.items
            .entry(entry.item_id)
            .or_insert_with(|| {
                Item::new(
                    entry.item_id,
                    entry.uom.clone(),
                    entry.brand_type.clone(),
                    entry.description.clone(),
                )
            })
            .add_observation(period, outlet, unit_size, unit_count, revenue);
    }

    /// Insert a fully built item, replacing any item with the same id.
    pub fn insert_item(&mut self, item: Item) {
        self.items.insert(item.id, item);
    }

    /// Delete an item and scrub its id from every filter set.
    pub fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        for set in self.filter_sets.values_mut() {
            set.remove(&id);
        }
        self.items.remove(&id)
    }

    /// Remove every item without a sales record in `period`. Returns the
    /// number of items removed.
    pub fn remove_absent(&mut self, period: PeriodId) -> usize {
        let absent: Vec<ItemId> = self
            .items
            .values()
            .filter(|item| !item.is_present(period))
            .map(|item| item.id)
            .collect();
        for id in &absent {
            self.remove_item(*id);
        }
        absent.len()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn ids(&self) -> BTreeSet<ItemId> {
        self.items.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every derived score on every item.
    pub fn clear_scores(&mut self) {
        for item in self.items.values_mut() {
            item.clear_scores();
        }
    }

    // -----------------------------------------------------------------------
    // Filter sets
    // -----------------------------------------------------------------------

    /// Snapshot the current item ids under `name`, replacing any prior set.
    pub fn create_filter_set(&mut self, name: SetName) {
        let ids = self.ids();
        self.filter_sets.insert(name, ids);
    }

    pub fn copy_filter_set(&mut self, src: &SetName, dst: SetName) -> Result<(), FilterError> {
        let copy = self.require(src)?.clone();
        self.filter_sets.insert(dst, copy);
        Ok(())
    }

    pub fn filter_set(&self, name: &SetName) -> Option<&BTreeSet<ItemId>> {
        self.filter_sets.get(name)
    }

    /// Size of a set, 0 when the set does not exist.
    pub fn set_len(&self, name: &SetName) -> usize {
        self.filter_sets.get(name).map_or(0, BTreeSet::len)
    }

    pub fn filter_set_names(&self) -> impl Iterator<Item = &SetName> {
        self.filter_sets.keys()
    }

    pub fn remove_filter_set(&mut self, name: &SetName) -> Option<BTreeSet<ItemId>> {
        self.filter_sets.remove(name)
    }

    pub fn clear_filter_sets(&mut self) {
        self.filter_sets.clear();
    }

    /// `dst` becomes the intersection of all `names`.
    pub fn intersect(&mut self, dst: SetName, names: &[SetName]) -> Result<(), FilterError> {
        let (first, rest) = names.split_first().ok_or_else(|| {
            FilterError::InvalidArgument(format!(
                "intersection into {} needs at least one set name",
                dst
            ))
        })?;

        let mut result = self.require(first)?.clone();
        for name in rest {
            let other = self.require(name)?;
            result.retain(|id| other.contains(id));
        }
        self.filter_sets.insert(dst, result);
        Ok(())
    }

    pub fn apply_mask(
        &mut self,
        name: &SetName,
        ids: &BTreeSet<ItemId>,
        mode: MaskMode,
    ) -> Result<(), FilterError> {
        let set = self
            .filter_sets
            .get_mut(name)
            .ok_or_else(|| FilterError::UnknownSet(name.clone()))?;
        match mode {
            MaskMode::Drop => set.retain(|id| !ids.contains(id)),
            MaskMode::Keep => *set = ids.clone(),
        }
        Ok(())
    }

    /// Keep the items of `name` for which `predicate` holds.
    pub fn apply_predicate<P>(&mut self, name: &SetName, predicate: &P) -> Result<(), FilterError>
    where
        P: ItemPredicate + ?Sized,
    {
        let passing: BTreeSet<ItemId> = self
            .require(name)?
            .iter()
            .filter(|id| self.items.get(*id).is_some_and(|item| predicate.keep(item)))
            .copied()
            .collect();
        log::trace!(
            "{}: {} kept {} of {}",
            name,
            predicate.name(),
            passing.len(),
            self.set_len(name)
        );
        self.apply_mask(name, &passing, MaskMode::Keep)
    }

    /// Keep the items of `name` whose score lies in `[lower, upper]`. An
    /// omitted bound is open. Items without a score fail the cutoff.
    pub fn apply_cutoff<S>(
        &mut self,
        name: &SetName,
        score: &S,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> Result<(), FilterError>
    where
        S: ItemScore + ?Sized,
    {
        if let (Some(lo), Some(hi)) = (lower, upper) {
            if hi < lo {
                return Err(FilterError::InvalidArgument(format!(
                    "upper cutoff {} is below lower cutoff {} on {}",
                    hi, lo, name
                )));
            }
        }

        let within = |value: f64| {
            lower.map_or(true, |lo| value >= lo) && upper.map_or(true, |hi| value <= hi)
        };
        let passing: BTreeSet<ItemId> = self
            .require(name)?
            .iter()
            .filter(|id| {
                self.items
                    .get(*id)
                    .and_then(|item| score.score(item))
                    .is_some_and(within)
            })
            .copied()
            .collect();
        self.apply_mask(name, &passing, MaskMode::Keep)
    }

    // -----------------------------------------------------------------------
    // Scores
    // -----------------------------------------------------------------------

    /// Rescale `score` over `scope` (all items when `None`) and store the
    /// result under `key` on every item in scope.
    ///
    /// Any missing score, or a scope whose values cannot be rescaled (NaN,
    /// zero range, zero or infinite total), sets `key` to 0 for the whole
    /// scope.
    pub fn normalize<S>(
        &mut self,
        key: ScoreKey,
        score: &S,
        scope: Option<&SetName>,
        mode: NormMode,
        invert: bool,
    ) -> Result<(), FilterError>
    where
        S: ItemScore + ?Sized,
    {
        let ids: Vec<ItemId> = match scope {
            Some(name) => self
                .require(name)?
                .iter()
                .copied()
                .filter(|id| self.items.contains_key(id))
                .collect(),
            None => self.items.keys().copied().collect(),
        };
        if ids.is_empty() {
            return Ok(());
        }

        let raw: Option<Vec<f64>> = ids
            .iter()
            .map(|id| self.items.get(id).and_then(|item| score.score(item)))
            .collect();

        let values = match raw.and_then(|raw| rescale(&raw, mode, invert)) {
            Some(values) => values,
            None => {
                log::debug!(
                    "normalize {} ({}): degenerate input over {} items, scores set to 0",
                    key,
                    score.name(),
                    ids.len()
                );
                vec![0.0; ids.len()]
            }
        };

        for (id, value) in ids.iter().zip(values) {
            if let Some(item) = self.items.get_mut(id) {
                item.set_score(key, value);
            }
        }
        Ok(())
    }

    /// Item with the highest score in `set` (all items when `None`). Items
    /// without a score, or with NaN, are skipped. Ties go to the lowest id.
    pub fn find_max<S>(
        &self,
        set: Option<&SetName>,
        score: &S,
    ) -> Result<Option<(ItemId, f64)>, FilterError>
    where
        S: ItemScore + ?Sized,
    {
        let ids: Vec<ItemId> = match set {
            Some(name) => self.require(name)?.iter().copied().collect(),
            None => self.items.keys().copied().collect(),
        };

        let mut best: Option<(ItemId, f64)> = None;
        for id in ids {
            let Some(value) = self.items.get(&id).and_then(|item| score.score(item)) else {
                continue;
            };
            if value.is_nan() {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, current)) => descending_nan_last(value, current).is_lt(),
            };
            if better {
                best = Some((id, value));
            }
        }
        Ok(best)
    }

    /// One row per item of `set` (all items when `None`) that sold in
    /// `period`, with every derived score and filter-set membership.
    pub fn suggestions(
        &self,
        offer: OfferId,
        period: PeriodId,
        set: Option<&SetName>,
    ) -> Result<Vec<SuggestionRow>, FilterError> {
        let ids: Vec<ItemId> = match set {
            Some(name) => self.require(name)?.iter().copied().collect(),
            None => self.items.keys().copied().collect(),
        };

        let rows = ids
            .into_iter()
            .filter_map(|id| {
                let item = self.items.get(&id)?;
                let record = item.period(period)?;
                let score = |key| item.score(key).unwrap_or(-1.0);
                let memberships: Vec<String> = self
                    .filter_sets
                    .iter()
                    .filter(|(_, members)| members.contains(&id))
                    .map(|(name, _)| name.to_string())
                    .collect();
                Some(SuggestionRow {
                    offer_id: offer,
                    item_id: id,
                    uom: item.uom.clone(),
                    description: item.description.clone(),
                    unit_size: record.unit_size,
                    unit_count: record.unit_count,
                    revenue: record.revenue,
                    distance: score(ScoreKey::Distance),
                    quantity: score(ScoreKey::Quantity),
                    similarity: score(ScoreKey::Similarity),
                    norm_distance: score(ScoreKey::NormDistance),
                    selected: score(ScoreKey::Selected),
                    filter_sets: memberships.join(";"),
                })
            })
            .collect();
        Ok(rows)
    }

    fn require(&self, name: &SetName) -> Result<&BTreeSet<ItemId>, FilterError> {
        self.filter_sets
            .get(name)
            .ok_or_else(|| FilterError::UnknownSet(name.clone()))
    }
}

/// `None` when the values cannot be rescaled under `mode`.
fn rescale(raw: &[f64], mode: NormMode, invert: bool) -> Option<Vec<f64>> {
    if raw.iter().any(|x| x.is_nan()) {
        return None;
    }
    let n = raw.len() as f64;

    match mode {
        NormMode::Rank => {
            let ranks = rank_average(raw);
            Some(
                ranks
                    .into_iter()
                    .map(|r| if invert { 1.0 - (r - 1.0) / n } else { r / n })
                    .collect(),
            )
        }
        NormMode::Magnitude => {
            if raw.iter().any(|x| !x.is_finite()) {
                return None;
            }
            let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
            let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            if range == 0.0 {
                return None;
            }
            Some(
                raw.iter()
                    .map(|x| {
                        let scaled = (x - min) / range;
                        if invert {
                            1.0 - scaled
                        } else {
                            scaled
                        }
                    })
                    .collect(),
            )
        }
        NormMode::Weight => {
            let total: f64 = raw.iter().sum();
            if total == 0.0 || !total.is_finite() {
                return None;
            }
            Some(
                raw.iter()
                    .map(|x| {
                        let share = x / total;
                        if invert {
                            1.0 - share
                        } else {
                            share
                        }
                    })
                    .collect(),
            )
        }
    }
}
