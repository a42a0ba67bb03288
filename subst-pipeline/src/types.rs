use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

pub type ItemId = i64;
pub type OfferId = i64;
pub type OutletId = i64;
pub type PeriodId = i64;
pub type CommodityId = i64;

/// Placeholder item id carried by offers that never had a real assignment.
pub const NO_ITEM: ItemId = -1;

// ---------------------------------------------------------------------------
// Derived scores
// ---------------------------------------------------------------------------

/// Named derived score attached to an item while an offer is being resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScoreKey {
    /// Rank-normalized current-period revenue.
    Quantity,
    /// Description distance to the offer's previous item.
    Distance,
    /// Word overlap between the offer name and the item description.
    Similarity,
    /// Inverted rank of `Distance`.
    NormDistance,
    /// 1.0 on the item chosen for a substitution.
    Selected,
}

impl fmt::Display for ScoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreKey::Quantity => write!(f, "quantity"),
            ScoreKey::Distance => write!(f, "distance"),
            ScoreKey::Similarity => write!(f, "similarity"),
            ScoreKey::NormDistance => write!(f, "normDistance"),
            ScoreKey::Selected => write!(f, "selected"),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter set names
// ---------------------------------------------------------------------------

/// Name of a filter set held by a candidate pool.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SetName {
    All,
    Current,
    Outlet,
    Relaunch,
    TopSellers,
    Similar,
    Distance,
    Custom(String),
}

impl fmt::Display for SetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetName::All => write!(f, "ALL"),
            SetName::Current => write!(f, "CURRENT"),
            SetName::Outlet => write!(f, "OUTLET"),
            SetName::Relaunch => write!(f, "RELAUNCH"),
            SetName::TopSellers => write!(f, "TOP_SELLERS"),
            SetName::Similar => write!(f, "SIMILAR"),
            SetName::Distance => write!(f, "DISTANCE"),
            SetName::Custom(name) => write!(f, "{}", name),
        }
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Sales of one item during one period, aggregated over outlets.
#[derive(Clone, Debug, Serialize)]
pub struct ItemPeriodRecord {
    pub period: PeriodId,
    pub unit_size: f64,
    pub unit_count: f64,
    pub revenue: f64,
    /// Outlets where the item sold; one entry per merged observation.
    pub outlets: Vec<OutletId>,
    pub aggregate_count: u32,
}

impl ItemPeriodRecord {
    pub fn new(
        period: PeriodId,
        outlet: OutletId,
        unit_size: f64,
        unit_count: f64,
        revenue: f64,
    ) -> Self {
        Self {
            period,
            unit_size,
            unit_count,
            revenue,
            outlets: vec![outlet],
            aggregate_count: 1,
        }
    }

    /// Fold another observation of the same period into this record.
    pub fn merge(&mut self, other: ItemPeriodRecord) {
        self.outlets.extend(other.outlets);
        self.unit_count += other.unit_count;
        self.revenue += other.revenue;
        self.aggregate_count += 1;
    }

    /// Revenue per unit. `None` when no units were sold.
    pub fn unit_price(&self) -> Option<f64> {
        if self.unit_count == 0.0 {
            None
        } else {
            Some(self.revenue / self.unit_count)
        }
    }

    /// Total volume or mass sold.
    pub fn total_size(&self) -> f64 {
        self.unit_count * self.unit_size
    }

    pub fn sold_at(&self, outlet: OutletId) -> bool {
        self.outlets.contains(&outlet)
    }
}

/// A sellable product aggregated over one geography.
#[derive(Clone, Debug)]
pub struct Item {
    pub id: ItemId,
    pub uom: String,
    pub brand_type: String,
    pub description: String,
    periods: BTreeMap<PeriodId, ItemPeriodRecord>,
    scores: BTreeMap<ScoreKey, f64>,
}

impl Item {
    pub fn new(
        id: ItemId,
        uom: impl Into<String>,
        brand_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            uom: uom.into(),
            brand_type: brand_type.into(),
            description: description.into(),
            periods: BTreeMap::new(),
            scores: BTreeMap::new(),
        }
    }

    /// Record a sales observation, merging into an existing period record.
    pub fn add_observation(
        &mut self,
        period: PeriodId,
        outlet: OutletId,
        unit_size: f64,
        unit_count: f64,
        revenue: f64,
    ) {
        let record = ItemPeriodRecord::new(period, outlet, unit_size, unit_count, revenue);
        match self.periods.get_mut(&period) {
            Some(existing) => existing.merge(record),
            None => {
                self.periods.insert(period, record);
            }
        }
    }

    pub fn is_present(&self, period: PeriodId) -> bool {
        self.periods.contains_key(&period)
    }

    pub fn period(&self, period: PeriodId) -> Option<&ItemPeriodRecord> {
        self.periods.get(&period)
    }

    pub fn unit_price(&self, period: PeriodId) -> Option<f64> {
        self.periods.get(&period).and_then(ItemPeriodRecord::unit_price)
    }

    /// Units sold times unit size in `period`; 0 when the item did not sell.
    pub fn total_size(&self, period: PeriodId) -> f64 {
        self.periods.get(&period).map_or(0.0, ItemPeriodRecord::total_size)
    }

    /// Price in `period` relative to `base`.
    pub fn price_relative(&self, period: PeriodId, base: PeriodId) -> Option<f64> {
        let current = self.unit_price(period)?;
        let base = self.unit_price(base)?;
        if base == 0.0 {
            return None;
        }
        Some(current / base)
    }

    pub fn sold_at(&self, outlet: OutletId, period: PeriodId) -> bool {
        self.periods
            .get(&period)
            .is_some_and(|record| record.sold_at(outlet))
    }

    pub fn score(&self, key: ScoreKey) -> Option<f64> {
        self.scores.get(&key).copied()
    }

    pub fn set_score(&mut self, key: ScoreKey, value: f64) {
        self.scores.insert(key, value);
    }

    pub fn clear_scores(&mut self) {
        self.scores.clear();
    }
}

// ---------------------------------------------------------------------------
// Item catalog
// ---------------------------------------------------------------------------

/// Static description of an item, independent of geography and period.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CatalogEntry {
    pub item_id: ItemId,
    pub commodity_id: CommodityId,
    pub uom: String,
    pub brand_type: String,
    pub description: String,
}

/// All known item descriptions, keyed by item id.
#[derive(Clone, Debug, Default)]
pub struct ItemCatalog {
    entries: HashMap<ItemId, CatalogEntry>,
}

impl ItemCatalog {
    pub fn new(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.item_id, e)).collect(),
        }
    }

    pub fn get(&self, id: ItemId) -> Option<&CatalogEntry> {
        self.entries.get(&id)
    }

    pub fn description(&self, id: ItemId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.description.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observations_in_same_period_merge() {
        let mut item = Item::new(7, "kg", "private", "basmati rice");
        item.add_observation(9, 100, 1.0, 10.0, 25.0);
        item.add_observation(9, 200, 1.0, 5.0, 15.0);
        let record = item.period(9).unwrap();
        assert_eq!(record.unit_count, 15.0);
        assert_eq!(record.revenue, 40.0);
        assert_eq!(record.outlets, vec![100, 200]);
        assert_eq!(record.aggregate_count, 2);
    }

    #[test]
    fn observations_in_other_period_create_new_record() {
        let mut item = Item::new(7, "kg", "private", "basmati rice");
        item.add_observation(8, 100, 1.0, 10.0, 25.0);
        item.add_observation(9, 100, 1.0, 4.0, 12.0);
        assert!(item.is_present(8));
        assert!(item.is_present(9));
        assert_eq!(item.period(8).unwrap().aggregate_count, 1);
    }

    #[test]
    fn unit_price_undefined_without_units() {
        let mut item = Item::new(1, "l", "brand", "milk");
        item.add_observation(9, 1, 1.0, 0.0, 0.0);
        assert_eq!(item.unit_price(9), None);
        assert_eq!(item.unit_price(10), None);
    }

    #[test]
    fn price_relative_between_periods() {
        let mut item = Item::new(1, "l", "brand", "milk");
        item.add_observation(8, 1, 1.0, 10.0, 20.0);
        item.add_observation(9, 1, 1.0, 10.0, 22.0);
        let rel = item.price_relative(9, 8).unwrap();
        assert!((rel - 1.1).abs() < 1e-12);
    }

    #[test]
    fn total_size_multiplies_units() {
        let record = ItemPeriodRecord::new(1, 1, 0.5, 8.0, 10.0);
        assert_eq!(record.total_size(), 4.0);

        let mut item = Item::new(1, "kg", "brand", "rice");
        item.add_observation(9, 1, 0.5, 8.0, 10.0);
        assert_eq!(item.total_size(9), 4.0);
        assert_eq!(item.total_size(7), 0.0);
    }

    #[test]
    fn scores_overwrite_and_clear() {
        let mut item = Item::new(1, "l", "brand", "milk");
        item.set_score(ScoreKey::Quantity, 0.5);
        item.set_score(ScoreKey::Quantity, 0.75);
        assert_eq!(item.score(ScoreKey::Quantity), Some(0.75));
        item.clear_scores();
        assert_eq!(item.score(ScoreKey::Quantity), None);
    }

    #[test]
    fn set_names_display_like_audit_columns() {
        assert_eq!(SetName::TopSellers.to_string(), "TOP_SELLERS");
        assert_eq!(SetName::Custom("MINE".into()).to_string(), "MINE");
        assert_eq!(ScoreKey::NormDistance.to_string(), "normDistance");
    }
}
