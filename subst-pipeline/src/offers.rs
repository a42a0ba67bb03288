//! Offers and their per-period status records.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{CommodityId, ItemId, OfferId, OutletId, PeriodId, NO_ITEM};

/// Status of an offer in one period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferStatus {
    Unassigned,
    Continuity,
    Substitution,
    OutOfStock,
}

impl OfferStatus {
    pub fn id(self) -> u8 {
        match self {
            OfferStatus::Unassigned => 0,
            OfferStatus::Continuity => 1,
            OfferStatus::Substitution => 2,
            OfferStatus::OutOfStock => 3,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(OfferStatus::Unassigned),
            1 => Some(OfferStatus::Continuity),
            2 => Some(OfferStatus::Substitution),
            3 => Some(OfferStatus::OutOfStock),
            _ => None,
        }
    }

    /// Continuity and substitution occupy an item; the others do not.
    pub fn is_assigned(self) -> bool {
        matches!(self, OfferStatus::Continuity | OfferStatus::Substitution)
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferStatus::Unassigned => write!(f, "UNASSIGNED"),
            OfferStatus::Continuity => write!(f, "CONTINUITY"),
            OfferStatus::Substitution => write!(f, "SUBSTITUTION"),
            OfferStatus::OutOfStock => write!(f, "OUT_OF_STOCK"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OfferPeriodRecord {
    pub status: OfferStatus,
    pub item: ItemId,
}

/// A tracked price observation slot at one outlet.
#[derive(Clone, Debug)]
pub struct Offer {
    pub id: OfferId,
    /// Representative product name.
    pub rp_name: String,
    pub outlet: OutletId,
    pub province: String,
    pub city: String,
    pub uom: String,
    periods: BTreeMap<PeriodId, OfferPeriodRecord>,
}

impl Offer {
    pub fn new(
        id: OfferId,
        rp_name: impl Into<String>,
        outlet: OutletId,
        province: impl Into<String>,
        city: impl Into<String>,
        uom: impl Into<String>,
    ) -> Self {
        Self {
            id,
            rp_name: rp_name.into(),
            outlet,
            province: province.into(),
            city: city.into(),
            uom: uom.into(),
            periods: BTreeMap::new(),
        }
    }

    /// Create or overwrite the record for `period`.
    pub fn add_period(&mut self, period: PeriodId, status: OfferStatus, item: ItemId) {
        self.periods.insert(period, OfferPeriodRecord { status, item });
    }

    pub fn period(&self, period: PeriodId) -> Option<&OfferPeriodRecord> {
        self.periods.get(&period)
    }

    pub fn has_period(&self, period: PeriodId) -> bool {
        self.periods.contains_key(&period)
    }

    /// False when the offer has no record for `period`.
    pub fn is_assigned(&self, period: PeriodId) -> bool {
        self.periods
            .get(&period)
            .is_some_and(|record| record.status.is_assigned())
    }

    /// The real item assigned in the period before `current`, if any.
    pub fn previous_item(&self, current: PeriodId) -> Option<ItemId> {
        self.periods
            .get(&(current - 1))
            .map(|record| record.item)
            .filter(|item| *item != NO_ITEM)
    }

    /// Item reference carried onto an out-of-stock record: the previous
    /// period's item, or `NO_ITEM`.
    pub fn carried_item(&self, current: PeriodId) -> ItemId {
        self.periods
            .get(&(current - 1))
            .map_or(NO_ITEM, |record| record.item)
    }
}

/// All offers of a run, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct OfferBook {
    offers: BTreeMap<OfferId, Offer>,
}

impl OfferBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `offer` unless an offer with the same id exists; returns the
    /// stored offer either way.
    pub fn get_or_insert(&mut self, offer: Offer) -> &mut Offer {
        self.offers.entry(offer.id).or_insert(offer)
    }

    pub fn get(&self, id: OfferId) -> Option<&Offer> {
        self.offers.get(&id)
    }

    pub fn get_mut(&mut self, id: OfferId) -> Option<&mut Offer> {
        self.offers.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Offer> {
        self.offers.values()
    }

    /// Move the offers named by `ids` out of the book.
    pub fn take(&mut self, ids: &BTreeSet<OfferId>) -> OfferBook {
        let mut taken = OfferBook::new();
        for id in ids {
            if let Some(offer) = self.offers.remove(id) {
                taken.offers.insert(*id, offer);
            }
        }
        taken
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}

/// A commodity class and the offers mapped to it.
#[derive(Clone, Debug)]
pub struct Commodity {
    pub id: CommodityId,
    pub offer_ids: BTreeSet<OfferId>,
}

impl Commodity {
    pub fn new(id: CommodityId) -> Self {
        Self {
            id,
            offer_ids: BTreeSet::new(),
        }
    }

    pub fn contains_unassigned(&self, book: &OfferBook, period: PeriodId) -> bool {
        self.offer_ids
            .iter()
            .filter_map(|id| book.get(*id))
            .any(|offer| !offer.is_assigned(period))
    }

    /// Items occupied in `period` by this commodity's offers, optionally
    /// limited to one outlet.
    pub fn assigned_items(
        &self,
        book: &OfferBook,
        period: PeriodId,
        outlet: Option<OutletId>,
    ) -> BTreeSet<ItemId> {
        self.offer_ids
            .iter()
            .filter_map(|id| book.get(*id))
            .filter(|offer| outlet.map_or(true, |o| offer.outlet == o))
            .filter_map(|offer| offer.period(period))
            .filter(|record| record.status.is_assigned())
            .map(|record| record.item)
            .collect()
    }
}
