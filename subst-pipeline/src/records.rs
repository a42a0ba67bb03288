//! Flat output rows: one matched-offer record per resolved offer, the
//! optional suggestion rows, and the run summary.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::offers::OfferStatus;
use crate::types::{CommodityId, ItemId, OfferId, OutletId, PeriodId};

/// Outcome of one offer with enough context to audit the choice.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchedOfferRecord {
    pub commodity_id: CommodityId,
    pub offer_id: OfferId,
    pub rp_name: String,
    pub outlet_id: OutletId,
    pub previous_item_id: ItemId,
    pub previous_description: String,
    pub previous_brand: String,
    pub item_id: ItemId,
    pub description: String,
    pub brand: String,
    pub pool_size: usize,
    pub current_size: usize,
    pub outlet_size: usize,
    pub sold_at_outlet: bool,
    pub in_commodity: bool,
    pub normalized_quantity: f64,
    pub distance: f64,
    pub word_similarity: f64,
    pub status_id: u8,
    pub status: String,
}

impl MatchedOfferRecord {
    pub fn is_assigned(&self) -> bool {
        OfferStatus::from_id(self.status_id).is_some_and(OfferStatus::is_assigned)
    }

    /// A substitution whose brand classification matches the previous item.
    pub fn is_brand_match(&self) -> bool {
        self.status_id == OfferStatus::Substitution.id()
            && !self.previous_brand.is_empty()
            && self.previous_brand == self.brand
    }
}

/// One candidate of the final outer set, listed for manual review.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SuggestionRow {
    pub offer_id: OfferId,
    pub item_id: ItemId,
    pub uom: String,
    pub description: String,
    pub unit_size: f64,
    pub unit_count: f64,
    pub revenue: f64,
    /// Scores not computed for the item are reported as -1.
    pub distance: f64,
    pub quantity: f64,
    pub similarity: f64,
    pub norm_distance: f64,
    pub selected: f64,
    /// Names of the filter sets holding the item, `;`-separated.
    pub filter_sets: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub period: PeriodId,
    pub commodity_count: usize,
    pub cluster_count: usize,
    pub outlet_count: usize,
    pub offer_count: usize,
    /// Offers resolved as a substitution or a relaunch.
    pub assigned_count: usize,
    pub unclassified_count: usize,
    pub assigned_fraction: f64,
    /// Mean word similarity over offers that did not end out of stock.
    pub average_similarity: f64,
    /// Share of substitutions keeping the previous brand classification.
    pub brand_match_rate: f64,
}

impl RunSummary {
    pub fn from_records(
        period: PeriodId,
        commodity_count: usize,
        cluster_count: usize,
        unclassified_count: usize,
        records: &[MatchedOfferRecord],
    ) -> Self {
        let outlets: BTreeSet<OutletId> = records.iter().map(|r| r.outlet_id).collect();
        let assigned_count = records.iter().filter(|r| r.is_assigned()).count();

        let in_stock: Vec<f64> = records
            .iter()
            .filter(|r| r.status_id != OfferStatus::OutOfStock.id())
            .map(|r| r.word_similarity)
            .collect();
        let average_similarity = mean(&in_stock);

        let substitutions: Vec<&MatchedOfferRecord> = records
            .iter()
            .filter(|r| {
                r.status_id == OfferStatus::Substitution.id() && !r.previous_brand.is_empty()
            })
            .collect();
        let brand_match_rate = if substitutions.is_empty() {
            0.0
        } else {
            substitutions.iter().filter(|r| r.is_brand_match()).count() as f64
                / substitutions.len() as f64
        };

        Self {
            period,
            commodity_count,
            cluster_count,
            outlet_count: outlets.len(),
            offer_count: records.len(),
            assigned_count,
            unclassified_count,
            assigned_fraction: if records.is_empty() {
                0.0
            } else {
                assigned_count as f64 / records.len() as f64
            },
            average_similarity,
            brand_match_rate,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
