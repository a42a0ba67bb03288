//! Batch orchestration over every commodity with unassigned offers.
//!
//! Commodities are independent: each gets its own offers, candidate pools
//! and random generator, and they run in parallel. Within a commodity,
//! clusters and their offers resolve strictly in order, since every
//! assignment changes the occupied items seen by the next offer.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use subst_text::{derive_seed, DescriptionDistance, TfidfNeighbours, TokenOverlap, WordSimilarity};

use crate::config::BatchConfig;
use crate::error::{SubstitutionError, SubstitutionResult};
use crate::funnel::{Funnel, Outcome, Resolution};
use crate::geography::{Geography, OutletRecord};
use crate::loader::{group_by_commodity, OfferRecord, SalesRecord};
use crate::offers::{Commodity, Offer, OfferBook, OfferStatus};
use crate::pool::CandidatePool;
use crate::records::{MatchedOfferRecord, RunSummary, SuggestionRow};
use crate::types::{
    CommodityId, ItemCatalog, OfferId, OutletId, PeriodId, ScoreKey, SetName, NO_ITEM,
};

/// Everything a run reads.
#[derive(Debug, Default)]
pub struct SubstitutionInput {
    pub sales: Vec<SalesRecord>,
    pub catalog: ItemCatalog,
    pub outlets: Vec<OutletRecord>,
    pub offers: Vec<OfferRecord>,
}

#[derive(Debug, Default)]
pub struct BatchOutput {
    pub matched: Vec<MatchedOfferRecord>,
    pub suggestions: Vec<SuggestionRow>,
    pub summary: RunSummary,
}

/// Commodity map and offer book for one period.
#[derive(Debug, Default)]
pub struct OfferMaps {
    pub commodities: BTreeMap<CommodityId, Commodity>,
    pub book: OfferBook,
    /// Offers whose item has no catalog entry.
    pub unclassified: usize,
}

/// Offers sharing one geography key within a commodity, and their pool.
struct Cluster {
    geography: Geography,
    offer_ids: Vec<OfferId>,
    pool: CandidatePool,
}

#[derive(Default)]
struct CommodityOutput {
    matched: Vec<MatchedOfferRecord>,
    suggestions: Vec<SuggestionRow>,
    clusters: usize,
}

pub struct Substituter<D = TfidfNeighbours, W = TokenOverlap> {
    config: BatchConfig,
    distance: D,
    similarity: W,
}

impl Substituter {
    /// Default oracles: TF-IDF neighbours and token overlap on the
    /// configured delimiters.
    pub fn from_config(config: BatchConfig) -> SubstitutionResult<Self> {
        let similarity = TokenOverlap::new(&config.funnel.similarity_delimiters)
            .map_err(|e| SubstitutionError::Config(format!("similarity delimiters: {}", e)))?;
        Self::with_oracles(config, TfidfNeighbours, similarity)
    }
}

impl<D, W> Substituter<D, W>
where
    D: DescriptionDistance,
    W: WordSimilarity,
{
    pub fn with_oracles(
        config: BatchConfig,
        distance: D,
        similarity: W,
    ) -> SubstitutionResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            distance,
            similarity,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Resolve every unassigned offer of the configured period.
    pub fn run(&self, input: &SubstitutionInput) -> SubstitutionResult<BatchOutput> {
        let period = self.config.current_period;
        let OfferMaps {
            commodities,
            mut book,
            unclassified,
        } = build_offer_maps(&input.offers, &input.catalog, &input.outlets, period);
        if unclassified > 0 {
            log::warn!(
                "{} offers in period {} reference items without a catalog entry",
                unclassified,
                period
            );
        }

        let sales = group_by_commodity(&input.sales);
        let pending: Vec<Commodity> = commodities
            .into_values()
            .filter(|commodity| commodity.contains_unassigned(&book, period))
            .collect();
        let work: Vec<(Commodity, OfferBook)> = pending
            .into_iter()
            .map(|commodity| {
                let offers = book.take(&commodity.offer_ids);
                (commodity, offers)
            })
            .collect();
        log::info!(
            "period {}: {} commodities with unassigned offers",
            period,
            work.len()
        );

        let no_sales = Vec::new();
        let results: Vec<CommodityOutput> = work
            .into_par_iter()
            .map(|(commodity, offers)| {
                let commodity_sales = sales.get(&commodity.id).unwrap_or(&no_sales);
                self.run_commodity(&commodity, offers, commodity_sales, input)
            })
            .collect::<SubstitutionResult<Vec<_>>>()?;

        let commodity_count = results.len();
        let mut output = BatchOutput::default();
        let mut cluster_count = 0;
        for result in results {
            cluster_count += result.clusters;
            output.matched.extend(result.matched);
            output.suggestions.extend(result.suggestions);
        }
        output.summary = RunSummary::from_records(
            period,
            commodity_count,
            cluster_count,
            unclassified,
            &output.matched,
        );
        Ok(output)
    }

    fn run_commodity(
        &self,
        commodity: &Commodity,
        mut book: OfferBook,
        sales: &[&SalesRecord],
        input: &SubstitutionInput,
    ) -> SubstitutionResult<CommodityOutput> {
        let period = self.config.current_period;
        let seed = derive_seed(self.config.seed, &commodity.id.to_string());
        let mut rng = StdRng::seed_from_u64(seed);
        let funnel = Funnel::new(&self.config.funnel, &self.distance, &self.similarity)
            .with_catalog(&input.catalog);

        let mut clusters = self.build_clusters(commodity, &book, &input.outlets);
        for cluster in &mut clusters {
            populate(cluster, sales, &input.catalog);
            let removed = cluster.pool.remove_absent(period);
            log::debug!(
                "commodity {} cluster {}: {} items, {} absent in period {}",
                commodity.id,
                cluster.geography,
                cluster.pool.len(),
                removed,
                period
            );
        }

        let mut out = CommodityOutput {
            clusters: clusters.len(),
            ..CommodityOutput::default()
        };
        for cluster in &mut clusters {
            for offer_id in &cluster.offer_ids {
                let outlet = match book.get(*offer_id) {
                    Some(offer) if !offer.is_assigned(period) => offer.outlet,
                    _ => continue,
                };
                let occupied = commodity.assigned_items(&book, period, Some(outlet));
                let Some(offer) = book.get_mut(*offer_id) else {
                    continue;
                };

                let resolution =
                    funnel.resolve(&mut cluster.pool, offer, period, &occupied, &mut rng)?;
                log::debug!("offer {}: {}", offer.id, resolution.outcome);

                if self.config.suggest && resolution.outcome == Outcome::Assigned {
                    out.suggestions.extend(cluster.pool.suggestions(
                        offer.id,
                        period,
                        Some(&SetName::Outlet),
                    )?);
                }

                let relaunch_similarity =
                    |description: &str| funnel.similarity(&offer.rp_name, description);
                out.matched.push(matched_record(
                    commodity.id,
                    &*offer,
                    period,
                    &resolution,
                    &cluster.pool,
                    &input.catalog,
                    &relaunch_similarity,
                ));
            }
        }

        let assigned = out.matched.iter().filter(|r| r.is_assigned()).count();
        log::info!(
            "commodity {}: {} clusters, {} offers, {} assigned",
            commodity.id,
            out.clusters,
            out.matched.len(),
            assigned
        );
        Ok(out)
    }

    /// One cluster per distinct geography key among the unassigned offers.
    fn build_clusters(
        &self,
        commodity: &Commodity,
        book: &OfferBook,
        outlets: &[OutletRecord],
    ) -> Vec<Cluster> {
        let level = self.config.geo_level;
        let mut clusters: Vec<Cluster> = Vec::new();

        for offer_id in &commodity.offer_ids {
            let Some(offer) = book.get(*offer_id) else {
                continue;
            };
            if offer.is_assigned(self.config.current_period) {
                continue;
            }

            let mut geography = Geography::for_offer(offer, level);
            if let Some(cluster) = clusters
                .iter_mut()
                .find(|cluster| cluster.geography.matches(&geography.keys))
            {
                cluster.offer_ids.push(offer.id);
                cluster.geography.outlets.insert(offer.outlet);
                continue;
            }
            geography.add_outlets(outlets, level);
            geography.outlets.insert(offer.outlet);
            clusters.push(Cluster {
                geography,
                offer_ids: vec![offer.id],
                pool: CandidatePool::new(),
            });
        }
        clusters
    }
}

/// Build the commodity map and offer book for `period`.
///
/// Only commodities with at least one unassigned offer are kept. Input
/// out-of-stock statuses count as unassigned. Each offer gets a continuity
/// record for the previous period when it has none, so its current item
/// doubles as the previous item.
pub fn build_offer_maps(
    offers: &[OfferRecord],
    catalog: &ItemCatalog,
    outlets: &[OutletRecord],
    period: PeriodId,
) -> OfferMaps {
    let locations: HashMap<OutletId, &OutletRecord> =
        outlets.iter().map(|o| (o.outlet_id, o)).collect();
    let current: Vec<&OfferRecord> = offers.iter().filter(|o| o.period_id == period).collect();

    let mut maps = OfferMaps::default();

    for record in &current {
        let Some(status) = input_status(record) else {
            continue;
        };
        if status != OfferStatus::Unassigned {
            continue;
        }
        if let Some(entry) = record.item_id.and_then(|id| catalog.get(id)) {
            maps.commodities
                .entry(entry.commodity_id)
                .or_insert_with(|| Commodity::new(entry.commodity_id));
        }
    }

    for record in &current {
        let Some(item_id) = record.item_id else {
            continue;
        };
        let Some(status) = input_status(record) else {
            log::warn!(
                "offer {}: unknown status {}, skipped",
                record.offer_id,
                record.status_id
            );
            continue;
        };
        let Some(entry) = catalog.get(item_id) else {
            maps.unclassified += 1;
            continue;
        };
        let Some(commodity) = maps.commodities.get_mut(&entry.commodity_id) else {
            continue;
        };
        commodity.offer_ids.insert(record.offer_id);

        let (province, city) = match locations.get(&record.outlet_id) {
            Some(location) => (location.province.as_str(), location.city.as_str()),
            None => {
                log::debug!(
                    "offer {}: outlet {} has no location",
                    record.offer_id,
                    record.outlet_id
                );
                ("", "")
            }
        };
        let offer = maps.book.get_or_insert(Offer::new(
            record.offer_id,
            record.rp_name.clone(),
            record.outlet_id,
            province,
            city,
            entry.uom.clone(),
        ));
        if !offer.has_period(period - 1) {
            offer.add_period(period - 1, OfferStatus::Continuity, item_id);
        }
        offer.add_period(period, status, item_id);
    }

    maps
}

/// Status as read for the current period; out of stock is retried.
fn input_status(record: &OfferRecord) -> Option<OfferStatus> {
    match OfferStatus::from_id(record.status_id)? {
        OfferStatus::OutOfStock => Some(OfferStatus::Unassigned),
        status => Some(status),
    }
}

fn populate(cluster: &mut Cluster, sales: &[&SalesRecord], catalog: &ItemCatalog) {
    for sale in sales {
        if !cluster.geography.outlets.contains(&sale.outlet_id) {
            continue;
        }
        let Some(entry) = catalog.get(sale.item_id) else {
            continue;
        };
        cluster.pool.add_observation(
            entry,
            sale.period_id,
            sale.outlet_id,
            sale.unit_size,
            sale.unit_count,
            sale.revenue,
        );
    }
}

fn matched_record(
    commodity_id: CommodityId,
    offer: &Offer,
    period: PeriodId,
    resolution: &Resolution,
    pool: &CandidatePool,
    catalog: &ItemCatalog,
    relaunch_similarity: &dyn Fn(&str) -> f64,
) -> MatchedOfferRecord {
    let previous_item_id = offer.carried_item(period);
    let previous = catalog.get(previous_item_id);
    let status = offer
        .period(period)
        .map_or(OfferStatus::OutOfStock, |record| record.status);
    let item_id = offer.period(period).map_or(NO_ITEM, |record| record.item);

    let mut record = MatchedOfferRecord {
        commodity_id,
        offer_id: offer.id,
        rp_name: offer.rp_name.clone(),
        outlet_id: offer.outlet,
        previous_item_id,
        previous_description: previous.map(|e| e.description.clone()).unwrap_or_default(),
        previous_brand: previous.map(|e| e.brand_type.clone()).unwrap_or_default(),
        item_id,
        description: String::new(),
        brand: String::new(),
        pool_size: resolution.audit.pool_size,
        current_size: resolution.audit.set_size(&SetName::Current),
        outlet_size: resolution.audit.set_size(&SetName::Outlet),
        sold_at_outlet: false,
        in_commodity: false,
        normalized_quantity: 0.0,
        distance: 0.0,
        word_similarity: 0.0,
        status_id: status.id(),
        status: resolution.outcome.to_string(),
    };

    if status.is_assigned() {
        if let Some(entry) = catalog.get(item_id) {
            record.description = entry.description.clone();
            record.brand = entry.brand_type.clone();
            record.in_commodity = entry.commodity_id == commodity_id;
        }
        if let Some(item) = pool.item(item_id) {
            record.sold_at_outlet = item.sold_at(offer.outlet, period);
            record.normalized_quantity = item.score(ScoreKey::Quantity).unwrap_or(0.0);
            record.distance = item.score(ScoreKey::Distance).unwrap_or(0.0);
            record.word_similarity = match resolution.outcome {
                Outcome::Relaunch => relaunch_similarity(&item.description),
                _ => item.score(ScoreKey::Similarity).unwrap_or(0.0),
            };
        }
    }
    record
}
