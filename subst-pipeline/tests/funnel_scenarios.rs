use std::collections::{BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::SeedableRng;
use subst_pipeline::*;
use subst_text::{TfidfNeighbours, TokenOverlap};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const PERIOD: i64 = 9;
const OUTLET: i64 = 10;

fn entry(id: ItemId, uom: &str, description: &str) -> CatalogEntry {
    CatalogEntry {
        item_id: id,
        commodity_id: 1,
        uom: uom.to_string(),
        brand_type: "national".to_string(),
        description: description.to_string(),
    }
}

fn sold(pool: &mut CandidatePool, item: &CatalogEntry, outlet: i64, revenue: f64) {
    pool.add_observation(item, PERIOD, outlet, 1.0, 1.0, revenue);
}

fn new_offer() -> Offer {
    Offer::new(500, "rice", OUTLET, "ON", "Ottawa", "kg")
}

fn continuing_offer(previous: ItemId) -> Offer {
    let mut offer = new_offer();
    offer.add_period(PERIOD - 1, OfferStatus::Continuity, previous);
    offer
}

fn top_proportional() -> FunnelConfig {
    FunnelConfig {
        sampling_strategy: SamplingStrategy::TopProportional,
        ..FunnelConfig::default()
    }
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

/// New offer, three outlet items with revenue 10, 5 and 1, all equally
/// similar to the offer name. The quantity cutoff keeps the top two and the
/// lowest seller is never drawn.
#[test]
fn new_offer_never_draws_lowest_seller() {
    let config = top_proportional();
    let similarity = TokenOverlap::default();
    let funnel = Funnel::new(&config, &TfidfNeighbours, &similarity);
    let mut counts: HashMap<ItemId, usize> = HashMap::new();

    for seed in 0..200 {
        let mut pool = CandidatePool::new();
        sold(&mut pool, &entry(1, "kg", "rice"), OUTLET, 10.0);
        sold(&mut pool, &entry(2, "kg", "rice"), OUTLET, 5.0);
        sold(&mut pool, &entry(3, "kg", "rice"), OUTLET, 1.0);
        let mut offer = new_offer();
        let mut rng = StdRng::seed_from_u64(seed);

        let r = funnel
            .resolve(&mut pool, &mut offer, PERIOD, &BTreeSet::new(), &mut rng)
            .unwrap();
        assert_eq!(r.outcome, Outcome::Assigned);
        assert_eq!(r.audit.set_size(&SetName::TopSellers), 2);
        assert_eq!(r.audit.set_size(&SetName::Similar), 2);
        assert_ne!(r.item, 3);
        assert_eq!(offer.period(PERIOD).unwrap().status, OfferStatus::Substitution);
        *counts.entry(r.item).or_insert(0) += 1;
    }

    assert!(counts[&1] > 0);
    assert!(counts[&2] > 0);
}

/// Continuing offer whose previous item has an exact description twin in
/// the outlet: the twin is relaunched and no quantity or similarity scoring
/// happens.
#[test]
fn exact_description_twin_is_relaunched() {
    let config = FunnelConfig::default();
    let catalog = ItemCatalog::new(vec![entry(1, "kg", "jasmine rice 2kg")]);
    let similarity = TokenOverlap::default();
    let funnel =
        Funnel::new(&config, &TfidfNeighbours, &similarity).with_catalog(&catalog);

    let mut pool = CandidatePool::new();
    sold(&mut pool, &entry(2, "kg", "jasmine rice 2kg"), OUTLET, 1.0);
    sold(&mut pool, &entry(3, "kg", "basmati rice 1kg"), OUTLET, 50.0);
    sold(&mut pool, &entry(4, "kg", "white bread loaf"), OUTLET, 20.0);
    let mut offer = continuing_offer(1);
    let mut rng = StdRng::seed_from_u64(11);

    let r = funnel
        .resolve(&mut pool, &mut offer, PERIOD, &BTreeSet::new(), &mut rng)
        .unwrap();
    assert_eq!(r.outcome, Outcome::Relaunch);
    assert_eq!(r.item, 2);
    assert_eq!(offer.period(PERIOD).unwrap().status, OfferStatus::Continuity);
    assert_eq!(offer.period(PERIOD).unwrap().item, 2);
    assert_eq!(pool.item(2).unwrap().score(ScoreKey::Distance), Some(0.0));
    for item in pool.items() {
        assert_eq!(item.score(ScoreKey::Quantity), None);
        assert_eq!(item.score(ScoreKey::Similarity), None);
    }
    assert_eq!(r.audit.set_size(&SetName::Relaunch), 1);
    assert_eq!(r.audit.set_size(&SetName::TopSellers), 0);
}

/// No candidate at the offer's outlet: out of stock with the previous item
/// carried forward.
#[test]
fn empty_outlet_carries_previous_item() {
    let config = FunnelConfig::default();
    let similarity = TokenOverlap::default();
    let funnel = Funnel::new(&config, &TfidfNeighbours, &similarity);
    let mut pool = CandidatePool::new();
    sold(&mut pool, &entry(2, "kg", "rice"), OUTLET + 1, 1.0);
    let mut offer = continuing_offer(7);
    let mut rng = StdRng::seed_from_u64(1);

    let r = funnel
        .resolve(&mut pool, &mut offer, PERIOD, &BTreeSet::new(), &mut rng)
        .unwrap();
    assert_eq!(r.outcome, Outcome::EmptyOutlet);
    assert_eq!(r.outcome.to_string(), "OUT OF STOCK - EMPTY OUTLET");
    assert_eq!(offer.period(PERIOD).unwrap().status, OfferStatus::OutOfStock);
    assert_eq!(offer.period(PERIOD).unwrap().item, 7);
}

#[test]
fn empty_outlet_without_history_carries_no_item() {
    let config = FunnelConfig::default();
    let similarity = TokenOverlap::default();
    let funnel = Funnel::new(&config, &TfidfNeighbours, &similarity);
    let mut pool = CandidatePool::new();
    sold(&mut pool, &entry(2, "l", "rice"), OUTLET, 1.0);
    let mut offer = new_offer();
    let mut rng = StdRng::seed_from_u64(1);

    let r = funnel
        .resolve(&mut pool, &mut offer, PERIOD, &BTreeSet::new(), &mut rng)
        .unwrap();
    assert_eq!(r.outcome, Outcome::EmptyOutlet);
    assert_eq!(offer.period(PERIOD).unwrap().item, NO_ITEM);
}

/// A continuing offer without a twin goes through the distance stage and
/// draws among the closest candidates.
#[test]
fn continuing_offer_prefers_close_descriptions() {
    let config = FunnelConfig {
        sampling_strategy: SamplingStrategy::Cutoff,
        ..FunnelConfig::default()
    };
    let catalog = ItemCatalog::new(vec![entry(1, "kg", "jasmine rice thai 2kg")]);
    let similarity = TokenOverlap::default();
    let funnel =
        Funnel::new(&config, &TfidfNeighbours, &similarity).with_catalog(&catalog);

    for seed in 0..50 {
        let mut pool = CandidatePool::new();
        sold(&mut pool, &entry(2, "kg", "jasmine rice 5kg"), OUTLET, 10.0);
        sold(&mut pool, &entry(3, "kg", "rice cakes"), OUTLET, 10.0);
        sold(&mut pool, &entry(4, "kg", "rice flour"), OUTLET, 10.0);
        sold(&mut pool, &entry(5, "kg", "rice noodles"), OUTLET, 10.0);
        let mut offer = continuing_offer(1);
        let mut rng = StdRng::seed_from_u64(seed);

        let r = funnel
            .resolve(&mut pool, &mut offer, PERIOD, &BTreeSet::new(), &mut rng)
            .unwrap();
        assert_eq!(r.outcome, Outcome::Assigned);
        assert!(r.audit.continuing);
        let chosen = pool.item(r.item).unwrap();
        assert!(chosen.score(ScoreKey::NormDistance).unwrap() >= config.lower_distance_cutoff);
        assert_eq!(chosen.score(ScoreKey::Selected), Some(1.0));
    }
}

/// Every candidate occupied: CURRENT falls back to the full pool instead of
/// failing the offer.
#[test]
fn fully_occupied_pool_still_assigns() {
    let config = top_proportional();
    let similarity = TokenOverlap::default();
    let funnel = Funnel::new(&config, &TfidfNeighbours, &similarity);
    let mut pool = CandidatePool::new();
    sold(&mut pool, &entry(1, "kg", "rice"), OUTLET, 3.0);
    sold(&mut pool, &entry(2, "kg", "rice"), OUTLET, 4.0);
    let occupied: BTreeSet<ItemId> = [1, 2].into_iter().collect();
    let mut offer = new_offer();
    let mut rng = StdRng::seed_from_u64(2);

    let r = funnel
        .resolve(&mut pool, &mut offer, PERIOD, &occupied, &mut rng)
        .unwrap();
    assert_eq!(r.outcome, Outcome::Assigned);
    assert!(r.audit.reverted.contains(&SetName::Current));
    assert_eq!(r.audit.set_size(&SetName::Current), 2);
}

/// Quantity cutoffs that exclude everything restore TOP_SELLERS.
#[test]
fn quantity_cutoff_that_empties_is_reverted() {
    let config = FunnelConfig {
        lower_quantity_cutoff: 2.0,
        upper_quantity_cutoff: 3.0,
        ..top_proportional()
    };
    let similarity = TokenOverlap::default();
    let funnel = Funnel::new(&config, &TfidfNeighbours, &similarity);
    let mut pool = CandidatePool::new();
    sold(&mut pool, &entry(1, "kg", "rice"), OUTLET, 3.0);
    sold(&mut pool, &entry(2, "kg", "rice"), OUTLET, 4.0);
    let mut offer = new_offer();
    let mut rng = StdRng::seed_from_u64(3);

    let r = funnel
        .resolve(&mut pool, &mut offer, PERIOD, &BTreeSet::new(), &mut rng)
        .unwrap();
    assert_eq!(r.outcome, Outcome::Assigned);
    assert_eq!(r.audit.reverted, vec![SetName::TopSellers]);
    assert_eq!(r.audit.set_size(&SetName::TopSellers), 2);
}

/// Zero similarity everywhere leaves SIMILAR unfiltered.
#[test]
fn zero_similarity_does_not_filter() {
    let config = FunnelConfig {
        lower_quantity_cutoff: 0.0,
        ..top_proportional()
    };
    let similarity = TokenOverlap::default();
    let funnel = Funnel::new(&config, &TfidfNeighbours, &similarity);
    let mut pool = CandidatePool::new();
    sold(&mut pool, &entry(1, "kg", "bread"), OUTLET, 3.0);
    sold(&mut pool, &entry(2, "kg", "flour"), OUTLET, 4.0);
    let mut offer = new_offer();
    let mut rng = StdRng::seed_from_u64(4);

    let r = funnel
        .resolve(&mut pool, &mut offer, PERIOD, &BTreeSet::new(), &mut rng)
        .unwrap();
    assert_eq!(r.audit.set_size(&SetName::Similar), 2);
}

/// Only the best name matches survive the similarity stage.
#[test]
fn similarity_keeps_ties_at_maximum() {
    let config = FunnelConfig {
        lower_quantity_cutoff: 0.0,
        ..top_proportional()
    };
    let similarity = TokenOverlap::default();
    let funnel = Funnel::new(&config, &TfidfNeighbours, &similarity);
    let mut pool = CandidatePool::new();
    sold(&mut pool, &entry(1, "kg", "brown rice"), OUTLET, 3.0);
    sold(&mut pool, &entry(2, "kg", "white rice"), OUTLET, 4.0);
    sold(&mut pool, &entry(3, "kg", "rice white long"), OUTLET, 5.0);
    let mut offer = Offer::new(501, "white rice", OUTLET, "ON", "Ottawa", "kg");
    let mut rng = StdRng::seed_from_u64(5);

    let r = funnel
        .resolve(&mut pool, &mut offer, PERIOD, &BTreeSet::new(), &mut rng)
        .unwrap();
    assert_eq!(r.audit.set_size(&SetName::Similar), 2);
    assert!(r.item == 2 || r.item == 3);
}

// ---------------------------------------------------------------------------
// Filter building
// ---------------------------------------------------------------------------

#[test]
fn outlet_sets_are_idempotent() {
    let mut pool = CandidatePool::new();
    sold(&mut pool, &entry(1, "kg", "rice"), OUTLET, 3.0);
    sold(&mut pool, &entry(2, "kg", "rice"), OUTLET, 4.0);
    sold(&mut pool, &entry(3, "l", "rice"), OUTLET, 4.0);
    sold(&mut pool, &entry(4, "kg", "rice"), OUTLET + 1, 4.0);
    let offer = new_offer();
    let occupied: BTreeSet<ItemId> = [2].into_iter().collect();

    build_outlet_sets(&mut pool, &offer, PERIOD, &occupied).unwrap();
    let current = pool.filter_set(&SetName::Current).cloned();
    let outlet = pool.filter_set(&SetName::Outlet).cloned();

    build_outlet_sets(&mut pool, &offer, PERIOD, &occupied).unwrap();
    assert_eq!(pool.filter_set(&SetName::Current).cloned(), current);
    assert_eq!(pool.filter_set(&SetName::Outlet).cloned(), outlet);
    assert_eq!(outlet.unwrap().into_iter().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn offers_in_sequence_do_not_share_items() {
    let config = top_proportional();
    let similarity = TokenOverlap::default();
    let funnel = Funnel::new(&config, &TfidfNeighbours, &similarity);
    let mut pool = CandidatePool::new();
    sold(&mut pool, &entry(1, "kg", "rice"), OUTLET, 3.0);
    sold(&mut pool, &entry(2, "kg", "rice"), OUTLET, 4.0);
    let mut rng = StdRng::seed_from_u64(6);

    let mut first = Offer::new(1, "rice", OUTLET, "ON", "Ottawa", "kg");
    let a = funnel
        .resolve(&mut pool, &mut first, PERIOD, &BTreeSet::new(), &mut rng)
        .unwrap();
    let occupied: BTreeSet<ItemId> = [a.item].into_iter().collect();
    let mut second = Offer::new(2, "rice", OUTLET, "ON", "Ottawa", "kg");
    let b = funnel
        .resolve(&mut pool, &mut second, PERIOD, &occupied, &mut rng)
        .unwrap();

    assert_eq!(a.outcome, Outcome::Assigned);
    assert_eq!(b.outcome, Outcome::Assigned);
    assert_ne!(a.item, b.item);
}
