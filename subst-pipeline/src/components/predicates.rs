use crate::filter::ItemPredicate;
use crate::types::{Item, OutletId, PeriodId, ScoreKey};

/// Keeps items that sold at `outlet` during `period`.
pub struct SoldAtOutlet {
    pub outlet: OutletId,
    pub period: PeriodId,
}

impl ItemPredicate for SoldAtOutlet {
    fn keep(&self, item: &Item) -> bool {
        item.sold_at(self.outlet, self.period)
    }
}

/// Keeps items measured in the same unit as the offer.
pub struct MatchingUom<'a> {
    pub uom: &'a str,
}

impl ItemPredicate for MatchingUom<'_> {
    fn keep(&self, item: &Item) -> bool {
        item.uom == self.uom
    }

    fn name(&self) -> &str {
        "MatchingUom"
    }
}

/// Keeps items whose stored score is at most `max`. Unscored items fail.
pub struct ScoreAtMost {
    pub key: ScoreKey,
    pub max: f64,
}

impl ItemPredicate for ScoreAtMost {
    fn keep(&self, item: &Item) -> bool {
        item.score(self.key).is_some_and(|value| value <= self.max)
    }
}

/// Keeps items whose stored score is at least `min`. Unscored items fail.
pub struct ScoreAtLeast {
    pub key: ScoreKey,
    pub min: f64,
}

impl ItemPredicate for ScoreAtLeast {
    fn keep(&self, item: &Item) -> bool {
        item.score(self.key).is_some_and(|value| value >= self.min)
    }
}
