use crate::selector::ItemScore;
use crate::types::{Item, PeriodId, ScoreKey};

/// Reads a derived score previously stored on the item.
pub struct StoredScore(pub ScoreKey);

impl ItemScore for StoredScore {
    fn score(&self, item: &Item) -> Option<f64> {
        item.score(self.0)
    }
}

/// Aggregated revenue of the item in `period`.
pub struct CurrentRevenue {
    pub period: PeriodId,
}

impl ItemScore for CurrentRevenue {
    fn score(&self, item: &Item) -> Option<f64> {
        item.period(self.period).map(|record| record.revenue)
    }
}
