use std::cmp::Ordering;

use crate::types::Item;
use crate::util;

/// Retrieves the numeric signal that cutoffs, normalization and sampling
/// operate on.
pub trait ItemScore {
    /// `None` when the item does not carry the signal. Callers treat a
    /// missing score as failing a cutoff, never as an error.
    fn score(&self, item: &Item) -> Option<f64>;

    /// Returns a stable name for logging.
    fn name(&self) -> &str {
        util::short_type_name(std::any::type_name::<Self>())
    }
}

impl<F> ItemScore for F
where
    F: Fn(&Item) -> Option<f64>,
{
    fn score(&self, item: &Item) -> Option<f64> {
        self(item)
    }
}

/// Descending order with NaN pushed to the end.
pub(crate) fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
