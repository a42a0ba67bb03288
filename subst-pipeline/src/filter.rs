use crate::types::Item;
use crate::util;

/// Predicates decide which items stay in a filter set.
///
/// Any `Fn(&Item) -> bool` closure is a predicate; named predicates live in
/// `components` so they show up readably in logs.
pub trait ItemPredicate {
    /// Return `true` to keep the item.
    fn keep(&self, item: &Item) -> bool;

    /// Returns a stable name for logging.
    fn name(&self) -> &str {
        util::short_type_name(std::any::type_name::<Self>())
    }
}

impl<F> ItemPredicate for F
where
    F: Fn(&Item) -> bool,
{
    fn keep(&self, item: &Item) -> bool {
        self(item)
    }
}
