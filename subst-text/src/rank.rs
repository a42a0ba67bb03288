//! Rank statistics.

use std::cmp::Ordering;

/// Assign 1-based ascending ranks, averaging the ranks of tied values.
///
/// `[10.0, 5.0, 5.0, 1.0]` ranks as `[4.0, 2.5, 2.5, 1.0]`. Infinite values
/// sort after every finite value and tie with each other; NaN sorts last and
/// never ties.
pub fn rank_average(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| match values[a].total_cmp(&values[b]) {
        Ordering::Equal => a.cmp(&b),
        other => other,
    });

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end share the mean of ranks start+1 ..= end.
        let shared = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = shared;
        }
        start = end;
    }
    ranks
}
