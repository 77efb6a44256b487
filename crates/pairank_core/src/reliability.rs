//! Ranking reliability estimate from vote volume.
//!
//! # Responsibility
//! - Map `(item_count, vote_count)` to an expected ranking accuracy.
//! - Invert that mapping to answer "how many votes until X%".
//!
//! # Invariants
//! - Estimates are independent of the rating model in use.
//! - `calculate_reliability(n, 0) == 50.0` for every `n > 0`.
//! - Reliability is non-decreasing in `vote_count` and capped at 100.

/// Accuracy of a random ordering.
pub const BASE_RELIABILITY: f64 = 50.0;
/// Reliability from which pair selection switches to nearby opponents and
/// collection stats aim for [`HIGH_TARGET_RELIABILITY`].
pub const HIGH_RELIABILITY_THRESHOLD: f64 = 85.0;
/// Stats target once [`HIGH_RELIABILITY_THRESHOLD`] is reached.
pub const HIGH_TARGET_RELIABILITY: f64 = 94.0;
/// Tolerance, in percentage points, of the required-votes search.
pub const TARGET_TOLERANCE: f64 = 0.1;
/// Upper bound of the required-votes search, per item.
const MAX_VOTES_PER_ITEM: i64 = 1000;

/// `(weight, decay)` of each saturating gain term: fast, steady, final.
const GAIN_TERMS: [(f64, f64); 3] = [(25.0, 2.0), (20.0, 10.0), (5.0, 50.0)];

/// Estimated ranking reliability, in percent, after `vote_count` votes over
/// `item_count` items.
///
/// Returns `0.0` for `item_count <= 0` or `vote_count < 0`.
pub fn calculate_reliability(item_count: i64, vote_count: i64) -> f64 {
    if item_count <= 0 || vote_count < 0 {
        return 0.0;
    }

    let votes_per_item = vote_count as f64 / item_count as f64;
    let gain: f64 = GAIN_TERMS
        .iter()
        .map(|(weight, decay)| weight * (1.0 - (-votes_per_item / decay).exp()))
        .sum();

    (BASE_RELIABILITY + gain).min(100.0)
}

/// Smallest vote count whose reliability lands within
/// [`TARGET_TOLERANCE`] of `target`.
///
/// When no vote count lands inside the tolerance (small collections move in
/// coarse steps) the first vote count reaching `target - TARGET_TOLERANCE` is
/// returned. Returns `0` for `item_count <= 0` or a target outside `(50, 100)`.
pub fn calculate_required_votes(item_count: i64, target: f64) -> i64 {
    if item_count <= 0 || !(target > BASE_RELIABILITY && target < 100.0) {
        return 0;
    }

    let floor = target - TARGET_TOLERANCE;
    let mut low = 0_i64;
    let mut high = item_count.saturating_mul(MAX_VOTES_PER_ITEM);
    while low < high {
        let mid = low + (high - low) / 2;
        if calculate_reliability(item_count, mid) < floor {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    low
}

/// Next stats target for a collection at `reliability`.
pub fn next_target(reliability: f64) -> f64 {
    if reliability >= HIGH_RELIABILITY_THRESHOLD {
        HIGH_TARGET_RELIABILITY
    } else {
        HIGH_RELIABILITY_THRESHOLD
    }
}
