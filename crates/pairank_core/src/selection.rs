//! Next-pair selection for voting.
//!
//! # Responsibility
//! - Keep vote counts balanced by always starting from a least-voted item.
//! - Switch opponent choice from exploratory to nearby-rating once the
//!   collection's estimated reliability is high enough.
//!
//! # Invariants
//! - The first item always has the collection's minimum vote count.
//! - The two returned items are always distinct.
//! - Fewer than two candidates yields `None`.

use crate::model::item::ItemId;
use crate::rating::RatingConfigError;
use crate::reliability::{calculate_reliability, BASE_RELIABILITY, HIGH_RELIABILITY_THRESHOLD};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Rating distance, on the public scale, considered "nearby".
pub const DEFAULT_RATING_WINDOW: f64 = 100.0;

/// Tunables of the selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Reliability at or above which opponents are drawn from the rating window.
    pub reliability_threshold: f64,
    /// Half-width of the opponent rating window.
    pub rating_window: f64,
}

impl SelectionConfig {
    pub fn validate(&self) -> Result<(), RatingConfigError> {
        let threshold = self.reliability_threshold;
        if !(BASE_RELIABILITY..=100.0).contains(&threshold) {
            return Err(RatingConfigError::InvalidReliabilityThreshold(threshold));
        }
        if !self.rating_window.is_finite() || self.rating_window < 0.0 {
            return Err(RatingConfigError::InvalidRatingWindow(self.rating_window));
        }
        Ok(())
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            reliability_threshold: HIGH_RELIABILITY_THRESHOLD,
            rating_window: DEFAULT_RATING_WINDOW,
        }
    }
}

/// Opponent policy for the second item of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpponentStrategy {
    /// Any other item; maximizes information while the order is still rough.
    Exploratory,
    /// Items rated close to the first one; refines an already decent order.
    NearbyRating,
}

/// Selection input for one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairCandidate {
    pub item_uuid: ItemId,
    /// Public-scale rating (ELO rating or Glicko-2 mu).
    pub rating: f64,
    pub vote_count: i64,
}

/// Strategy for a collection currently at `reliability` percent.
pub fn opponent_strategy(reliability: f64, config: &SelectionConfig) -> OpponentStrategy {
    if reliability >= config.reliability_threshold {
        OpponentStrategy::NearbyRating
    } else {
        OpponentStrategy::Exploratory
    }
}

/// Picks the next pair to vote on.
///
/// `total_votes` is the collection's ledger length; together with the number of
/// candidates it drives the reliability estimate that selects the strategy.
pub fn select_pair<R: Rng + ?Sized>(
    candidates: &[PairCandidate],
    total_votes: i64,
    config: &SelectionConfig,
    rng: &mut R,
) -> Option<(ItemId, ItemId)> {
    if candidates.len() < 2 {
        return None;
    }

    let min_votes = candidates.iter().map(|c| c.vote_count).min()?;
    let least_voted: Vec<&PairCandidate> = candidates
        .iter()
        .filter(|c| c.vote_count == min_votes)
        .collect();
    let first = **least_voted.choose(rng)?;

    let others: Vec<&PairCandidate> = candidates
        .iter()
        .filter(|c| c.item_uuid != first.item_uuid)
        .collect();

    let reliability = calculate_reliability(candidates.len() as i64, total_votes);
    let second = match opponent_strategy(reliability, config) {
        OpponentStrategy::Exploratory => *others.choose(rng)?,
        OpponentStrategy::NearbyRating => {
            let nearby: Vec<&PairCandidate> = others
                .iter()
                .copied()
                .filter(|c| (c.rating - first.rating).abs() <= config.rating_window)
                .collect();
            match nearby.choose(rng) {
                Some(candidate) => *candidate,
                None => *others.choose(rng)?,
            }
        }
    };

    Some((first.item_uuid, second.item_uuid))
}
