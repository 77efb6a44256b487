//! ELO rating model.
//!
//! # Invariants
//! - Both sides use the same k-factor, so `delta_a == -delta_b` exactly.
//! - The k-factor is validated once at construction.

use super::{Outcome, RatingConfigError, RatingModel, RatingModelKind, RatingState};
use serde::{Deserialize, Serialize};

/// Rating every item starts from.
pub const DEFAULT_ELO_RATING: f64 = 1200.0;
/// K-factor used when a collection does not override it.
pub const DEFAULT_K_FACTOR: i64 = 16;
/// Rating difference at which the stronger side is ten times more likely to win.
const LOGISTIC_SCALE: f64 = 400.0;

/// Scalar ELO rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EloRating {
    pub rating: f64,
}

impl EloRating {
    pub const fn new(rating: f64) -> Self {
        Self { rating }
    }
}

impl Default for EloRating {
    fn default() -> Self {
        Self::new(DEFAULT_ELO_RATING)
    }
}

impl From<RatingState> for EloRating {
    fn from(value: RatingState) -> Self {
        Self::new(value.rating())
    }
}

/// Expected scores `(e_a, e_b)` of a comparison between `a` and `b`.
pub fn expected_score(a: &EloRating, b: &EloRating) -> (f64, f64) {
    let expected_a = 1.0 / (1.0 + 10_f64.powf((b.rating - a.rating) / LOGISTIC_SCALE));
    (expected_a, 1.0 - expected_a)
}

/// Rates one comparison.
///
/// The rating change is computed once and applied with opposite signs, so the
/// rating mass of the pair is conserved.
pub fn elo(a: &EloRating, b: &EloRating, outcome: Outcome, k_factor: i64) -> (EloRating, EloRating) {
    let (expected_a, _) = expected_score(a, b);
    let (score_a, _) = outcome.scores();
    let delta = k_factor as f64 * (score_a - expected_a);

    (
        EloRating::new(a.rating + delta),
        EloRating::new(b.rating - delta),
    )
}

/// ELO strategy with a fixed k-factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Elo {
    k_factor: i64,
}

impl Elo {
    /// Creates the strategy, rejecting a non-positive k-factor.
    pub fn new(k_factor: i64) -> Result<Self, RatingConfigError> {
        if k_factor <= 0 {
            return Err(RatingConfigError::NonPositiveKFactor(k_factor));
        }
        Ok(Self { k_factor })
    }

    pub const fn k_factor(&self) -> i64 {
        self.k_factor
    }
}

impl Default for Elo {
    fn default() -> Self {
        Self {
            k_factor: DEFAULT_K_FACTOR,
        }
    }
}

impl RatingModel for Elo {
    fn kind(&self) -> RatingModelKind {
        RatingModelKind::Elo
    }

    fn initial_state(&self) -> RatingState {
        EloRating::default().into()
    }

    fn apply(
        &self,
        outcome: Outcome,
        a: &RatingState,
        b: &RatingState,
    ) -> (RatingState, RatingState) {
        let (new_a, new_b) = elo(&(*a).into(), &(*b).into(), outcome, self.k_factor);
        (new_a.into(), new_b.into())
    }

    fn expected_score(&self, a: &RatingState, b: &RatingState) -> (f64, f64) {
        expected_score(&(*a).into(), &(*b).into())
    }
}
