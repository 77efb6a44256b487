//! Pairwise rating models.
//!
//! # Responsibility
//! - Define the strategy contract shared by every rating model.
//! - Provide ELO and Glicko-2 implementations behind that contract.
//!
//! # Invariants
//! - Models are pure: same inputs always produce bit-identical outputs.
//! - `apply` always returns states of the model's own kind.
//! - Models never validate configuration at call time; construction does.

use serde::{Deserialize, Serialize};

pub mod elo;
pub mod glicko2;

pub use elo::{Elo, EloRating};
pub use glicko2::{Glicko2, Glicko2Config, Glicko2Rating};

/// Result of one comparison, always from the perspective of side `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Side `a` won.
    Win,
    /// Side `a` lost.
    Loss,
    /// Neither side won.
    Draw,
}

impl Outcome {
    /// Converts the outcome into `(score_a, score_b)` chess points.
    ///
    /// The two scores always sum to exactly `1.0`.
    pub const fn scores(self) -> (f64, f64) {
        match self {
            Self::Win => (1.0, 0.0),
            Self::Loss => (0.0, 1.0),
            Self::Draw => (0.5, 0.5),
        }
    }

    /// Returns the same result seen from side `b`.
    pub const fn reversed(self) -> Self {
        match self {
            Self::Win => Self::Loss,
            Self::Loss => Self::Win,
            Self::Draw => Self::Draw,
        }
    }
}

/// Rating model selected per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingModelKind {
    Elo,
    Glicko2,
}

impl RatingModelKind {
    /// Stable storage/CLI name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Elo => "elo",
            Self::Glicko2 => "glicko2",
        }
    }

    /// Parses the stable name produced by [`RatingModelKind::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "elo" => Some(Self::Elo),
            "glicko2" => Some(Self::Glicko2),
            _ => None,
        }
    }
}

/// Materialized rating of one item.
///
/// Serialized with a `model` tag so persisted snapshots stay self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum RatingState {
    /// Scalar ELO rating.
    Elo { rating: f64 },
    /// Glicko-2 triple on the public scale.
    Glicko2 { mu: f64, phi: f64, sigma: f64 },
}

impl RatingState {
    /// Rating on the public scale used for ordering and pair windows.
    pub const fn rating(&self) -> f64 {
        match self {
            Self::Elo { rating } => *rating,
            Self::Glicko2 { mu, .. } => *mu,
        }
    }

    /// Rating deviation, when the model tracks one.
    pub const fn deviation(&self) -> Option<f64> {
        match self {
            Self::Elo { .. } => None,
            Self::Glicko2 { phi, .. } => Some(*phi),
        }
    }

    /// Volatility, when the model tracks one.
    pub const fn volatility(&self) -> Option<f64> {
        match self {
            Self::Elo { .. } => None,
            Self::Glicko2 { sigma, .. } => Some(*sigma),
        }
    }

    /// Model family this state belongs to.
    pub const fn kind(&self) -> RatingModelKind {
        match self {
            Self::Elo { .. } => RatingModelKind::Elo,
            Self::Glicko2 { .. } => RatingModelKind::Glicko2,
        }
    }

    /// Returns whether every component is a finite number.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Elo { rating } => rating.is_finite(),
            Self::Glicko2 { mu, phi, sigma } => {
                mu.is_finite() && phi.is_finite() && sigma.is_finite()
            }
        }
    }
}

impl From<EloRating> for RatingState {
    fn from(value: EloRating) -> Self {
        Self::Elo {
            rating: value.rating,
        }
    }
}

impl From<Glicko2Rating> for RatingState {
    fn from(value: Glicko2Rating) -> Self {
        Self::Glicko2 {
            mu: value.mu,
            phi: value.phi,
            sigma: value.sigma,
        }
    }
}

/// Strategy contract for pairwise rating models.
pub trait RatingModel {
    /// Model family implemented by this strategy.
    fn kind(&self) -> RatingModelKind;

    /// State every item starts from, and that replay resets to.
    fn initial_state(&self) -> RatingState;

    /// Rates one comparison between `a` and `b`.
    ///
    /// States of another model family are converted first: a scalar rating
    /// becomes a Glicko-2 `mu` with default deviation and volatility, and a
    /// Glicko-2 `mu` becomes a scalar rating.
    fn apply(&self, outcome: Outcome, a: &RatingState, b: &RatingState)
        -> (RatingState, RatingState);

    /// Probability of each side winning, `(p_a, p_b)`.
    fn expected_score(&self, a: &RatingState, b: &RatingState) -> (f64, f64);
}

/// Errors raised while building a rating model from configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum RatingConfigError {
    /// ELO k-factor must be strictly positive.
    NonPositiveKFactor(i64),
    /// Glicko-2 `tau` must be finite and strictly positive.
    InvalidTau(f64),
    /// Glicko-2 convergence tolerance must be finite and strictly positive.
    InvalidEpsilon(f64),
    /// Pair-selection reliability threshold must lie in `[50, 100]`.
    InvalidReliabilityThreshold(f64),
    /// Pair-selection rating window must be finite and non-negative.
    InvalidRatingWindow(f64),
}

impl std::fmt::Display for RatingConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveKFactor(value) => {
                write!(f, "k-factor must be greater than zero, got {value}")
            }
            Self::InvalidTau(value) => write!(f, "tau must be finite and positive, got {value}"),
            Self::InvalidEpsilon(value) => {
                write!(f, "epsilon must be finite and positive, got {value}")
            }
            Self::InvalidReliabilityThreshold(value) => {
                write!(f, "reliability threshold must be within [50, 100], got {value}")
            }
            Self::InvalidRatingWindow(value) => {
                write!(f, "rating window must be finite and non-negative, got {value}")
            }
        }
    }
}

impl std::error::Error for RatingConfigError {}

/// Builds the strategy for a collection's model selection.
///
/// `k_factor` is used by ELO only; `glicko2` by Glicko-2 only.
pub fn build_model(
    kind: RatingModelKind,
    k_factor: i64,
    glicko2: Glicko2Config,
) -> Result<Box<dyn RatingModel>, RatingConfigError> {
    match kind {
        RatingModelKind::Elo => Ok(Box::new(Elo::new(k_factor)?)),
        RatingModelKind::Glicko2 => Ok(Box::new(Glicko2::new(glicko2)?)),
    }
}
