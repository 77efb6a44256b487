//! Glicko-2 rating model for single-comparison updates.
//!
//! # Responsibility
//! - Convert public-scale triples to the internal Glicko-2 scale and back.
//! - Solve the volatility equation with the Illinois root-finding method.
//!
//! # Invariants
//! - Both sides are rated from their pre-comparison states.
//! - A zero or non-finite variance takes the no-evidence branch: only the
//!   deviation grows, mu and sigma are unchanged.
//! - Volatility iteration is capped; the cap is never hit for finite inputs.
//!
//! # See also
//! - Glickman, "Example of the Glicko-2 system" (2013)

use super::{Outcome, RatingConfigError, RatingModel, RatingModelKind, RatingState};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub const DEFAULT_MU: f64 = 1500.0;
pub const DEFAULT_PHI: f64 = 350.0;
pub const DEFAULT_SIGMA: f64 = 0.06;
pub const DEFAULT_TAU: f64 = 1.0;
pub const DEFAULT_EPSILON: f64 = 0.000_001;
/// Ratio between the public Glicko scale and the internal Glicko-2 scale.
pub const SCALE_RATIO: f64 = 173.7178;

const MAX_VOLATILITY_ITERATIONS: usize = 200;

/// Glicko-2 triple on the public scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Glicko2Rating {
    /// Rating.
    pub mu: f64,
    /// Rating deviation.
    pub phi: f64,
    /// Volatility.
    pub sigma: f64,
}

impl Glicko2Rating {
    pub const fn new(mu: f64, phi: f64, sigma: f64) -> Self {
        Self { mu, phi, sigma }
    }
}

impl Default for Glicko2Rating {
    fn default() -> Self {
        Self::new(DEFAULT_MU, DEFAULT_PHI, DEFAULT_SIGMA)
    }
}

impl From<RatingState> for Glicko2Rating {
    fn from(value: RatingState) -> Self {
        match value {
            RatingState::Glicko2 { mu, phi, sigma } => Self::new(mu, phi, sigma),
            RatingState::Elo { rating } => Self::new(rating, DEFAULT_PHI, DEFAULT_SIGMA),
        }
    }
}

/// System constants of the Glicko-2 model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Glicko2Config {
    /// Constrains how fast volatility may change.
    pub tau: f64,
    /// Convergence tolerance of the volatility solver.
    pub epsilon: f64,
}

impl Glicko2Config {
    pub fn validate(&self) -> Result<(), RatingConfigError> {
        if !self.tau.is_finite() || self.tau <= 0.0 {
            return Err(RatingConfigError::InvalidTau(self.tau));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(RatingConfigError::InvalidEpsilon(self.epsilon));
        }
        Ok(())
    }
}

impl Default for Glicko2Config {
    fn default() -> Self {
        Self {
            tau: DEFAULT_TAU,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

/// Internal-scale triple.
#[derive(Debug, Clone, Copy)]
struct Scaled {
    mu: f64,
    phi: f64,
    sigma: f64,
}

fn scale_down(rating: &Glicko2Rating) -> Scaled {
    Scaled {
        mu: (rating.mu - DEFAULT_MU) / SCALE_RATIO,
        phi: rating.phi / SCALE_RATIO,
        sigma: rating.sigma,
    }
}

fn scale_up(rating: Scaled) -> Glicko2Rating {
    Glicko2Rating::new(
        rating.mu * SCALE_RATIO + DEFAULT_MU,
        rating.phi * SCALE_RATIO,
        rating.sigma,
    )
}

/// Dampens the influence of opponents with uncertain ratings.
fn impact(phi: f64) -> f64 {
    1.0 / (1.0 + 3.0 * phi * phi / (PI * PI)).sqrt()
}

fn expected(mu: f64, opponent_mu: f64, opponent_impact: f64) -> f64 {
    1.0 / (1.0 + (-opponent_impact * (mu - opponent_mu)).exp())
}

/// Rates one comparison between `a` and `b`.
pub fn glicko2(
    a: &Glicko2Rating,
    b: &Glicko2Rating,
    outcome: Outcome,
    config: &Glicko2Config,
) -> (Glicko2Rating, Glicko2Rating) {
    let (score_a, score_b) = outcome.scores();
    let new_a = glicko2_rating_period(a, &[(*b, score_a)], config);
    let new_b = glicko2_rating_period(b, &[(*a, score_b)], config);
    (new_a, new_b)
}

/// Rates one player against a series of `(opponent, score)` results.
///
/// An empty series is a period without evidence and only widens the deviation.
pub fn glicko2_rating_period(
    player: &Glicko2Rating,
    results: &[(Glicko2Rating, f64)],
    config: &Glicko2Config,
) -> Glicko2Rating {
    let current = scale_down(player);

    let mut variance_inv = 0.0;
    let mut improvement = 0.0;
    for (opponent, score) in results {
        let opponent = scale_down(opponent);
        let g = impact(opponent.phi);
        let e = expected(current.mu, opponent.mu, g);
        variance_inv += g * g * e * (1.0 - e);
        improvement += g * (score - e);
    }

    if results.is_empty() || variance_inv <= 0.0 || !variance_inv.is_finite() {
        return scale_up(Scaled {
            phi: (current.phi * current.phi + current.sigma * current.sigma).sqrt(),
            ..current
        });
    }

    let variance = 1.0 / variance_inv;
    let delta = variance * improvement;
    let sigma = new_volatility(current.phi, current.sigma, delta, variance, config);

    let pre_period_phi_sq = current.phi * current.phi + sigma * sigma;
    let phi = 1.0 / (1.0 / pre_period_phi_sq + 1.0 / variance).sqrt();
    let mu = current.mu + phi * phi * delta / variance;

    scale_up(Scaled { mu, phi, sigma })
}

/// Solves Glickman's volatility equation with the Illinois algorithm.
fn new_volatility(phi: f64, sigma: f64, delta: f64, variance: f64, config: &Glicko2Config) -> f64 {
    let tau_sq = config.tau * config.tau;
    let phi_sq = phi * phi;
    let delta_sq = delta * delta;
    let a = (sigma * sigma).ln();

    let f = |x: f64| {
        let ex = x.exp();
        let denom = phi_sq + variance + ex;
        ex * (delta_sq - phi_sq - variance - ex) / (2.0 * denom * denom) - (x - a) / tau_sq
    };

    let mut lower = a;
    let mut upper = if delta_sq > phi_sq + variance {
        (delta_sq - phi_sq - variance).ln()
    } else {
        let mut k = 1.0;
        while f(a - k * config.tau) < 0.0 && k < MAX_VOLATILITY_ITERATIONS as f64 {
            k += 1.0;
        }
        a - k * config.tau
    };

    let mut f_lower = f(lower);
    let mut f_upper = f(upper);
    let mut iterations = 0;
    while (upper - lower).abs() > config.epsilon && iterations < MAX_VOLATILITY_ITERATIONS {
        let candidate = lower + (lower - upper) * f_lower / (f_upper - f_lower);
        let f_candidate = f(candidate);
        ((lower, f_lower), (upper, f_upper)) =
            illinois_step((lower, f_lower), (upper, f_upper), (candidate, f_candidate));
        iterations += 1;
    }

    if iterations == MAX_VOLATILITY_ITERATIONS {
        log::warn!(
            "event=glicko2_volatility module=rating status=error reason=iteration_cap iterations={}",
            iterations
        );
    }

    (lower / 2.0).exp()
}

/// Narrows the bracket `(A, f(A))`, `(B, f(B))` with the new point `C`.
///
/// `A` moves to `B` only on a strict sign change between `f(C)` and `f(B)`;
/// otherwise `f(A)` is halved.
fn illinois_step(
    lower: (f64, f64),
    upper: (f64, f64),
    candidate: (f64, f64),
) -> ((f64, f64), (f64, f64)) {
    let lower = if candidate.1 * upper.1 < 0.0 {
        upper
    } else {
        (lower.0, lower.1 / 2.0)
    };
    (lower, candidate)
}

/// Glicko-2 strategy with fixed system constants.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Glicko2 {
    config: Glicko2Config,
}

impl Glicko2 {
    /// Creates the strategy, rejecting invalid constants.
    pub fn new(config: Glicko2Config) -> Result<Self, RatingConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &Glicko2Config {
        &self.config
    }
}

impl RatingModel for Glicko2 {
    fn kind(&self) -> RatingModelKind {
        RatingModelKind::Glicko2
    }

    fn initial_state(&self) -> RatingState {
        Glicko2Rating::default().into()
    }

    fn apply(
        &self,
        outcome: Outcome,
        a: &RatingState,
        b: &RatingState,
    ) -> (RatingState, RatingState) {
        let (new_a, new_b) = glicko2(&(*a).into(), &(*b).into(), outcome, &self.config);
        (new_a.into(), new_b.into())
    }

    fn expected_score(&self, a: &RatingState, b: &RatingState) -> (f64, f64) {
        let a = scale_down(&(*a).into());
        let b = scale_down(&(*b).into());
        let combined = (a.phi * a.phi + b.phi * b.phi).sqrt();
        let expected_a = expected(a.mu, b.mu, impact(combined));
        (expected_a, 1.0 - expected_a)
    }
}
