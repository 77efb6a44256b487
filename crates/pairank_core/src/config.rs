//! Engine configuration.
//!
//! # Responsibility
//! - Group the tunables of rating and pair selection in one serde-friendly
//!   record that front ends can load from files.
//!
//! # Invariants
//! - `RatingConfig::default()` reproduces the reference constants and always
//!   validates.
//! - Collections persist their own model kind, k-factor and Glicko-2
//!   constants; `model`, `k_factor` and `glicko2` here are only defaults for
//!   new collections. Reopening a database with different values never
//!   changes how existing collections are rated.

use crate::rating::elo::DEFAULT_K_FACTOR;
use crate::rating::{Glicko2Config, RatingConfigError, RatingModelKind};
use crate::selection::SelectionConfig;
use serde::{Deserialize, Serialize};

/// Rating and pair-selection settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Model used by newly created collections.
    pub model: RatingModelKind,
    /// k-factor used by newly created collections.
    pub k_factor: i64,
    /// Glicko-2 constants used by newly created collections.
    pub glicko2: Glicko2Config,
    pub selection: SelectionConfig,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            model: RatingModelKind::Elo,
            k_factor: DEFAULT_K_FACTOR,
            glicko2: Glicko2Config::default(),
            selection: SelectionConfig::default(),
        }
    }
}

impl RatingConfig {
    pub fn validate(&self) -> Result<(), RatingConfigError> {
        if self.k_factor <= 0 {
            return Err(RatingConfigError::NonPositiveKFactor(self.k_factor));
        }
        self.glicko2.validate()?;
        self.selection.validate()
    }
}
