//! Collection domain model.
//!
//! # Responsibility
//! - Define the scoping boundary that owns items and votes.
//! - Carry the per-collection rating model selection.
//!
//! # Invariants
//! - `name` is non-blank and unique across collections.
//! - `k_factor` is strictly positive, even for Glicko-2 collections, so a
//!   later switch to ELO never needs a new value.
//! - The rating model is fully determined by the collection record; no
//!   process-level setting takes part in rating its votes.

use crate::rating::elo::DEFAULT_K_FACTOR;
use crate::rating::{build_model, Glicko2Config, RatingConfigError, RatingModel, RatingModelKind};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a collection.
pub type CollectionId = Uuid;

/// A set of items ranked against each other, with its vote ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub uuid: CollectionId,
    /// User-facing name, unique across collections.
    pub name: String,
    pub rating_model: RatingModelKind,
    /// ELO k-factor for this collection.
    pub k_factor: i64,
    /// Glicko-2 system constants for this collection.
    pub glicko2: Glicko2Config,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

/// Validation failures for [`Collection`].
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionValidationError {
    BlankName,
    NonPositiveKFactor(i64),
    InvalidGlicko2(RatingConfigError),
}

impl Display for CollectionValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "collection name must not be blank"),
            Self::NonPositiveKFactor(value) => {
                write!(f, "collection k-factor must be greater than zero, got {value}")
            }
            Self::InvalidGlicko2(err) => write!(f, "collection glicko-2 settings: {err}"),
        }
    }
}

impl Error for CollectionValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidGlicko2(err) => Some(err),
            _ => None,
        }
    }
}

impl Collection {
    /// Creates a collection with a generated ID and the default k-factor.
    ///
    /// The name is trimmed; `created_at` is assigned by storage.
    pub fn new(name: impl Into<String>, rating_model: RatingModelKind) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            rating_model,
            k_factor: DEFAULT_K_FACTOR,
            glicko2: Glicko2Config::default(),
            created_at: 0,
        }
    }

    /// Overrides the ELO k-factor.
    pub fn with_k_factor(mut self, k_factor: i64) -> Self {
        self.k_factor = k_factor;
        self
    }

    /// Overrides the Glicko-2 system constants.
    pub fn with_glicko2(mut self, glicko2: Glicko2Config) -> Self {
        self.glicko2 = glicko2;
        self
    }

    /// Builds the rating strategy this collection's votes are rated with.
    pub fn model(&self) -> Result<Box<dyn RatingModel>, RatingConfigError> {
        build_model(self.rating_model, self.k_factor, self.glicko2)
    }

    /// Checks record-level invariants.
    pub fn validate(&self) -> Result<(), CollectionValidationError> {
        if self.name.trim().is_empty() {
            return Err(CollectionValidationError::BlankName);
        }
        if self.k_factor <= 0 {
            return Err(CollectionValidationError::NonPositiveKFactor(self.k_factor));
        }
        self.glicko2
            .validate()
            .map_err(CollectionValidationError::InvalidGlicko2)?;
        Ok(())
    }
}
