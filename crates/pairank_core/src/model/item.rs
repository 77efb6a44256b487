//! Item domain model.
//!
//! # Invariants
//! - `label` is non-blank and unique within its collection.
//! - `vote_count` is never negative.
//! - `state` components are finite.

use crate::model::collection::CollectionId;
use crate::rating::RatingState;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a ranked item.
pub type ItemId = Uuid;

/// One ranked media item and its materialized rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub uuid: ItemId,
    pub collection_uuid: CollectionId,
    /// Media reference shown to the user (usually a file path).
    pub label: String,
    pub state: RatingState,
    /// Number of ledger votes this item took part in.
    pub vote_count: i64,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

/// Validation failures for [`Item`].
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValidationError {
    BlankLabel,
    NegativeVoteCount(i64),
    NonFiniteRating(RatingState),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankLabel => write!(f, "item label must not be blank"),
            Self::NegativeVoteCount(value) => {
                write!(f, "item vote count must not be negative, got {value}")
            }
            Self::NonFiniteRating(state) => write!(f, "item rating is not finite: {state:?}"),
        }
    }
}

impl Error for ItemValidationError {}

impl Item {
    /// Creates an unvoted item starting from `initial_state`.
    pub fn new(
        collection_uuid: CollectionId,
        label: impl Into<String>,
        initial_state: RatingState,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            collection_uuid,
            label: label.into(),
            state: initial_state,
            vote_count: 0,
            created_at: 0,
        }
    }

    /// Checks record-level invariants.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.label.trim().is_empty() {
            return Err(ItemValidationError::BlankLabel);
        }
        if self.vote_count < 0 {
            return Err(ItemValidationError::NegativeVoteCount(self.vote_count));
        }
        if !self.state.is_finite() {
            return Err(ItemValidationError::NonFiniteRating(self.state));
        }
        Ok(())
    }
}
