//! Vote ledger entries.
//!
//! # Invariants
//! - `seq` is assigned by storage at append time and strictly increases.
//! - Replay order is `seq` order, never `created_at` order.
//! - `winner_uuid != loser_uuid`.

use crate::model::collection::CollectionId;
use crate::model::item::ItemId;
use serde::{Deserialize, Serialize};

/// Ledger sequence number of a vote.
pub type VoteId = i64;

/// One recorded comparison outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub seq: VoteId,
    pub collection_uuid: CollectionId,
    pub winner_uuid: ItemId,
    pub loser_uuid: ItemId,
    /// Epoch ms wall-clock time; display only.
    pub created_at: i64,
}

impl Vote {
    /// Returns whether `item` took part in this vote.
    pub fn involves(&self, item: ItemId) -> bool {
        self.winner_uuid == item || self.loser_uuid == item
    }
}

/// Vote joined with the labels of both items, for history views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteHistoryEntry {
    pub vote: Vote,
    pub winner_label: String,
    pub loser_label: String,
}
