//! Deterministic replay of a vote ledger.
//!
//! # Responsibility
//! - Rebuild every item's rating from the model's initial state.
//! - Compare a stored materialized view against a fresh replay.
//!
//! # Invariants
//! - Votes are applied strictly in the order given (ledger `seq` order).
//! - Replaying the same ledger twice yields bit-identical states.
//! - Replay uses the exact same model call as the incremental path.

use crate::model::item::{Item, ItemId};
use crate::model::vote::Vote;
use crate::rating::{Outcome, RatingModel, RatingState};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rating and vote count of one item after replay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemRating {
    pub state: RatingState,
    pub vote_count: i64,
}

/// Item whose stored view differs from the ledger replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyViolation {
    pub item_uuid: ItemId,
    pub stored: ItemRating,
    pub replayed: ItemRating,
}

/// Replays `votes` over `item_ids`, all starting from `model.initial_state()`.
///
/// Votes referencing unknown items are skipped and logged; storage enforces
/// referential integrity, so this only happens for hand-built inputs.
pub fn replay_ledger(
    model: &dyn RatingModel,
    item_ids: &[ItemId],
    votes: &[Vote],
) -> BTreeMap<ItemId, ItemRating> {
    let initial = ItemRating {
        state: model.initial_state(),
        vote_count: 0,
    };
    let mut ratings: BTreeMap<ItemId, ItemRating> =
        item_ids.iter().map(|id| (*id, initial)).collect();

    for vote in votes {
        let (Some(winner), Some(loser)) = (
            ratings.get(&vote.winner_uuid).copied(),
            ratings.get(&vote.loser_uuid).copied(),
        ) else {
            warn!(
                "event=ledger_replay module=recompute status=skip seq={} reason=unknown_item",
                vote.seq
            );
            continue;
        };

        let (winner_state, loser_state) = model.apply(Outcome::Win, &winner.state, &loser.state);
        ratings.insert(
            vote.winner_uuid,
            ItemRating {
                state: winner_state,
                vote_count: winner.vote_count + 1,
            },
        );
        ratings.insert(
            vote.loser_uuid,
            ItemRating {
                state: loser_state,
                vote_count: loser.vote_count + 1,
            },
        );
    }

    ratings
}

/// Lists items whose stored rating or vote count differs from `replayed`.
pub fn find_violations(
    stored: &[Item],
    replayed: &BTreeMap<ItemId, ItemRating>,
) -> Vec<ConsistencyViolation> {
    stored
        .iter()
        .filter_map(|item| {
            let stored_rating = ItemRating {
                state: item.state,
                vote_count: item.vote_count,
            };
            let replayed_rating = replayed.get(&item.uuid)?;
            (stored_rating != *replayed_rating).then(|| ConsistencyViolation {
                item_uuid: item.uuid,
                stored: stored_rating,
                replayed: *replayed_rating,
            })
        })
        .collect()
}
