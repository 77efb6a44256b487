//! Ranking use-case service.
//!
//! # Responsibility
//! - Record votes through each collection's rating model.
//! - Apply structural ledger edits and full recomputation.
//! - Report reliability, statistics, history and the next pair to vote on.
//!
//! # Invariants
//! - The rating model is always rebuilt from the collection's persisted
//!   settings, never from this service's configuration, so incremental
//!   updates and replay use the same model.
//! - Ledger writes leave model construction to the repository, which reads
//!   the settings inside its write transaction.
//! - Explicit reliability targets must lie strictly between 50 and 100.

use crate::config::RatingConfig;
use crate::model::collection::{Collection, CollectionId};
use crate::model::item::{Item, ItemId};
use crate::model::vote::VoteId;
use crate::rating::RatingState;
use crate::recompute::{find_violations, replay_ledger, ConsistencyViolation, ItemRating};
use crate::reliability::{
    calculate_reliability, calculate_required_votes, next_target, BASE_RELIABILITY,
};
use crate::repo::collection_repo::CollectionRepository;
use crate::repo::item_repo::{ItemRepository, RankingPage, RankingQuery};
use crate::repo::ledger_repo::{
    DeletedItem, LedgerRepository, RecordedVote, VoteHistoryPage, VoteHistoryQuery,
};
use crate::selection::{select_pair, PairCandidate};
use crate::service::{ServiceError, ServiceResult};
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Reliability overview of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub collection_uuid: CollectionId,
    pub item_count: i64,
    pub vote_count: i64,
    /// Current reliability percentage.
    pub reliability: f64,
    /// Target the remaining-votes figure refers to.
    pub target: f64,
    /// Total votes needed for `target`.
    pub required_votes: i64,
    /// Votes still to cast, never negative.
    pub votes_needed: i64,
}

/// Outcome of replaying a collection's ledger against its stored ratings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub collection_uuid: CollectionId,
    pub items_checked: usize,
    pub votes_replayed: usize,
    pub violations: Vec<ConsistencyViolation>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Ranking service facade.
pub struct RankingService<R> {
    repo: R,
    config: RatingConfig,
}

impl<R> RankingService<R>
where
    R: CollectionRepository + ItemRepository + LedgerRepository,
{
    /// Creates the service after validating `config`.
    pub fn try_new(repo: R, config: RatingConfig) -> ServiceResult<Self> {
        config.validate()?;
        Ok(Self { repo, config })
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    /// Adds an item starting from the collection model's initial state.
    pub fn add_item(&self, collection_uuid: CollectionId, label: &str) -> ServiceResult<Item> {
        let label = label.trim();
        if label.is_empty() {
            return Err(ServiceError::InvalidInput(
                "item label must not be blank".to_string(),
            ));
        }
        let collection = self.load_collection(collection_uuid)?;
        let model = collection.model()?;
        let item = Item::new(collection_uuid, label, model.initial_state());
        self.repo.add_item(&item).map_err(Into::into)
    }

    pub fn get_item(&self, item_uuid: ItemId) -> ServiceResult<Item> {
        self.repo
            .get_item(item_uuid)?
            .ok_or(ServiceError::ItemNotFound(item_uuid))
    }

    /// Lists a collection's items ordered by label.
    pub fn list_items(&self, collection_uuid: CollectionId) -> ServiceResult<Vec<Item>> {
        self.load_collection(collection_uuid)?;
        self.repo.list_items(collection_uuid).map_err(Into::into)
    }

    /// Looks an item up by its exact (trimmed) label.
    pub fn find_item_by_label(
        &self,
        collection_uuid: CollectionId,
        label: &str,
    ) -> ServiceResult<Option<Item>> {
        let label = label.trim();
        Ok(self
            .list_items(collection_uuid)?
            .into_iter()
            .find(|item| item.label == label))
    }

    pub fn ranking(
        &self,
        collection_uuid: CollectionId,
        query: &RankingQuery,
    ) -> ServiceResult<RankingPage> {
        self.repo
            .ranking_page(collection_uuid, query)
            .map_err(Into::into)
    }

    /// Records `winner > loser` and returns both new states.
    pub fn apply_vote(
        &self,
        winner_uuid: ItemId,
        loser_uuid: ItemId,
        collection_uuid: CollectionId,
    ) -> ServiceResult<(RatingState, RatingState)> {
        let recorded = self.record_vote(winner_uuid, loser_uuid, collection_uuid)?;
        Ok((recorded.winner.state, recorded.loser.state))
    }

    /// Like [`Self::apply_vote`], also returning the ledger entry.
    pub fn record_vote(
        &self,
        winner_uuid: ItemId,
        loser_uuid: ItemId,
        collection_uuid: CollectionId,
    ) -> ServiceResult<RecordedVote> {
        if winner_uuid == loser_uuid {
            return Err(ServiceError::SelfComparison(winner_uuid));
        }
        let started_at = Instant::now();
        match self.repo.record_vote(collection_uuid, winner_uuid, loser_uuid) {
            Ok(recorded) => {
                debug!(
                    "event=vote_apply module=service status=ok collection={} seq={} duration_ms={}",
                    collection_uuid,
                    recorded.vote.seq,
                    started_at.elapsed().as_millis()
                );
                Ok(recorded)
            }
            Err(err) => {
                warn!(
                    "event=vote_apply module=service status=error collection={collection_uuid} error={err}"
                );
                Err(err.into())
            }
        }
    }

    /// Rebuilds every rating of the collection from its ledger.
    pub fn recompute(
        &self,
        collection_uuid: CollectionId,
    ) -> ServiceResult<BTreeMap<ItemId, RatingState>> {
        let ratings = self.repo.recompute_all(collection_uuid)?;
        Ok(into_states(ratings))
    }

    /// Removes votes by sequence number and recomputes the collection.
    pub fn delete_votes(
        &self,
        collection_uuid: CollectionId,
        seqs: &[VoteId],
    ) -> ServiceResult<BTreeMap<ItemId, RatingState>> {
        let ratings = self.repo.delete_votes(collection_uuid, seqs)?;
        info!(
            "event=vote_delete module=service status=ok collection={} votes={}",
            collection_uuid,
            seqs.len()
        );
        Ok(into_states(ratings))
    }

    /// Removes an item with its votes and recomputes the survivors.
    pub fn delete_item(&self, item_uuid: ItemId) -> ServiceResult<DeletedItem> {
        let deleted = self.repo.delete_item(item_uuid)?;
        info!(
            "event=item_delete module=service status=ok collection={} item={} removed_votes={}",
            deleted.item.collection_uuid, item_uuid, deleted.removed_votes
        );
        Ok(deleted)
    }

    pub fn history(
        &self,
        collection_uuid: CollectionId,
        query: &VoteHistoryQuery,
    ) -> ServiceResult<VoteHistoryPage> {
        self.repo
            .vote_history(collection_uuid, query)
            .map_err(Into::into)
    }

    /// Replays the ledger without writing and reports drifted items.
    pub fn verify(&self, collection_uuid: CollectionId) -> ServiceResult<ConsistencyReport> {
        let snapshot = self.repo.ledger_snapshot(collection_uuid)?;
        let model = snapshot.collection.model()?;
        let item_ids: Vec<ItemId> = snapshot.items.iter().map(|item| item.uuid).collect();
        let replayed = replay_ledger(model.as_ref(), &item_ids, &snapshot.votes);
        let violations = find_violations(&snapshot.items, &replayed);

        if !violations.is_empty() {
            warn!(
                "event=ledger_verify module=service status=error collection={} violations={}",
                collection_uuid,
                violations.len()
            );
        }
        Ok(ConsistencyReport {
            collection_uuid,
            items_checked: snapshot.items.len(),
            votes_replayed: snapshot.votes.len(),
            violations,
        })
    }

    pub fn reliability(&self, item_count: i64, vote_count: i64) -> f64 {
        calculate_reliability(item_count, vote_count)
    }

    /// Total votes for `item_count` items to reach `target_reliability`.
    pub fn votes_needed(&self, item_count: i64, target_reliability: f64) -> i64 {
        calculate_required_votes(item_count, target_reliability)
    }

    /// Reports reliability and the votes still needed for `target`.
    ///
    /// Without an explicit target the next tier is used: 94 once the
    /// collection reaches 85, otherwise 85.
    pub fn stats(
        &self,
        collection_uuid: CollectionId,
        target: Option<f64>,
    ) -> ServiceResult<CollectionStats> {
        if let Some(target) = target {
            if !(target > BASE_RELIABILITY && target < 100.0) {
                return Err(ServiceError::InvalidInput(format!(
                    "target reliability must be between 50 and 100 (exclusive), got {target}"
                )));
            }
        }

        let counts = self.repo.collection_counts(collection_uuid)?;
        let reliability = calculate_reliability(counts.item_count, counts.vote_count);
        let target = target.unwrap_or_else(|| next_target(reliability));
        let required_votes = calculate_required_votes(counts.item_count, target);

        Ok(CollectionStats {
            collection_uuid,
            item_count: counts.item_count,
            vote_count: counts.vote_count,
            reliability,
            target,
            required_votes,
            votes_needed: (required_votes - counts.vote_count).max(0),
        })
    }

    /// Picks the next pair with the thread-local RNG.
    pub fn next_pair(&self, collection_uuid: CollectionId) -> ServiceResult<Option<(ItemId, ItemId)>> {
        self.next_pair_with_rng(collection_uuid, &mut rand::thread_rng())
    }

    /// Picks the next pair with a caller-supplied RNG.
    pub fn next_pair_with_rng<G: Rng + ?Sized>(
        &self,
        collection_uuid: CollectionId,
        rng: &mut G,
    ) -> ServiceResult<Option<(ItemId, ItemId)>> {
        let snapshot = self.repo.ledger_snapshot(collection_uuid)?;
        let candidates: Vec<PairCandidate> = snapshot
            .items
            .iter()
            .map(|item| PairCandidate {
                item_uuid: item.uuid,
                rating: item.state.rating(),
                vote_count: item.vote_count,
            })
            .collect();
        Ok(select_pair(
            &candidates,
            snapshot.votes.len() as i64,
            &self.config.selection,
            rng,
        ))
    }

    /// Expected win probabilities of `a` against `b` under the collection's model.
    pub fn expected_score(&self, a: &Item, b: &Item) -> ServiceResult<(f64, f64)> {
        if a.collection_uuid != b.collection_uuid {
            return Err(ServiceError::ItemNotInCollection {
                item_uuid: b.uuid,
                collection_uuid: a.collection_uuid,
            });
        }
        let collection = self.load_collection(a.collection_uuid)?;
        let model = collection.model()?;
        Ok(model.expected_score(&a.state, &b.state))
    }

    fn load_collection(&self, collection_uuid: CollectionId) -> ServiceResult<Collection> {
        self.repo
            .get_collection(collection_uuid)?
            .ok_or(ServiceError::CollectionNotFound(collection_uuid))
    }
}

fn into_states(ratings: BTreeMap<ItemId, ItemRating>) -> BTreeMap<ItemId, RatingState> {
    ratings
        .into_iter()
        .map(|(item_uuid, rating)| (item_uuid, rating.state))
        .collect()
}
