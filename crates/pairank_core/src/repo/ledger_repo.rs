//! Vote ledger repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Append votes and update the two affected items in one transaction.
//! - Apply structural edits (vote deletion, item deletion, full rebuild) and
//!   recompute the materialized view before committing.
//!
//! # Invariants
//! - `seq` comes from `AUTOINCREMENT`, so it is never reused after deletes.
//! - Replay reads votes in `seq` order only.
//! - A failed step rolls back the ledger and the rating view together.
//! - The rating model is built from the collection row read inside the write
//!   transaction, so the fast path and replay always rate with the same
//!   settings.
//!
//! # See also
//! - `crate::recompute` for the pure replay.

use crate::model::collection::{Collection, CollectionId};
use crate::model::item::{Item, ItemId};
use crate::model::vote::{Vote, VoteHistoryEntry, VoteId};
use crate::rating::Outcome;
use crate::recompute::{replay_ledger, ItemRating};
use crate::repo::collection_repo::load_required_collection;
use crate::repo::item_repo::{list_collection_items, load_required_item, write_item_rating};
use crate::repo::{
    collection_model, normalize_page_limit, parse_uuid, RepoError, RepoResult, SqliteStore,
};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Ledger entry plus the two rating states it produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordedVote {
    pub vote: Vote,
    pub winner: ItemRating,
    pub loser: ItemRating,
}

/// Display order for vote history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Page request for [`LedgerRepository::vote_history`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteHistoryQuery {
    pub limit: Option<u32>,
    pub offset: u32,
    pub order: HistoryOrder,
    /// Case-insensitive substring matched against winner or loser label.
    pub label_filter: Option<String>,
}

/// History page with the number of votes matching the filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteHistoryPage {
    pub entries: Vec<VoteHistoryEntry>,
    pub total: i64,
}

/// Items and ledger of one collection read from the same snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub collection: Collection,
    pub items: Vec<Item>,
    /// Votes in replay order.
    pub votes: Vec<Vote>,
}

/// Result of removing an item from its collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedItem {
    pub item: Item,
    /// Number of ledger votes that referenced the item.
    pub removed_votes: i64,
    /// Recomputed ratings of the surviving items.
    pub ratings: BTreeMap<ItemId, ItemRating>,
}

/// Repository interface for the vote ledger and its recomputation.
pub trait LedgerRepository {
    /// Appends `winner > loser` and rates both items with the collection's
    /// model.
    fn record_vote(
        &self,
        collection_uuid: CollectionId,
        winner_uuid: ItemId,
        loser_uuid: ItemId,
    ) -> RepoResult<RecordedVote>;
    /// Lists the full ledger of a collection in replay order.
    fn list_votes(&self, collection_uuid: CollectionId) -> RepoResult<Vec<Vote>>;
    /// Reads the collection, its items and its ledger in one read transaction.
    fn ledger_snapshot(&self, collection_uuid: CollectionId) -> RepoResult<LedgerSnapshot>;
    fn vote_history(
        &self,
        collection_uuid: CollectionId,
        query: &VoteHistoryQuery,
    ) -> RepoResult<VoteHistoryPage>;
    /// Removes the given votes and recomputes the collection.
    ///
    /// Fails with [`RepoError::VoteNotFound`] if any sequence number is not
    /// part of the collection's ledger; nothing is removed in that case.
    fn delete_votes(
        &self,
        collection_uuid: CollectionId,
        seqs: &[VoteId],
    ) -> RepoResult<BTreeMap<ItemId, ItemRating>>;
    /// Removes an item with every vote referencing it, then recomputes the
    /// survivors.
    fn delete_item(&self, item_uuid: ItemId) -> RepoResult<DeletedItem>;
    /// Rebuilds every rating of the collection from the ledger.
    fn recompute_all(
        &self,
        collection_uuid: CollectionId,
    ) -> RepoResult<BTreeMap<ItemId, ItemRating>>;
}

const VOTE_SELECT_SQL: &str = "SELECT
    seq,
    collection_uuid,
    winner_uuid,
    loser_uuid,
    created_at
FROM votes";

impl LedgerRepository for SqliteStore<'_> {
    fn record_vote(
        &self,
        collection_uuid: CollectionId,
        winner_uuid: ItemId,
        loser_uuid: ItemId,
    ) -> RepoResult<RecordedVote> {
        if winner_uuid == loser_uuid {
            return Err(RepoError::SelfComparison(winner_uuid));
        }

        let tx = Transaction::new_unchecked(self.connection(), TransactionBehavior::Immediate)?;
        let collection = load_required_collection(&tx, collection_uuid)?;
        let model = collection_model(&collection)?;

        let winner = load_member_item(&tx, collection_uuid, winner_uuid)?;
        let loser = load_member_item(&tx, collection_uuid, loser_uuid)?;
        let (winner_state, loser_state) = model.apply(Outcome::Win, &winner.state, &loser.state);

        let vote = tx.query_row(
            "INSERT INTO votes (collection_uuid, winner_uuid, loser_uuid)
             VALUES (?1, ?2, ?3)
             RETURNING seq, created_at;",
            params![
                collection_uuid.to_string(),
                winner_uuid.to_string(),
                loser_uuid.to_string(),
            ],
            |row| {
                Ok(Vote {
                    seq: row.get(0)?,
                    collection_uuid,
                    winner_uuid,
                    loser_uuid,
                    created_at: row.get(1)?,
                })
            },
        )?;

        let winner_rating = ItemRating {
            state: winner_state,
            vote_count: winner.vote_count + 1,
        };
        let loser_rating = ItemRating {
            state: loser_state,
            vote_count: loser.vote_count + 1,
        };
        write_item_rating(&tx, winner_uuid, &winner_rating.state, winner_rating.vote_count)?;
        write_item_rating(&tx, loser_uuid, &loser_rating.state, loser_rating.vote_count)?;
        tx.commit()?;

        Ok(RecordedVote {
            vote,
            winner: winner_rating,
            loser: loser_rating,
        })
    }

    fn list_votes(&self, collection_uuid: CollectionId) -> RepoResult<Vec<Vote>> {
        let conn = self.connection();
        load_required_collection(conn, collection_uuid)?;
        list_collection_votes(conn, collection_uuid)
    }

    fn ledger_snapshot(&self, collection_uuid: CollectionId) -> RepoResult<LedgerSnapshot> {
        let tx = Transaction::new_unchecked(self.connection(), TransactionBehavior::Deferred)?;
        let collection = load_required_collection(&tx, collection_uuid)?;
        let items = list_collection_items(&tx, collection_uuid)?;
        let votes = list_collection_votes(&tx, collection_uuid)?;
        tx.commit()?;
        Ok(LedgerSnapshot {
            collection,
            items,
            votes,
        })
    }

    fn vote_history(
        &self,
        collection_uuid: CollectionId,
        query: &VoteHistoryQuery,
    ) -> RepoResult<VoteHistoryPage> {
        let conn = self.connection();
        load_required_collection(conn, collection_uuid)?;

        let mut filter_sql = String::from(" WHERE v.collection_uuid = ?");
        let mut bind_values = vec![Value::Text(collection_uuid.to_string())];
        if let Some(needle) = query
            .label_filter
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
        {
            filter_sql.push_str(
                " AND (instr(lower(w.label), lower(?)) > 0
                       OR instr(lower(l.label), lower(?)) > 0)",
            );
            bind_values.push(Value::Text(needle.to_string()));
            bind_values.push(Value::Text(needle.to_string()));
        }

        let from_sql = " FROM votes v
             INNER JOIN items w ON w.uuid = v.winner_uuid
             INNER JOIN items l ON l.uuid = v.loser_uuid";

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*){from_sql}{filter_sql};"),
            params_from_iter(bind_values.iter()),
            |row| row.get(0),
        )?;

        let order_sql = match query.order {
            HistoryOrder::NewestFirst => "DESC",
            HistoryOrder::OldestFirst => "ASC",
        };
        let sql = format!(
            "SELECT
                v.seq AS seq,
                v.collection_uuid AS collection_uuid,
                v.winner_uuid AS winner_uuid,
                v.loser_uuid AS loser_uuid,
                v.created_at AS created_at,
                w.label AS winner_label,
                l.label AS loser_label
             {from_sql}{filter_sql}
             ORDER BY v.seq {order_sql}
             LIMIT ? OFFSET ?;"
        );
        bind_values.push(Value::Integer(i64::from(normalize_page_limit(query.limit))));
        bind_values.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(VoteHistoryEntry {
                vote: parse_vote_row(row)?,
                winner_label: row.get("winner_label")?,
                loser_label: row.get("loser_label")?,
            });
        }

        Ok(VoteHistoryPage { entries, total })
    }

    fn delete_votes(
        &self,
        collection_uuid: CollectionId,
        seqs: &[VoteId],
    ) -> RepoResult<BTreeMap<ItemId, ItemRating>> {
        let tx = Transaction::new_unchecked(self.connection(), TransactionBehavior::Immediate)?;
        load_required_collection(&tx, collection_uuid)?;

        let unique: BTreeSet<VoteId> = seqs.iter().copied().collect();
        for seq in unique {
            let changed = tx.execute(
                "DELETE FROM votes WHERE seq = ?1 AND collection_uuid = ?2;",
                params![seq, collection_uuid.to_string()],
            )?;
            if changed == 0 {
                return Err(RepoError::VoteNotFound(seq));
            }
        }

        let ratings = recompute_in_tx(&tx, collection_uuid)?;
        tx.commit()?;
        Ok(ratings)
    }

    fn delete_item(&self, item_uuid: ItemId) -> RepoResult<DeletedItem> {
        let tx = Transaction::new_unchecked(self.connection(), TransactionBehavior::Immediate)?;
        let item = load_required_item(&tx, item_uuid)?;

        let removed_votes = tx.execute(
            "DELETE FROM votes WHERE winner_uuid = ?1 OR loser_uuid = ?1;",
            [item_uuid.to_string()],
        )?;
        tx.execute("DELETE FROM items WHERE uuid = ?1;", [item_uuid.to_string()])?;

        let ratings = recompute_in_tx(&tx, item.collection_uuid)?;
        tx.commit()?;

        Ok(DeletedItem {
            item,
            removed_votes: removed_votes as i64,
            ratings,
        })
    }

    fn recompute_all(
        &self,
        collection_uuid: CollectionId,
    ) -> RepoResult<BTreeMap<ItemId, ItemRating>> {
        let tx = Transaction::new_unchecked(self.connection(), TransactionBehavior::Immediate)?;
        let ratings = recompute_in_tx(&tx, collection_uuid)?;
        tx.commit()?;
        Ok(ratings)
    }
}

/// Replays the collection's ledger and writes every resulting state.
///
/// Callers own the surrounding transaction; the model comes from the
/// collection row as seen inside it.
pub(crate) fn recompute_in_tx(
    conn: &Connection,
    collection_uuid: CollectionId,
) -> RepoResult<BTreeMap<ItemId, ItemRating>> {
    let started_at = Instant::now();
    let collection = load_required_collection(conn, collection_uuid)?;
    let model = collection_model(&collection)?;

    let item_ids: Vec<ItemId> = list_collection_items(conn, collection_uuid)?
        .into_iter()
        .map(|item| item.uuid)
        .collect();
    let votes = list_collection_votes(conn, collection_uuid)?;
    let ratings = replay_ledger(model.as_ref(), &item_ids, &votes);

    for (item_uuid, rating) in &ratings {
        write_item_rating(conn, *item_uuid, &rating.state, rating.vote_count)?;
    }

    info!(
        "event=ledger_recompute module=repo status=ok collection={} model={} items={} votes={} duration_ms={}",
        collection_uuid,
        model.kind().as_str(),
        item_ids.len(),
        votes.len(),
        started_at.elapsed().as_millis()
    );
    Ok(ratings)
}

pub(crate) fn list_collection_votes(
    conn: &Connection,
    collection_uuid: CollectionId,
) -> RepoResult<Vec<Vote>> {
    let mut stmt = conn.prepare(&format!(
        "{VOTE_SELECT_SQL} WHERE collection_uuid = ?1 ORDER BY seq ASC;"
    ))?;
    let mut rows = stmt.query([collection_uuid.to_string()])?;
    let mut votes = Vec::new();
    while let Some(row) = rows.next()? {
        votes.push(parse_vote_row(row)?);
    }
    Ok(votes)
}

fn load_member_item(
    conn: &Connection,
    collection_uuid: CollectionId,
    item_uuid: ItemId,
) -> RepoResult<Item> {
    let item = load_required_item(conn, item_uuid)?;
    if item.collection_uuid != collection_uuid {
        return Err(RepoError::ItemNotInCollection {
            item_uuid,
            collection_uuid,
        });
    }
    Ok(item)
}

fn parse_vote_row(row: &Row<'_>) -> RepoResult<Vote> {
    let collection_text: String = row.get("collection_uuid")?;
    let winner_text: String = row.get("winner_uuid")?;
    let loser_text: String = row.get("loser_uuid")?;
    Ok(Vote {
        seq: row.get("seq")?,
        collection_uuid: parse_uuid(&collection_text, "votes.collection_uuid")?,
        winner_uuid: parse_uuid(&winner_text, "votes.winner_uuid")?,
        loser_uuid: parse_uuid(&loser_text, "votes.loser_uuid")?,
        created_at: row.get("created_at")?,
    })
}
