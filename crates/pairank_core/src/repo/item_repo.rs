//! Item repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist items and expose their materialized rating view.
//! - Serve ranking pages ordered by public-scale rating.
//!
//! # Invariants
//! - Labels are unique within one collection.
//! - An ELO state is stored with NULL deviation and volatility; a Glicko-2
//!   state stores all three columns.
//! - Ranking order is deterministic: `rating DESC, label ASC, uuid ASC`.

use crate::model::collection::CollectionId;
use crate::model::item::{Item, ItemId};
use crate::rating::RatingState;
use crate::repo::collection_repo::load_required_collection;
use crate::repo::{normalize_page_limit, parse_uuid, RepoError, RepoResult, SqliteStore};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

/// Page request for [`ItemRepository::ranking_page`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingQuery {
    /// Page size; normalized by [`normalize_page_limit`].
    pub limit: Option<u32>,
    pub offset: u32,
}

/// One row of a ranking page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    /// 1-based position in the full ranking.
    pub rank: i64,
    pub item: Item,
}

/// Ranking page with the collection's total item count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingPage {
    pub items: Vec<RankedItem>,
    pub total: i64,
}

/// Repository interface for item persistence.
pub trait ItemRepository {
    /// Inserts a validated item into an existing collection.
    fn add_item(&self, item: &Item) -> RepoResult<Item>;
    fn get_item(&self, uuid: ItemId) -> RepoResult<Option<Item>>;
    /// Lists all items of a collection ordered by label.
    fn list_items(&self, collection_uuid: CollectionId) -> RepoResult<Vec<Item>>;
    fn ranking_page(
        &self,
        collection_uuid: CollectionId,
        query: &RankingQuery,
    ) -> RepoResult<RankingPage>;
}

const ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    collection_uuid,
    label,
    rating,
    deviation,
    volatility,
    vote_count,
    created_at
FROM items";

impl ItemRepository for SqliteStore<'_> {
    fn add_item(&self, item: &Item) -> RepoResult<Item> {
        item.validate()?;

        let tx = Transaction::new_unchecked(self.connection(), TransactionBehavior::Immediate)?;
        let collection = load_required_collection(&tx, item.collection_uuid)?;
        if item.state.kind() != collection.rating_model {
            return Err(RepoError::InvalidData(format!(
                "item state model `{}` does not match collection model `{}`",
                item.state.kind().as_str(),
                collection.rating_model.as_str()
            )));
        }
        if label_taken(&tx, item.collection_uuid, &item.label)? {
            return Err(RepoError::DuplicateItemLabel {
                collection_uuid: item.collection_uuid,
                label: item.label.clone(),
            });
        }

        tx.execute(
            "INSERT INTO items (
                uuid,
                collection_uuid,
                label,
                rating,
                deviation,
                volatility,
                vote_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                item.uuid.to_string(),
                item.collection_uuid.to_string(),
                item.label,
                item.state.rating(),
                item.state.deviation(),
                item.state.volatility(),
                item.vote_count,
            ],
        )?;
        let stored = load_required_item(&tx, item.uuid)?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_item(&self, uuid: ItemId) -> RepoResult<Option<Item>> {
        load_item(self.connection(), uuid)
    }

    fn list_items(&self, collection_uuid: CollectionId) -> RepoResult<Vec<Item>> {
        list_collection_items(self.connection(), collection_uuid)
    }

    fn ranking_page(
        &self,
        collection_uuid: CollectionId,
        query: &RankingQuery,
    ) -> RepoResult<RankingPage> {
        let conn = self.connection();
        load_required_collection(conn, collection_uuid)?;

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE collection_uuid = ?1;",
            [collection_uuid.to_string()],
            |row| row.get(0),
        )?;

        let limit = normalize_page_limit(query.limit);
        let mut stmt = conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE collection_uuid = ?1
             ORDER BY rating DESC, label ASC, uuid ASC
             LIMIT ?2 OFFSET ?3;"
        ))?;
        let mut rows = stmt.query(params![
            collection_uuid.to_string(),
            i64::from(limit),
            i64::from(query.offset),
        ])?;

        let mut items = Vec::new();
        let mut rank = i64::from(query.offset);
        while let Some(row) = rows.next()? {
            rank += 1;
            items.push(RankedItem {
                rank,
                item: parse_item_row(row)?,
            });
        }

        Ok(RankingPage { items, total })
    }
}

pub(crate) fn load_item(conn: &Connection, uuid: ItemId) -> RepoResult<Option<Item>> {
    let mut stmt = conn.prepare(&format!("{ITEM_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([uuid.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_item_row(row)?));
    }
    Ok(None)
}

pub(crate) fn load_required_item(conn: &Connection, uuid: ItemId) -> RepoResult<Item> {
    load_item(conn, uuid)?.ok_or(RepoError::ItemNotFound(uuid))
}

pub(crate) fn list_collection_items(
    conn: &Connection,
    collection_uuid: CollectionId,
) -> RepoResult<Vec<Item>> {
    let mut stmt = conn.prepare(&format!(
        "{ITEM_SELECT_SQL}
         WHERE collection_uuid = ?1
         ORDER BY label ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query([collection_uuid.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_item_row(row)?);
    }
    Ok(items)
}

/// Writes a rating state and vote count onto one item row.
pub(crate) fn write_item_rating(
    conn: &Connection,
    uuid: ItemId,
    state: &RatingState,
    vote_count: i64,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE items
         SET rating = ?2,
             deviation = ?3,
             volatility = ?4,
             vote_count = ?5
         WHERE uuid = ?1;",
        params![
            uuid.to_string(),
            state.rating(),
            state.deviation(),
            state.volatility(),
            vote_count,
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::ItemNotFound(uuid));
    }
    Ok(())
}

fn label_taken(conn: &Connection, collection_uuid: CollectionId, label: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM items WHERE collection_uuid = ?1 AND label = ?2
        );",
        params![collection_uuid.to_string(), label],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let uuid_text: String = row.get("uuid")?;
    let collection_text: String = row.get("collection_uuid")?;
    let rating: f64 = row.get("rating")?;
    let deviation: Option<f64> = row.get("deviation")?;
    let volatility: Option<f64> = row.get("volatility")?;

    let state = match (deviation, volatility) {
        (None, None) => RatingState::Elo { rating },
        (Some(phi), Some(sigma)) => RatingState::Glicko2 {
            mu: rating,
            phi,
            sigma,
        },
        _ => {
            return Err(RepoError::InvalidData(format!(
                "item {uuid_text} has a partial Glicko-2 state"
            )));
        }
    };

    let item = Item {
        uuid: parse_uuid(&uuid_text, "items.uuid")?,
        collection_uuid: parse_uuid(&collection_text, "items.collection_uuid")?,
        label: row.get("label")?,
        state,
        vote_count: row.get("vote_count")?,
        created_at: row.get("created_at")?,
    };
    item.validate()
        .map_err(|err| RepoError::InvalidData(format!("item {uuid_text}: {err}")))?;
    Ok(item)
}
