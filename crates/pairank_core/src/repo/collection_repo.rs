//! Collection repository contract and SQLite implementation.
//!
//! # Invariants
//! - Collection names are unique; duplicates surface as
//!   [`RepoError::DuplicateCollectionName`] instead of a raw constraint error.
//! - Deleting a collection cascades to its items and votes.
//! - The collection row is the only source of model settings (kind, k-factor,
//!   Glicko-2 constants); changing any of them recomputes every item of the
//!   collection inside the same transaction.

use crate::model::collection::{Collection, CollectionId};
use crate::model::item::ItemId;
use crate::rating::{Glicko2Config, RatingModelKind};
use crate::recompute::ItemRating;
use crate::repo::ledger_repo::recompute_in_tx;
use crate::repo::{parse_uuid, RepoError, RepoResult, SqliteStore};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Item and vote totals of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCounts {
    pub item_count: i64,
    pub vote_count: i64,
}

/// Repository interface for collection persistence.
pub trait CollectionRepository {
    /// Inserts a validated collection and returns the stored record.
    fn create_collection(&self, collection: &Collection) -> RepoResult<Collection>;
    fn get_collection(&self, uuid: CollectionId) -> RepoResult<Option<Collection>>;
    /// Lists collections ordered by name.
    fn list_collections(&self) -> RepoResult<Vec<Collection>>;
    fn rename_collection(&self, uuid: CollectionId, name: &str) -> RepoResult<Collection>;
    /// Deletes the collection with all of its items and votes.
    fn delete_collection(&self, uuid: CollectionId) -> RepoResult<()>;
    fn collection_counts(&self, uuid: CollectionId) -> RepoResult<CollectionCounts>;
    /// Replaces the model settings, then rebuilds every rating with the new
    /// model, atomically.
    fn set_rating_model(
        &self,
        uuid: CollectionId,
        kind: RatingModelKind,
        k_factor: i64,
        glicko2: Glicko2Config,
    ) -> RepoResult<BTreeMap<ItemId, ItemRating>>;
}

const COLLECTION_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    rating_model,
    k_factor,
    glicko2_tau,
    glicko2_epsilon,
    created_at
FROM collections";

impl CollectionRepository for SqliteStore<'_> {
    fn create_collection(&self, collection: &Collection) -> RepoResult<Collection> {
        collection.validate()?;

        let tx = Transaction::new_unchecked(self.connection(), TransactionBehavior::Immediate)?;
        if collection_name_taken(&tx, &collection.name, None)? {
            return Err(RepoError::DuplicateCollectionName(collection.name.clone()));
        }
        tx.execute(
            "INSERT INTO collections (
                uuid,
                name,
                rating_model,
                k_factor,
                glicko2_tau,
                glicko2_epsilon
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                collection.uuid.to_string(),
                collection.name,
                collection.rating_model.as_str(),
                collection.k_factor,
                collection.glicko2.tau,
                collection.glicko2.epsilon,
            ],
        )?;
        let stored = load_required_collection(&tx, collection.uuid)?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_collection(&self, uuid: CollectionId) -> RepoResult<Option<Collection>> {
        load_collection(self.connection(), uuid)
    }

    fn list_collections(&self) -> RepoResult<Vec<Collection>> {
        let mut stmt = self
            .connection()
            .prepare(&format!("{COLLECTION_SELECT_SQL} ORDER BY name ASC, uuid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut collections = Vec::new();
        while let Some(row) = rows.next()? {
            collections.push(parse_collection_row(row)?);
        }
        Ok(collections)
    }

    fn rename_collection(&self, uuid: CollectionId, name: &str) -> RepoResult<Collection> {
        let tx = Transaction::new_unchecked(self.connection(), TransactionBehavior::Immediate)?;
        let mut collection = load_required_collection(&tx, uuid)?;
        collection.name = name.trim().to_string();
        collection.validate()?;
        if collection_name_taken(&tx, &collection.name, Some(uuid))? {
            return Err(RepoError::DuplicateCollectionName(collection.name));
        }
        tx.execute(
            "UPDATE collections SET name = ?2 WHERE uuid = ?1;",
            params![uuid.to_string(), collection.name],
        )?;
        tx.commit()?;
        Ok(collection)
    }

    fn delete_collection(&self, uuid: CollectionId) -> RepoResult<()> {
        let changed = self.connection().execute(
            "DELETE FROM collections WHERE uuid = ?1;",
            [uuid.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::CollectionNotFound(uuid));
        }
        Ok(())
    }

    fn collection_counts(&self, uuid: CollectionId) -> RepoResult<CollectionCounts> {
        let conn = self.connection();
        load_required_collection(conn, uuid)?;
        let item_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE collection_uuid = ?1;",
            [uuid.to_string()],
            |row| row.get(0),
        )?;
        let vote_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM votes WHERE collection_uuid = ?1;",
            [uuid.to_string()],
            |row| row.get(0),
        )?;
        Ok(CollectionCounts {
            item_count,
            vote_count,
        })
    }

    fn set_rating_model(
        &self,
        uuid: CollectionId,
        kind: RatingModelKind,
        k_factor: i64,
        glicko2: Glicko2Config,
    ) -> RepoResult<BTreeMap<ItemId, ItemRating>> {
        let tx = Transaction::new_unchecked(self.connection(), TransactionBehavior::Immediate)?;
        let mut collection = load_required_collection(&tx, uuid)?;
        collection.rating_model = kind;
        collection.k_factor = k_factor;
        collection.glicko2 = glicko2;
        collection.validate()?;

        tx.execute(
            "UPDATE collections
             SET rating_model = ?2, k_factor = ?3, glicko2_tau = ?4, glicko2_epsilon = ?5
             WHERE uuid = ?1;",
            params![
                uuid.to_string(),
                kind.as_str(),
                k_factor,
                glicko2.tau,
                glicko2.epsilon,
            ],
        )?;
        let ratings = recompute_in_tx(&tx, uuid)?;
        tx.commit()?;
        Ok(ratings)
    }
}

pub(crate) fn load_collection(
    conn: &Connection,
    uuid: CollectionId,
) -> RepoResult<Option<Collection>> {
    let mut stmt = conn.prepare(&format!("{COLLECTION_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([uuid.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_collection_row(row)?));
    }
    Ok(None)
}

pub(crate) fn load_required_collection(
    conn: &Connection,
    uuid: CollectionId,
) -> RepoResult<Collection> {
    load_collection(conn, uuid)?.ok_or(RepoError::CollectionNotFound(uuid))
}

fn collection_name_taken(
    conn: &Connection,
    name: &str,
    except: Option<CollectionId>,
) -> RepoResult<bool> {
    let owner: Option<String> = conn
        .query_row(
            "SELECT uuid FROM collections WHERE name = ?1;",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match (owner, except) {
        (None, _) => false,
        (Some(owner), Some(except)) => owner != except.to_string(),
        (Some(_), None) => true,
    })
}

fn parse_collection_row(row: &Row<'_>) -> RepoResult<Collection> {
    let uuid_text: String = row.get("uuid")?;
    let model_text: String = row.get("rating_model")?;
    let rating_model = RatingModelKind::parse(&model_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid rating model `{model_text}` in collections.rating_model"
        ))
    })?;

    let collection = Collection {
        uuid: parse_uuid(&uuid_text, "collections.uuid")?,
        name: row.get("name")?,
        rating_model,
        k_factor: row.get("k_factor")?,
        glicko2: Glicko2Config {
            tau: row.get("glicko2_tau")?,
            epsilon: row.get("glicko2_epsilon")?,
        },
        created_at: row.get("created_at")?,
    };
    collection
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("collection {uuid_text}: {err}")))?;
    Ok(collection)
}
