//! Repository contracts and SQLite persistence.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for collections, items
//!   and the vote ledger.
//! - Keep SQL and transaction boundaries inside the persistence layer.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Every multi-row mutation runs in one `BEGIN IMMEDIATE` transaction; an
//!   error anywhere rolls the whole mutation back.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::collection::{Collection, CollectionId, CollectionValidationError};
use crate::model::item::{ItemId, ItemValidationError};
use crate::model::vote::VoteId;
use crate::rating::RatingModel;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod collection_repo;
pub mod item_repo;
pub mod ledger_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidCollection(CollectionValidationError),
    InvalidItem(ItemValidationError),
    CollectionNotFound(CollectionId),
    ItemNotFound(ItemId),
    VoteNotFound(VoteId),
    /// Item exists but belongs to another collection.
    ItemNotInCollection {
        item_uuid: ItemId,
        collection_uuid: CollectionId,
    },
    /// An item cannot be compared with itself.
    SelfComparison(ItemId),
    DuplicateCollectionName(String),
    DuplicateItemLabel {
        collection_uuid: CollectionId,
        label: String,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidCollection(err) => write!(f, "{err}"),
            Self::InvalidItem(err) => write!(f, "{err}"),
            Self::CollectionNotFound(id) => write!(f, "collection not found: {id}"),
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::VoteNotFound(seq) => write!(f, "vote not found: {seq}"),
            Self::ItemNotInCollection {
                item_uuid,
                collection_uuid,
            } => write!(
                f,
                "item {item_uuid} does not belong to collection {collection_uuid}"
            ),
            Self::SelfComparison(id) => write!(f, "item {id} cannot be compared with itself"),
            Self::DuplicateCollectionName(name) => {
                write!(f, "collection name already in use: `{name}`")
            }
            Self::DuplicateItemLabel {
                collection_uuid,
                label,
            } => write!(
                f,
                "item label `{label}` already exists in collection {collection_uuid}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidCollection(err) => Some(err),
            Self::InvalidItem(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<CollectionValidationError> for RepoError {
    fn from(value: CollectionValidationError) -> Self {
        Self::InvalidCollection(value)
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::InvalidItem(value)
    }
}

/// SQLite-backed store implementing every repository contract.
///
/// Cheap to copy; all copies share the borrowed connection.
#[derive(Debug, Clone, Copy)]
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    /// Creates the store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }
}

const REQUIRED_TABLES: [&str; 3] = ["collections", "items", "votes"];

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

/// Builds the rating model from a stored collection row.
///
/// Rows are validated on load, so a failure here means the row changed under
/// the reader.
pub(crate) fn collection_model(collection: &Collection) -> RepoResult<Box<dyn RatingModel>> {
    collection
        .model()
        .map_err(|err| RepoError::InvalidData(format!("collection {}: {err}", collection.uuid)))
}

const PAGE_DEFAULT_LIMIT: u32 = 50;
const PAGE_LIMIT_MAX: u32 = 500;

/// Normalizes a page size for ranking and history pages.
///
/// `None` and `Some(0)` fall back to the default page size; larger requests
/// are capped.
pub fn normalize_page_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => PAGE_DEFAULT_LIMIT,
        Some(value) if value > PAGE_LIMIT_MAX => PAGE_LIMIT_MAX,
        Some(value) => value,
    }
}
