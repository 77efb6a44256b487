//! Ledger database bootstrap.
//!
//! # Schema
//! - `collections`: one row per ranked collection, carrying every rating
//!   model setting (kind, k-factor, Glicko-2 `tau`/`epsilon`).
//! - `items`: the materialized rating view. A NULL `deviation`/`volatility`
//!   pair marks an ELO state.
//! - `votes`: the append-only ledger; `seq` is `AUTOINCREMENT`, so replay
//!   order survives deletions.
//!
//! # Invariants
//! - `PRAGMA user_version` equals the last applied migration.
//! - Callers only see connections whose migrations all succeeded.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or migrating a ledger database.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A registered migration failed; nothing from the batch was applied.
    MigrationFailed {
        version: u32,
        source: rusqlite::Error,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "ledger schema version {db_version} is newer than this build supports ({latest_supported})"
            ),
            Self::MigrationFailed { version, source } => {
                write!(f, "ledger migration {version} failed: {source}")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::MigrationFailed { source: err, .. } => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
