//! Core engine for pairwise media ranking.
//!
//! Items of a collection are compared two at a time; every vote is appended
//! to a per-collection ledger and ratings are a materialized view that can
//! always be rebuilt by replaying that ledger.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod rating;
pub mod recompute;
pub mod reliability;
pub mod repo;
pub mod selection;
pub mod service;

pub use config::RatingConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::collection::{Collection, CollectionId};
pub use model::item::{Item, ItemId};
pub use model::vote::{Vote, VoteHistoryEntry, VoteId};
pub use rating::{
    build_model, Glicko2Config, Outcome, RatingConfigError, RatingModel, RatingModelKind,
    RatingState,
};
pub use recompute::{ConsistencyViolation, ItemRating};
pub use reliability::{calculate_reliability, calculate_required_votes};
pub use repo::collection_repo::{CollectionCounts, CollectionRepository};
pub use repo::item_repo::{ItemRepository, RankedItem, RankingPage, RankingQuery};
pub use repo::ledger_repo::{
    DeletedItem, HistoryOrder, LedgerRepository, LedgerSnapshot, RecordedVote, VoteHistoryPage,
    VoteHistoryQuery,
};
pub use repo::{RepoError, RepoResult, SqliteStore};
pub use selection::SelectionConfig;
pub use service::collection_service::{CollectionService, CreateCollectionRequest};
pub use service::ranking_service::{CollectionStats, ConsistencyReport, RankingService};
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
