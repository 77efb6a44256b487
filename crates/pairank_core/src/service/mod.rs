//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Resolve each collection's rating model from its persisted settings.
//! - Keep CLI layers decoupled from storage details.

use crate::model::collection::CollectionId;
use crate::model::item::ItemId;
use crate::model::vote::VoteId;
use crate::rating::RatingConfigError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod collection_service;
pub mod ranking_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from collection and ranking use cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Request value rejected before touching storage.
    InvalidInput(String),
    /// Rating configuration cannot build a model.
    InvalidConfig(RatingConfigError),
    CollectionNotFound(CollectionId),
    ItemNotFound(ItemId),
    VoteNotFound(VoteId),
    ItemNotInCollection {
        item_uuid: ItemId,
        collection_uuid: CollectionId,
    },
    SelfComparison(ItemId),
    DuplicateCollectionName(String),
    DuplicateItemLabel {
        collection_uuid: CollectionId,
        label: String,
    },
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::InvalidConfig(err) => write!(f, "invalid rating configuration: {err}"),
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
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidConfig(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::InvalidCollection(err) => Self::InvalidInput(err.to_string()),
            RepoError::InvalidItem(err) => Self::InvalidInput(err.to_string()),
            RepoError::CollectionNotFound(id) => Self::CollectionNotFound(id),
            RepoError::ItemNotFound(id) => Self::ItemNotFound(id),
            RepoError::VoteNotFound(seq) => Self::VoteNotFound(seq),
            RepoError::ItemNotInCollection {
                item_uuid,
                collection_uuid,
            } => Self::ItemNotInCollection {
                item_uuid,
                collection_uuid,
            },
            RepoError::SelfComparison(id) => Self::SelfComparison(id),
            RepoError::DuplicateCollectionName(name) => Self::DuplicateCollectionName(name),
            RepoError::DuplicateItemLabel {
                collection_uuid,
                label,
            } => Self::DuplicateItemLabel {
                collection_uuid,
                label,
            },
            other => Self::Repo(other),
        }
    }
}

impl From<RatingConfigError> for ServiceError {
    fn from(value: RatingConfigError) -> Self {
        Self::InvalidConfig(value)
    }
}
