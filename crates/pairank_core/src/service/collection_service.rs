//! Collection use-case service.
//!
//! # Responsibility
//! - Create, rename, list and delete collections.
//! - Switch a collection's rating model and rebuild its ratings.
//!
//! # Invariants
//! - Names are trimmed and non-blank before reaching storage.
//! - A model switch never leaves ratings computed by the previous model.
//! - New collections copy the configured Glicko-2 constants; afterwards only
//!   [`CollectionService::set_rating_model`] changes them.

use crate::config::RatingConfig;
use crate::model::collection::{Collection, CollectionId};
use crate::model::item::ItemId;
use crate::rating::{build_model, Glicko2Config, RatingModelKind, RatingState};
use crate::repo::collection_repo::CollectionRepository;
use crate::service::{ServiceError, ServiceResult};
use log::info;
use std::collections::BTreeMap;
use std::time::Instant;

/// Input for [`CollectionService::create_collection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateCollectionRequest {
    pub name: String,
    /// Falls back to the configured default model.
    pub rating_model: Option<RatingModelKind>,
    /// Falls back to the configured default k-factor.
    pub k_factor: Option<i64>,
}

impl CreateCollectionRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Collection service facade.
pub struct CollectionService<R: CollectionRepository> {
    repo: R,
    config: RatingConfig,
}

impl<R: CollectionRepository> CollectionService<R> {
    /// Creates the service after validating `config`.
    pub fn try_new(repo: R, config: RatingConfig) -> ServiceResult<Self> {
        config.validate()?;
        Ok(Self { repo, config })
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    pub fn create_collection(&self, request: &CreateCollectionRequest) -> ServiceResult<Collection> {
        let name = normalize_name(&request.name)?;
        let kind = request.rating_model.unwrap_or(self.config.model);
        let k_factor = request.k_factor.unwrap_or(self.config.k_factor);
        let collection = Collection::new(name, kind)
            .with_k_factor(k_factor)
            .with_glicko2(self.config.glicko2);
        collection.model()?;

        let stored = self.repo.create_collection(&collection)?;
        info!(
            "event=collection_create module=service status=ok collection={} model={} k_factor={}",
            stored.uuid,
            kind.as_str(),
            k_factor
        );
        Ok(stored)
    }

    pub fn get_collection(&self, uuid: CollectionId) -> ServiceResult<Collection> {
        self.repo
            .get_collection(uuid)?
            .ok_or(ServiceError::CollectionNotFound(uuid))
    }

    /// Looks a collection up by its exact (trimmed) name.
    pub fn find_by_name(&self, name: &str) -> ServiceResult<Option<Collection>> {
        let name = name.trim();
        Ok(self
            .repo
            .list_collections()?
            .into_iter()
            .find(|collection| collection.name == name))
    }

    pub fn list_collections(&self) -> ServiceResult<Vec<Collection>> {
        self.repo.list_collections().map_err(Into::into)
    }

    pub fn rename_collection(&self, uuid: CollectionId, name: &str) -> ServiceResult<Collection> {
        let name = normalize_name(name)?;
        self.repo
            .rename_collection(uuid, name.as_str())
            .map_err(Into::into)
    }

    /// Deletes a collection with all of its items and votes.
    pub fn delete_collection(&self, uuid: CollectionId) -> ServiceResult<()> {
        self.repo.delete_collection(uuid)?;
        info!("event=collection_delete module=service status=ok collection={uuid}");
        Ok(())
    }

    /// Switches the rating model settings and rebuilds every rating from the
    /// ledger.
    ///
    /// `k_factor` and `glicko2` keep the collection's current values when
    /// `None`.
    pub fn set_rating_model(
        &self,
        uuid: CollectionId,
        kind: RatingModelKind,
        k_factor: Option<i64>,
        glicko2: Option<Glicko2Config>,
    ) -> ServiceResult<BTreeMap<ItemId, RatingState>> {
        let started_at = Instant::now();
        let current = self.get_collection(uuid)?;
        let k_factor = k_factor.unwrap_or(current.k_factor);
        let glicko2 = glicko2.unwrap_or(current.glicko2);
        build_model(kind, k_factor, glicko2)?;

        let ratings = self
            .repo
            .set_rating_model(uuid, kind, k_factor, glicko2)?;
        info!(
            "event=collection_set_model module=service status=ok collection={} from={} to={} items={} duration_ms={}",
            uuid,
            current.rating_model.as_str(),
            kind.as_str(),
            ratings.len(),
            started_at.elapsed().as_millis()
        );
        Ok(ratings
            .into_iter()
            .map(|(item_uuid, rating)| (item_uuid, rating.state))
            .collect())
    }
}

fn normalize_name(value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(
            "collection name must not be blank".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
