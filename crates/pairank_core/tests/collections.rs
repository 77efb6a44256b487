use pairank_core::db::open_db_in_memory;
use pairank_core::{
    CollectionRepository, CollectionService, CreateCollectionRequest, Glicko2Config,
    RankingService, RatingConfig, RatingModelKind, RatingState, RepoError, ServiceError,
    SqliteStore,
};
use uuid::Uuid;

fn setup() -> rusqlite::Connection {
    open_db_in_memory().unwrap()
}

fn services(
    conn: &rusqlite::Connection,
) -> (
    CollectionService<SqliteStore<'_>>,
    RankingService<SqliteStore<'_>>,
) {
    let store = SqliteStore::try_new(conn).unwrap();
    (
        CollectionService::try_new(store, RatingConfig::default()).unwrap(),
        RankingService::try_new(store, RatingConfig::default()).unwrap(),
    )
}

#[test]
fn create_uses_configured_defaults_and_trims_name() {
    let conn = setup();
    let (collections, _) = services(&conn);

    let created = collections
        .create_collection(&CreateCollectionRequest::named("  Wallpapers  "))
        .unwrap();
    assert_eq!(created.name, "Wallpapers");
    assert_eq!(created.rating_model, RatingModelKind::Elo);
    assert_eq!(created.k_factor, 16);
    assert!(created.created_at > 0);

    let loaded = collections.get_collection(created.uuid).unwrap();
    assert_eq!(loaded, created);
}

#[test]
fn create_persists_configured_glicko2_constants() {
    let conn = setup();
    let store = SqliteStore::try_new(&conn).unwrap();
    let glicko2 = Glicko2Config {
        tau: 0.5,
        epsilon: 0.000_01,
    };
    let collections = CollectionService::try_new(
        store,
        RatingConfig {
            model: RatingModelKind::Glicko2,
            glicko2,
            ..RatingConfig::default()
        },
    )
    .unwrap();

    let created = collections
        .create_collection(&CreateCollectionRequest::named("Clips"))
        .unwrap();
    assert_eq!(created.glicko2, glicko2);

    // Another configuration reads the stored constants back unchanged.
    let (defaults, _) = services(&conn);
    assert_eq!(defaults.get_collection(created.uuid).unwrap().glicko2, glicko2);
}

#[test]
fn duplicate_and_blank_names_are_rejected() {
    let conn = setup();
    let (collections, _) = services(&conn);
    collections
        .create_collection(&CreateCollectionRequest::named("Albums"))
        .unwrap();

    let duplicate = collections
        .create_collection(&CreateCollectionRequest::named("Albums "))
        .unwrap_err();
    assert!(matches!(duplicate, ServiceError::DuplicateCollectionName(name) if name == "Albums"));

    let blank = collections
        .create_collection(&CreateCollectionRequest::named("   "))
        .unwrap_err();
    assert!(matches!(blank, ServiceError::InvalidInput(_)));
}

#[test]
fn non_positive_k_factor_is_rejected_before_storage() {
    let conn = setup();
    let (collections, _) = services(&conn);

    let err = collections
        .create_collection(&CreateCollectionRequest {
            name: "Bad".to_string(),
            rating_model: Some(RatingModelKind::Elo),
            k_factor: Some(0),
        })
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidConfig(_)));
    assert!(collections.list_collections().unwrap().is_empty());
}

#[test]
fn list_is_ordered_by_name_and_rename_keeps_uniqueness() {
    let conn = setup();
    let (collections, _) = services(&conn);
    let zoo = collections
        .create_collection(&CreateCollectionRequest::named("Zoo"))
        .unwrap();
    collections
        .create_collection(&CreateCollectionRequest::named("Art"))
        .unwrap();

    let names: Vec<String> = collections
        .list_collections()
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Art", "Zoo"]);

    let err = collections.rename_collection(zoo.uuid, "Art").unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateCollectionName(_)));

    let renamed = collections.rename_collection(zoo.uuid, "Animals").unwrap();
    assert_eq!(renamed.name, "Animals");
    assert_eq!(
        collections.find_by_name("Animals").unwrap().map(|c| c.uuid),
        Some(zoo.uuid)
    );

    // Renaming to its own name is not a conflict.
    collections.rename_collection(zoo.uuid, "Animals").unwrap();
}

#[test]
fn delete_cascades_to_items_and_votes() {
    let conn = setup();
    let (collections, ranking) = services(&conn);
    let collection = collections
        .create_collection(&CreateCollectionRequest::named("Temp"))
        .unwrap();
    let a = ranking.add_item(collection.uuid, "a.png").unwrap();
    let b = ranking.add_item(collection.uuid, "b.png").unwrap();
    ranking.apply_vote(a.uuid, b.uuid, collection.uuid).unwrap();

    collections.delete_collection(collection.uuid).unwrap();

    let items: i64 = conn
        .query_row("SELECT COUNT(*) FROM items;", [], |row| row.get(0))
        .unwrap();
    let votes: i64 = conn
        .query_row("SELECT COUNT(*) FROM votes;", [], |row| row.get(0))
        .unwrap();
    assert_eq!((items, votes), (0, 0));

    let err = collections.delete_collection(collection.uuid).unwrap_err();
    assert!(matches!(err, ServiceError::CollectionNotFound(id) if id == collection.uuid));
}

#[test]
fn unknown_collection_is_reported_by_repository_and_service() {
    let conn = setup();
    let store = SqliteStore::try_new(&conn).unwrap();
    let missing = Uuid::new_v4();

    assert!(matches!(
        store.collection_counts(missing),
        Err(RepoError::CollectionNotFound(id)) if id == missing
    ));
    let (collections, ranking) = services(&conn);
    assert!(matches!(
        collections.get_collection(missing),
        Err(ServiceError::CollectionNotFound(_))
    ));
    assert!(matches!(
        ranking.add_item(missing, "x.png"),
        Err(ServiceError::CollectionNotFound(_))
    ));
}

#[test]
fn switching_model_recomputes_every_item() {
    let conn = setup();
    let (collections, ranking) = services(&conn);
    let collection = collections
        .create_collection(&CreateCollectionRequest::named("Switch"))
        .unwrap();
    let a = ranking.add_item(collection.uuid, "a.png").unwrap();
    let b = ranking.add_item(collection.uuid, "b.png").unwrap();
    ranking.apply_vote(a.uuid, b.uuid, collection.uuid).unwrap();

    let ratings = collections
        .set_rating_model(collection.uuid, RatingModelKind::Glicko2, None, None)
        .unwrap();
    assert_eq!(ratings.len(), 2);
    assert!(matches!(ratings[&a.uuid], RatingState::Glicko2 { mu, .. } if mu > 1500.0));
    assert!(matches!(ratings[&b.uuid], RatingState::Glicko2 { mu, .. } if mu < 1500.0));

    let stored = collections.get_collection(collection.uuid).unwrap();
    assert_eq!(stored.rating_model, RatingModelKind::Glicko2);
    assert_eq!(stored.k_factor, 16);
    assert!(ranking.verify(collection.uuid).unwrap().is_consistent());

    // New items start from the new model's initial state.
    let c = ranking.add_item(collection.uuid, "c.png").unwrap();
    assert_eq!(
        c.state,
        RatingState::Glicko2 {
            mu: 1500.0,
            phi: 350.0,
            sigma: 0.06
        }
    );

    // Back to ELO with a different k-factor.
    let ratings = collections
        .set_rating_model(collection.uuid, RatingModelKind::Elo, Some(32), None)
        .unwrap();
    assert_eq!(ratings[&a.uuid], RatingState::Elo { rating: 1216.0 });
    assert_eq!(ratings[&b.uuid], RatingState::Elo { rating: 1184.0 });
    assert_eq!(ratings[&c.uuid], RatingState::Elo { rating: 1200.0 });
}
