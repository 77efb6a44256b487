use pairank_core::db::open_db_in_memory;
use pairank_core::{
    Collection, CollectionService, CreateCollectionRequest, Item, RankingService, RatingConfig,
    SqliteStore,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn setup() -> rusqlite::Connection {
    open_db_in_memory().unwrap()
}

fn collection_with_items<'conn>(
    conn: &'conn rusqlite::Connection,
    labels: &[&str],
) -> (Collection, Vec<Item>, RankingService<SqliteStore<'conn>>) {
    let store = SqliteStore::try_new(conn).unwrap();
    let collection = CollectionService::try_new(store, RatingConfig::default())
        .unwrap()
        .create_collection(&CreateCollectionRequest::named("Pairs"))
        .unwrap();
    let ranking = RankingService::try_new(store, RatingConfig::default()).unwrap();
    let items = labels
        .iter()
        .map(|label| ranking.add_item(collection.uuid, label).unwrap())
        .collect();
    (collection, items, ranking)
}

#[test]
fn fewer_than_two_items_yields_no_pair() {
    let conn = setup();
    let (collection, _, ranking) = collection_with_items(&conn, &[]);
    assert_eq!(ranking.next_pair(collection.uuid).unwrap(), None);

    ranking.add_item(collection.uuid, "only.png").unwrap();
    assert_eq!(ranking.next_pair(collection.uuid).unwrap(), None);
}

#[test]
fn first_item_always_has_the_minimum_vote_count() {
    let conn = setup();
    let (collection, items, ranking) =
        collection_with_items(&conn, &["a.png", "b.png", "c.png", "d.png"]);
    ranking
        .apply_vote(items[0].uuid, items[1].uuid, collection.uuid)
        .unwrap();
    ranking
        .apply_vote(items[0].uuid, items[2].uuid, collection.uuid)
        .unwrap();

    for seed in 0..32 {
        let mut rng = StdRng::seed_from_u64(seed);
        let (first, second) = ranking
            .next_pair_with_rng(collection.uuid, &mut rng)
            .unwrap()
            .unwrap();
        assert_eq!(first, items[3].uuid, "seed {seed}");
        assert_ne!(first, second);
    }
}

#[test]
fn seeded_selection_is_reproducible() {
    let conn = setup();
    let (collection, _, ranking) =
        collection_with_items(&conn, &["a.png", "b.png", "c.png", "d.png", "e.png"]);

    let pick = |seed: u64| {
        ranking
            .next_pair_with_rng(collection.uuid, &mut StdRng::seed_from_u64(seed))
            .unwrap()
    };
    assert_eq!(pick(11), pick(11));
    assert!(pick(11).is_some());
}

#[test]
fn pairs_never_leave_the_collection() {
    let conn = setup();
    let (collection, items, ranking) = collection_with_items(&conn, &["a.png", "b.png", "c.png"]);
    let store = SqliteStore::try_new(&conn).unwrap();
    let other = CollectionService::try_new(store, RatingConfig::default())
        .unwrap()
        .create_collection(&CreateCollectionRequest::named("Elsewhere"))
        .unwrap();
    ranking.add_item(other.uuid, "x.png").unwrap();

    let ids: Vec<_> = items.iter().map(|item| item.uuid).collect();
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..20 {
        let (a, b) = ranking
            .next_pair_with_rng(collection.uuid, &mut rng)
            .unwrap()
            .unwrap();
        assert!(ids.contains(&a) && ids.contains(&b));
        ranking.apply_vote(a, b, collection.uuid).unwrap();
    }
}
