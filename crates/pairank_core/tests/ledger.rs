use pairank_core::db::open_db_in_memory;
use pairank_core::{
    Collection, CollectionService, CreateCollectionRequest, Glicko2Config, Item, ItemId,
    LedgerRepository, RankingService, RatingConfig, RatingModelKind, RatingState, ServiceError,
    SqliteStore,
};
use std::collections::BTreeMap;
use uuid::Uuid;

struct Fixture {
    conn: rusqlite::Connection,
}

impl Fixture {
    fn new() -> Self {
        Self {
            conn: open_db_in_memory().unwrap(),
        }
    }

    fn store(&self) -> SqliteStore<'_> {
        SqliteStore::try_new(&self.conn).unwrap()
    }

    fn ranking(&self) -> RankingService<SqliteStore<'_>> {
        RankingService::try_new(self.store(), RatingConfig::default()).unwrap()
    }

    fn collection(&self, name: &str, model: RatingModelKind) -> Collection {
        CollectionService::try_new(self.store(), RatingConfig::default())
            .unwrap()
            .create_collection(&CreateCollectionRequest {
                name: name.to_string(),
                rating_model: Some(model),
                k_factor: None,
            })
            .unwrap()
    }

    fn items(&self, collection: &Collection, labels: &[&str]) -> Vec<Item> {
        let ranking = self.ranking();
        labels
            .iter()
            .map(|label| ranking.add_item(collection.uuid, label).unwrap())
            .collect()
    }

    fn vote_count(&self) -> i64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM votes;", [], |row| row.get(0))
            .unwrap()
    }
}

/// Ratings keyed by label, for comparing collections with the same labels.
fn ratings_by_label(
    ranking: &RankingService<SqliteStore<'_>>,
    collection: &Collection,
) -> BTreeMap<String, (RatingState, i64)> {
    ranking
        .list_items(collection.uuid)
        .unwrap()
        .into_iter()
        .map(|item| (item.label, (item.state, item.vote_count)))
        .collect()
}

const LABELS: [&str; 4] = ["a.png", "b.png", "c.png", "d.png"];
// Pairs of indexes into LABELS, winner first.
const SCRIPT: [(usize, usize); 7] = [(0, 1), (2, 3), (0, 2), (1, 3), (3, 0), (1, 2), (0, 3)];

fn play(
    ranking: &RankingService<SqliteStore<'_>>,
    collection: &Collection,
    items: &[Item],
    script: &[(usize, usize)],
) {
    for (winner, loser) in script {
        ranking
            .apply_vote(items[*winner].uuid, items[*loser].uuid, collection.uuid)
            .unwrap();
    }
}

#[test]
fn first_elo_vote_moves_both_items_by_eight_points() {
    let fx = Fixture::new();
    let collection = fx.collection("Elo", RatingModelKind::Elo);
    let items = fx.items(&collection, &["a.png", "b.png"]);
    let ranking = fx.ranking();

    let (winner, loser) = ranking
        .apply_vote(items[0].uuid, items[1].uuid, collection.uuid)
        .unwrap();
    assert_eq!(winner, RatingState::Elo { rating: 1208.0 });
    assert_eq!(loser, RatingState::Elo { rating: 1192.0 });

    let stored = ranking.get_item(items[0].uuid).unwrap();
    assert_eq!(stored.state, winner);
    assert_eq!(stored.vote_count, 1);
}

#[test]
fn sequence_numbers_increase_and_are_not_reused() {
    let fx = Fixture::new();
    let collection = fx.collection("Seq", RatingModelKind::Elo);
    let items = fx.items(&collection, &["a.png", "b.png"]);
    let ranking = fx.ranking();

    let first = ranking
        .record_vote(items[0].uuid, items[1].uuid, collection.uuid)
        .unwrap();
    let second = ranking
        .record_vote(items[1].uuid, items[0].uuid, collection.uuid)
        .unwrap();
    assert!(second.vote.seq > first.vote.seq);

    ranking
        .delete_votes(collection.uuid, &[second.vote.seq])
        .unwrap();
    let third = ranking
        .record_vote(items[1].uuid, items[0].uuid, collection.uuid)
        .unwrap();
    assert!(third.vote.seq > second.vote.seq);
}

#[test]
fn incremental_path_matches_full_recompute_for_both_models() {
    for model in [RatingModelKind::Elo, RatingModelKind::Glicko2] {
        let fx = Fixture::new();
        let collection = fx.collection("Replay", model);
        let items = fx.items(&collection, &LABELS);
        let ranking = fx.ranking();
        play(&ranking, &collection, &items, &SCRIPT);

        let incremental = ratings_by_label(&ranking, &collection);
        let first = ranking.recompute(collection.uuid).unwrap();
        let second = ranking.recompute(collection.uuid).unwrap();
        assert_eq!(first, second);
        assert_eq!(ratings_by_label(&ranking, &collection), incremental);

        let report = ranking.verify(collection.uuid).unwrap();
        assert!(report.is_consistent(), "{model:?}: {:?}", report.violations);
        assert_eq!(report.votes_replayed, SCRIPT.len());
        assert_eq!(report.items_checked, LABELS.len());
    }
}

#[test]
fn deleting_a_vote_equals_never_recording_it() {
    for model in [RatingModelKind::Elo, RatingModelKind::Glicko2] {
        let fx = Fixture::new();
        let ranking = fx.ranking();

        let edited = fx.collection("Edited", model);
        let edited_items = fx.items(&edited, &LABELS);
        play(&ranking, &edited, &edited_items, &SCRIPT);

        let votes = fx.store().list_votes(edited.uuid).unwrap();
        ranking.delete_votes(edited.uuid, &[votes[2].seq]).unwrap();

        let clean = fx.collection("Clean", model);
        let clean_items = fx.items(&clean, &LABELS);
        let mut script = SCRIPT.to_vec();
        script.remove(2);
        play(&ranking, &clean, &clean_items, &script);

        assert_eq!(
            ratings_by_label(&ranking, &edited),
            ratings_by_label(&ranking, &clean)
        );
        assert!(ranking.verify(edited.uuid).unwrap().is_consistent());
    }
}

#[test]
fn deleting_an_item_equals_never_adding_it() {
    let fx = Fixture::new();
    let ranking = fx.ranking();

    let edited = fx.collection("Edited", RatingModelKind::Elo);
    let edited_items = fx.items(&edited, &LABELS);
    play(&ranking, &edited, &edited_items, &SCRIPT);
    let deleted = ranking.delete_item(edited_items[3].uuid).unwrap();
    assert_eq!(deleted.item.label, "d.png");
    let referencing = SCRIPT.iter().filter(|(w, l)| *w == 3 || *l == 3).count();
    assert_eq!(deleted.removed_votes, referencing as i64);
    assert_eq!(deleted.ratings.len(), 3);

    let clean = fx.collection("Clean", RatingModelKind::Elo);
    let clean_items = fx.items(&clean, &LABELS[..3]);
    let script: Vec<(usize, usize)> = SCRIPT
        .iter()
        .copied()
        .filter(|(w, l)| *w != 3 && *l != 3)
        .collect();
    play(&ranking, &clean, &clean_items, &script);

    assert_eq!(
        ratings_by_label(&ranking, &edited),
        ratings_by_label(&ranking, &clean)
    );
    assert!(matches!(
        ranking.get_item(edited_items[3].uuid),
        Err(ServiceError::ItemNotFound(_))
    ));
}

#[test]
fn invalid_votes_leave_ledger_and_ratings_unchanged() {
    let fx = Fixture::new();
    let collection = fx.collection("Main", RatingModelKind::Elo);
    let other = fx.collection("Other", RatingModelKind::Elo);
    let items = fx.items(&collection, &["a.png", "b.png"]);
    let foreign = fx.items(&other, &["z.png"]);
    let ranking = fx.ranking();
    ranking
        .apply_vote(items[0].uuid, items[1].uuid, collection.uuid)
        .unwrap();
    let before = ratings_by_label(&ranking, &collection);

    assert!(matches!(
        ranking.apply_vote(items[0].uuid, items[0].uuid, collection.uuid),
        Err(ServiceError::SelfComparison(_))
    ));
    assert!(matches!(
        ranking.apply_vote(items[0].uuid, foreign[0].uuid, collection.uuid),
        Err(ServiceError::ItemNotInCollection { item_uuid, .. }) if item_uuid == foreign[0].uuid
    ));
    let missing: ItemId = Uuid::new_v4();
    assert!(matches!(
        ranking.apply_vote(items[0].uuid, missing, collection.uuid),
        Err(ServiceError::ItemNotFound(id)) if id == missing
    ));

    assert_eq!(fx.vote_count(), 1);
    assert_eq!(ratings_by_label(&ranking, &collection), before);
}

#[test]
fn deleting_unknown_vote_rolls_back_the_whole_batch() {
    let fx = Fixture::new();
    let collection = fx.collection("Batch", RatingModelKind::Elo);
    let items = fx.items(&collection, &LABELS);
    let ranking = fx.ranking();
    play(&ranking, &collection, &items, &SCRIPT);
    let before = ratings_by_label(&ranking, &collection);
    let votes = fx.store().list_votes(collection.uuid).unwrap();

    let err = ranking
        .delete_votes(collection.uuid, &[votes[0].seq, 9_999])
        .unwrap_err();
    assert!(matches!(err, ServiceError::VoteNotFound(9_999)));
    assert_eq!(fx.vote_count(), SCRIPT.len() as i64);
    assert_eq!(ratings_by_label(&ranking, &collection), before);
}

#[test]
fn votes_of_another_collection_cannot_be_deleted() {
    let fx = Fixture::new();
    let first = fx.collection("First", RatingModelKind::Elo);
    let second = fx.collection("Second", RatingModelKind::Elo);
    let items = fx.items(&first, &["a.png", "b.png"]);
    let ranking = fx.ranking();
    let recorded = ranking
        .record_vote(items[0].uuid, items[1].uuid, first.uuid)
        .unwrap();

    let err = ranking
        .delete_votes(second.uuid, &[recorded.vote.seq])
        .unwrap_err();
    assert!(matches!(err, ServiceError::VoteNotFound(_)));
    assert_eq!(fx.vote_count(), 1);
}

#[test]
fn verify_reports_tampered_ratings_and_recompute_repairs_them() {
    let fx = Fixture::new();
    let collection = fx.collection("Audit", RatingModelKind::Elo);
    let items = fx.items(&collection, &LABELS);
    let ranking = fx.ranking();
    play(&ranking, &collection, &items, &SCRIPT);

    fx.conn
        .execute(
            "UPDATE items SET rating = 2000.0 WHERE uuid = ?1;",
            [items[1].uuid.to_string()],
        )
        .unwrap();

    let report = ranking.verify(collection.uuid).unwrap();
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].item_uuid, items[1].uuid);
    assert_eq!(
        report.violations[0].stored.state,
        RatingState::Elo { rating: 2000.0 }
    );

    ranking.recompute(collection.uuid).unwrap();
    assert!(ranking.verify(collection.uuid).unwrap().is_consistent());
}

#[test]
fn votes_are_rated_with_the_settings_stored_on_the_collection() {
    let fx = Fixture::new();
    let collection = fx.collection("Settings", RatingModelKind::Elo);
    let items = fx.items(&collection, &["a.png", "b.png", "c.png"]);
    // Created before the k-factor change below.
    let ranking = fx.ranking();

    CollectionService::try_new(fx.store(), RatingConfig::default())
        .unwrap()
        .set_rating_model(collection.uuid, RatingModelKind::Elo, Some(32), None)
        .unwrap();

    let (winner, loser) = ranking
        .apply_vote(items[0].uuid, items[1].uuid, collection.uuid)
        .unwrap();
    assert_eq!(winner, RatingState::Elo { rating: 1216.0 });
    assert_eq!(loser, RatingState::Elo { rating: 1184.0 });

    let recorded = fx
        .store()
        .record_vote(collection.uuid, items[2].uuid, items[1].uuid)
        .unwrap();
    assert_eq!(recorded.loser.vote_count, 2);
    assert!(ranking.verify(collection.uuid).unwrap().is_consistent());
    assert_eq!(fx.vote_count(), 2);
}

#[test]
fn reopening_with_other_glicko2_constants_keeps_collection_settings() {
    let fx = Fixture::new();
    let reference = fx.collection("Reference", RatingModelKind::Glicko2);
    let reference_items = fx.items(&reference, &LABELS);
    play(&fx.ranking(), &reference, &reference_items, &SCRIPT);

    let reopened = fx.collection("Reopened", RatingModelKind::Glicko2);
    let reopened_items = fx.items(&reopened, &LABELS);
    play(&fx.ranking(), &reopened, &reopened_items, &SCRIPT[..4]);

    let other_tau = RatingConfig {
        glicko2: Glicko2Config {
            tau: 0.3,
            ..Glicko2Config::default()
        },
        ..RatingConfig::default()
    };
    let ranking = RankingService::try_new(fx.store(), other_tau).unwrap();
    assert!(ranking.verify(reopened.uuid).unwrap().is_consistent());

    play(&ranking, &reopened, &reopened_items, &SCRIPT[4..]);
    assert!(ranking.verify(reopened.uuid).unwrap().is_consistent());
    assert_eq!(
        ratings_by_label(&ranking, &reopened),
        ratings_by_label(&ranking, &reference)
    );

    let collections = CollectionService::try_new(fx.store(), other_tau).unwrap();
    assert_eq!(
        collections.get_collection(reopened.uuid).unwrap().glicko2,
        Glicko2Config::default()
    );
}

#[test]
fn changing_glicko2_constants_recomputes_the_collection() {
    let fx = Fixture::new();
    let collection = fx.collection("Tau", RatingModelKind::Glicko2);
    let items = fx.items(&collection, &LABELS);
    let ranking = fx.ranking();
    play(&ranking, &collection, &items, &SCRIPT);
    let before = ratings_by_label(&ranking, &collection);

    let tau = Glicko2Config {
        tau: 0.3,
        ..Glicko2Config::default()
    };
    let collections = CollectionService::try_new(fx.store(), RatingConfig::default()).unwrap();
    collections
        .set_rating_model(collection.uuid, RatingModelKind::Glicko2, None, Some(tau))
        .unwrap();

    assert_eq!(collections.get_collection(collection.uuid).unwrap().glicko2, tau);
    assert!(ranking.verify(collection.uuid).unwrap().is_consistent());
    assert_ne!(ratings_by_label(&ranking, &collection), before);

    let invalid = Glicko2Config {
        epsilon: 0.0,
        ..Glicko2Config::default()
    };
    assert!(matches!(
        collections.set_rating_model(collection.uuid, RatingModelKind::Glicko2, None, Some(invalid)),
        Err(ServiceError::InvalidConfig(_))
    ));
    assert_eq!(collections.get_collection(collection.uuid).unwrap().glicko2, tau);
}

#[test]
fn glicko2_deviation_shrinks_as_votes_accumulate() {
    let fx = Fixture::new();
    let collection = fx.collection("Glicko", RatingModelKind::Glicko2);
    let items = fx.items(&collection, &["a.png", "b.png", "c.png"]);
    let ranking = fx.ranking();

    let mut last_phi = 350.0;
    for round in 0..6 {
        let (winner, loser) = if round % 3 == 0 { (1, 0) } else { (0, 1) };
        ranking
            .apply_vote(items[winner].uuid, items[loser].uuid, collection.uuid)
            .unwrap();
        let phi = ranking
            .get_item(items[0].uuid)
            .unwrap()
            .state
            .deviation()
            .unwrap();
        assert!(phi < last_phi, "round {round}: {phi} >= {last_phi}");
        last_phi = phi;
    }
}
