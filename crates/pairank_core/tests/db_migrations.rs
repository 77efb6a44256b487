use pairank_core::db::migrations::latest_version;
use pairank_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "collections");
    assert_table_exists(&conn, "items");
    assert_table_exists(&conn, "votes");
    assert_index_exists(&conn, "idx_votes_collection_seq");
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let err = conn
        .execute(
            "INSERT INTO items (uuid, collection_uuid, label, rating)
             VALUES ('a', 'missing', 'x.png', 1200.0);",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pairank.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "votes");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn db_errors_describe_the_ledger_and_keep_their_cause() {
    use std::error::Error;

    let newer = DbError::UnsupportedSchemaVersion {
        db_version: 999,
        latest_supported: latest_version(),
    };
    let message = newer.to_string();
    assert!(message.starts_with("ledger schema version 999"));
    assert!(message.contains(&format!("({})", latest_version())));
    assert!(newer.source().is_none());

    let failed = DbError::MigrationFailed {
        version: 3,
        source: rusqlite::Error::InvalidQuery,
    };
    assert!(failed.to_string().starts_with("ledger migration 3 failed"));
    assert!(failed.source().is_some());

    let sqlite = DbError::from(rusqlite::Error::InvalidQuery);
    assert!(sqlite.to_string().starts_with("sqlite: "));
    assert!(sqlite.source().is_some());
}

#[test]
fn upgrading_collections_keeps_default_glicko2_constants() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v2.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(include_str!("../src/db/migrations/0001_init.sql"))
        .unwrap();
    conn.execute_batch(include_str!("../src/db/migrations/0002_ledger_indexes.sql"))
        .unwrap();
    conn.execute_batch(
        "PRAGMA user_version = 2;
         INSERT INTO collections (uuid, name, rating_model, k_factor)
         VALUES ('00000000-0000-0000-0000-000000000001', 'Old', 'glicko2', 16);",
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let (tau, epsilon): (f64, f64) = conn
        .query_row(
            "SELECT glicko2_tau, glicko2_epsilon FROM collections WHERE name = 'Old';",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(tau, 1.0);
    assert!((epsilon - 0.000_001).abs() < 1e-15);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert_schema_object(conn, "table", table_name);
}

fn assert_index_exists(conn: &Connection, index_name: &str) {
    assert_schema_object(conn, "index", index_name);
}

fn assert_schema_object(conn: &Connection, kind: &str, name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            );",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "{kind} {name} does not exist");
}
