mod helpers;

use ragledger::db;
use ragledger::db::migrations::{
    get_embedding_model, get_schema_version, run_migrations, CURRENT_SCHEMA_VERSION,
};

#[test]
fn fresh_db_migrates_to_current_version() {
    let conn = helpers::test_db();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn migration_records_embedding_model() {
    let conn = helpers::test_db();
    let model = get_embedding_model(&conn).unwrap();
    assert_eq!(model, Some("text-embedding-3-small".to_string()));

    let dims: String = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'embedding_dimensions'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(dims, "1536");
}

#[test]
fn migrations_are_idempotent() {
    let conn = helpers::test_db();
    // Running again should be a no-op
    run_migrations(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn manual_v1_db_upgrades_correctly() {
    // Simulate a v1 database that hasn't been migrated
    db::load_sqlite_vec();
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();

    assert_eq!(get_schema_version(&conn).unwrap(), 1);
    assert!(get_embedding_model(&conn).unwrap().is_none());

    // A v1 row written before the upgrade gets the column defaults.
    conn.execute(
        "INSERT INTO queries (query_id, user_id, query_text, timestamp) VALUES ('q1', ?1, 'What is AI?', '2025-12-11T10:00:00.000000Z')",
        ["0".repeat(64)],
    )
    .unwrap();

    run_migrations(&conn).unwrap();

    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    assert!(get_embedding_model(&conn).unwrap().is_some());

    let mode: String = conn
        .query_row("SELECT query_mode FROM queries WHERE query_id = 'q1'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(mode, "book-wide");
}

#[test]
fn reopening_a_file_database_keeps_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("ledger.db");

    {
        let conn = db::open_database(&path).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    let conn = db::open_database(&path).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
}
