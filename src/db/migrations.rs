//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`]. Each step and its
//! version bump commit together, so an interrupted upgrade resumes cleanly.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::schema::EMBEDDING_DIMENSIONS;

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Embedding model recorded by the v2 migration when none is stored yet.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

/// Get the stored embedding model identifier, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
        [],
        |row| row.get::<_, String>(0),
    ) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Set the stored embedding model identifier.
pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(())
}

/// Run any pending forward-only migrations.
///
/// Each step takes the write lock (`BEGIN IMMEDIATE`) and re-reads the
/// version inside it, so when several connections open a fresh database at
/// once exactly one applies each step and the rest see it done.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, latest = CURRENT_SCHEMA_VERSION, "checking migrations");
    if version >= CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    loop {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let version = get_schema_version(&tx)?;
        if version >= CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                return Ok(());
            }
        }
        update_schema_version(&tx, next)?;
        tx.commit()?;
    }
}

/// Migration v1 → v2: query mode, refusal tracking, embedding model metadata.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        ALTER TABLE queries ADD COLUMN query_mode TEXT NOT NULL DEFAULT 'book-wide'
            CHECK(query_mode IN ('book-wide','selected-text'));
        ALTER TABLE query_responses ADD COLUMN refusal_triggered INTEGER NOT NULL DEFAULT 0
            CHECK(refusal_triggered IN (0, 1));
        ALTER TABLE query_responses ADD COLUMN refusal_reason TEXT
            CHECK(refusal_reason IS NULL OR length(refusal_reason) <= 500);
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [DEFAULT_EMBEDDING_MODEL],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_dimensions', ?1)",
        [EMBEDDING_DIMENSIONS.to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    fn column_names(conn: &Connection, table: &str) -> Vec<String> {
        conn.prepare(&format!("PRAGMA table_info({table})"))
            .unwrap()
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn get_schema_version_returns_1_on_fresh_db() {
        let conn = test_db();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn run_migrations_upgrades_to_current() {
        let conn = test_db();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn migration_v1_to_v2_adds_columns_and_model() {
        let conn = test_db();
        assert!(get_embedding_model(&conn).unwrap().is_none());
        assert!(!column_names(&conn, "queries").contains(&"query_mode".to_string()));

        run_migrations(&conn).unwrap();

        assert!(column_names(&conn, "queries").contains(&"query_mode".to_string()));
        let response_cols = column_names(&conn, "query_responses");
        assert!(response_cols.contains(&"refusal_triggered".to_string()));
        assert!(response_cols.contains(&"refusal_reason".to_string()));
        assert_eq!(
            get_embedding_model(&conn).unwrap(),
            Some(DEFAULT_EMBEDDING_MODEL.to_string())
        );
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = test_db();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn set_and_get_embedding_model() {
        let conn = test_db();
        run_migrations(&conn).unwrap();

        set_embedding_model(&conn, "text-embedding-ada-002").unwrap();
        assert_eq!(
            get_embedding_model(&conn).unwrap(),
            Some("text-embedding-ada-002".to_string())
        );
    }
}
