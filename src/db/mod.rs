pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use sqlite_vec::sqlite3_vec_init;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

static SQLITE_VEC_INIT: Once = Once::new();

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the ledger database at the given path, with all extensions
/// loaded, schema initialized and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // Set first: switching to WAL and bootstrapping both contend for the lock.
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open a fully migrated in-memory database.
pub fn open_memory_database() -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub schema_version: u32,
    pub sqlite_vec_version: String,
    pub embedding_model: Option<String>,
    pub query_count: u64,
    pub embedding_count: u64,
    pub retrieval_count: u64,
    pub response_count: u64,
    pub feedback_count: u64,
    pub aggregate_count: u64,
    pub integrity_ok: bool,
    pub integrity_details: String,
    /// Rows whose parent is missing, as reported by `PRAGMA foreign_key_check`.
    pub foreign_key_violations: u64,
    /// The same violations keyed by child table.
    pub foreign_key_violations_by_table: BTreeMap<String, u64>,
    /// Embeddings left behind by a query that no longer exists.
    pub orphaned_embeddings: u64,
}

fn count_rows(conn: &Connection, table: &str) -> rusqlite::Result<u64> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
    Ok(n as u64)
}

/// Run integrity, foreign-key and bookkeeping checks over an open database.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let schema_version = migrations::get_schema_version(conn)?;
    let sqlite_vec_version: String = conn.query_row("SELECT vec_version()", [], |r| r.get(0))?;
    let embedding_model = migrations::get_embedding_model(conn)?;

    let integrity: Vec<String> = conn
        .prepare("PRAGMA integrity_check")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    let integrity_ok = integrity.len() == 1 && integrity[0] == "ok";

    let mut foreign_key_violations_by_table: BTreeMap<String, u64> = BTreeMap::new();
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        *foreign_key_violations_by_table.entry(row.get(0)?).or_insert(0) += 1;
    }
    drop(rows);
    drop(stmt);
    let foreign_key_violations = foreign_key_violations_by_table.values().sum();

    let orphaned_embeddings: i64 = conn.query_row(
        "SELECT COUNT(*) FROM query_embeddings e
         WHERE NOT EXISTS (SELECT 1 FROM queries q WHERE q.query_id = e.query_id)",
        [],
        |r| r.get(0),
    )?;

    let report = HealthReport {
        schema_version,
        sqlite_vec_version,
        embedding_model,
        query_count: count_rows(conn, "queries")?,
        embedding_count: count_rows(conn, "query_embeddings")?,
        retrieval_count: count_rows(conn, "retrieved_contexts")?,
        response_count: count_rows(conn, "query_responses")?,
        feedback_count: count_rows(conn, "user_feedbacks")?,
        aggregate_count: count_rows(conn, "analytics_aggregates")?,
        integrity_ok,
        integrity_details: integrity.join("; "),
        foreign_key_violations,
        foreign_key_violations_by_table,
        orphaned_embeddings: orphaned_embeddings as u64,
    };

    if !report.integrity_ok || report.foreign_key_violations > 0 || report.orphaned_embeddings > 0 {
        tracing::warn!(
            integrity_ok = report.integrity_ok,
            foreign_key_violations = report.foreign_key_violations,
            orphaned_embeddings = report.orphaned_embeddings,
            "database health check found problems"
        );
    }

    Ok(report)
}

/// Delete embeddings whose query row is gone. Returns how many were removed.
pub fn remove_orphaned_embeddings(conn: &Connection) -> Result<u64> {
    let removed = conn.execute(
        "DELETE FROM query_embeddings
         WHERE query_id NOT IN (SELECT query_id FROM queries)",
        [],
    )?;
    if removed > 0 {
        tracing::info!(removed, "removed orphaned embeddings");
    }
    Ok(removed as u64)
}
