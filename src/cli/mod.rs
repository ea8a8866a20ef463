pub mod aggregate;
pub mod doctor;
pub mod purge;
pub mod summary;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};

use crate::config::LedgerConfig;
use crate::db;
use crate::ledger::types::TimeWindow;

/// Create or migrate the database and record the configured embedding model.
pub fn init(config: &LedgerConfig) -> Result<()> {
    let db_path = config.resolved_db_path()?;
    let conn = db::open_database(&db_path)?;

    let stored = db::migrations::get_embedding_model(&conn)?;
    match stored.as_deref() {
        Some(model) if model != config.embedding.model => {
            tracing::warn!(
                stored = model,
                configured = %config.embedding.model,
                "embedding model differs from the one recorded in the database"
            );
        }
        Some(_) => {}
        None => db::migrations::set_embedding_model(&conn, &config.embedding.model)?,
    }

    println!("Database:        {}", db_path.display());
    println!(
        "Schema version:  {}",
        db::migrations::get_schema_version(&conn)?
    );
    println!(
        "Embedding model: {}",
        stored.as_deref().unwrap_or(&config.embedding.model)
    );
    Ok(())
}

/// The UTC days `start..=end` as a half-open window.
pub(crate) fn date_range(start: NaiveDate, end: NaiveDate) -> Result<TimeWindow> {
    let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc();
    let end_ts = end.and_time(chrono::NaiveTime::MIN).and_utc() + Duration::days(1);
    TimeWindow::new(start_ts, end_ts).context("--end must not be before --start")
}

/// Open the configured database, failing if it has not been created yet.
pub(crate) fn open_existing(config: &LedgerConfig) -> Result<rusqlite::Connection> {
    let db_path = config.resolved_db_path()?;
    anyhow::ensure!(
        db_path.exists(),
        "no database at {} (run `ragledger init` first)",
        db_path.display()
    );
    db::open_database(&db_path)
}
