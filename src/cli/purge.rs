use anyhow::Result;
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::ledger::query::purge_query;

/// Delete one query and everything that hangs off it.
pub fn purge(config: &LedgerConfig, query_id: Uuid) -> Result<()> {
    let mut conn = super::open_existing(config)?;
    let removed = purge_query(&mut conn, query_id)?;

    println!("Purged query {query_id}");
    println!("  Retrievals:  {}", removed.retrievals);
    println!("  Responses:   {}", removed.responses);
    println!("  Feedback:    {}", removed.feedbacks);
    Ok(())
}
