//! Query log, the root of every ledger entry.
//!
//! [`record_query`] writes the `queries` row and its embedding in one
//! transaction. [`purge_query`] is the only way rows leave the ledger: it
//! removes the embedding explicitly and lets the foreign keys cascade to the
//! retrieval, response and feedback rows.

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

use super::types::{
    format_timestamp, parse_json, parse_enum, parse_timestamp, parse_uuid, NewQuery, Query,
    QueryMode,
};
use super::validate;
use crate::error::{LedgerError, Result, WriteTarget};

/// Validate and store a query with its embedding. Returns the new query id.
pub fn record_query(conn: &mut Connection, query: &NewQuery) -> Result<Uuid> {
    let tx = conn.transaction()?;
    let id = insert_query(&tx, query)?;
    tx.commit()?;

    tracing::info!(query_id = %id, "recorded query");
    Ok(id)
}

pub(crate) fn insert_query(tx: &Transaction, query: &NewQuery) -> Result<Uuid> {
    let text = validate::query_text(&query.query_text)?;
    validate::user_id(&query.user_id)?;
    validate::max_length("ip_address_hash", query.ip_address_hash.as_deref(), validate::IP_HASH_MAX)?;
    validate::max_length("selected_text", query.selected_text.as_deref(), validate::SELECTED_TEXT_MAX)?;
    validate::embedding(&query.embedding)?;

    let id = Uuid::now_v7();
    let id_str = id.to_string();
    let timestamp = format_timestamp(&query.timestamp.unwrap_or_else(chrono::Utc::now));
    let book_context = query
        .book_context
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let mode = QueryMode::for_selection(query.selected_text.as_deref());

    let target = WriteTarget {
        entity: "query",
        key: &id_str,
        parent: "query",
        parent_id: &id_str,
    };

    tx.execute(
        "INSERT INTO queries (query_id, user_id, query_text, selected_text, book_context, \
         query_mode, timestamp, session_id, ip_address_hash) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id_str,
            query.user_id,
            text,
            query.selected_text,
            book_context,
            mode.as_str(),
            timestamp,
            query.session_id.map(|s| s.to_string()),
            query.ip_address_hash,
        ],
    )
    .map_err(|e| target.classify(e))?;

    tx.execute(
        "INSERT INTO query_embeddings (query_id, embedding) VALUES (?1, ?2)",
        params![id_str, super::embedding_to_bytes(&query.embedding)],
    )?;

    Ok(id)
}

const QUERY_COLUMNS: &str = "query_id, user_id, query_text, selected_text, book_context, \
                             query_mode, timestamp, session_id, ip_address_hash";

fn row_to_query(row: &Row) -> rusqlite::Result<Query> {
    let book_context: Option<String> = row.get(4)?;
    let session_id: Option<String> = row.get(7)?;
    Ok(Query {
        query_id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        user_id: row.get(1)?,
        query_text: row.get(2)?,
        selected_text: row.get(3)?,
        book_context: book_context.map(|raw| parse_json(4, &raw)).transpose()?,
        query_mode: parse_enum(5, &row.get::<_, String>(5)?)?,
        timestamp: parse_timestamp(6, &row.get::<_, String>(6)?)?,
        session_id: session_id.map(|raw| parse_uuid(7, &raw)).transpose()?,
        ip_address_hash: row.get(8)?,
    })
}

/// Fetch a query by id.
pub fn get_query(conn: &Connection, query_id: Uuid) -> Result<Query> {
    conn.query_row(
        &format!("SELECT {QUERY_COLUMNS} FROM queries WHERE query_id = ?1"),
        params![query_id.to_string()],
        row_to_query,
    )
    .optional()?
    .ok_or_else(|| LedgerError::NotFound {
        entity: "query",
        id: query_id.to_string(),
    })
}

/// All queries of one session, oldest first.
pub fn queries_for_session(conn: &Connection, session_id: Uuid) -> Result<Vec<Query>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {QUERY_COLUMNS} FROM queries WHERE session_id = ?1 ORDER BY timestamp"
    ))?;
    let rows = stmt
        .query_map(params![session_id.to_string()], row_to_query)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Read back the stored embedding of a query.
pub fn get_query_embedding(conn: &Connection, query_id: Uuid) -> Result<Vec<f32>> {
    let bytes: Vec<u8> = conn
        .query_row(
            "SELECT embedding FROM query_embeddings WHERE query_id = ?1",
            params![query_id.to_string()],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| LedgerError::NotFound {
            entity: "query embedding",
            id: query_id.to_string(),
        })?;

    Ok(bytes
        .chunks_exact(std::mem::size_of::<f32>())
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Rows removed by [`purge_query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeResult {
    pub retrievals: u64,
    pub responses: u64,
    pub feedbacks: u64,
}

/// Delete a query and everything it owns, atomically.
pub fn purge_query(conn: &mut Connection, query_id: Uuid) -> Result<PurgeResult> {
    let id = query_id.to_string();
    // Reads before it writes, so it must hold the write lock from the start.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let exists: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM queries WHERE query_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(LedgerError::NotFound {
            entity: "query",
            id,
        });
    }

    // Counted before the delete; the cascade itself reports nothing back.
    let count = |sql: &str| -> rusqlite::Result<u64> {
        tx.query_row(sql, params![id], |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
    };
    let result = PurgeResult {
        retrievals: count("SELECT COUNT(*) FROM retrieved_contexts WHERE query_id = ?1")?,
        responses: count("SELECT COUNT(*) FROM query_responses WHERE query_id = ?1")?,
        feedbacks: count(
            "SELECT COUNT(*) FROM user_feedbacks f \
             JOIN query_responses r ON r.response_id = f.response_id WHERE r.query_id = ?1",
        )?,
    };

    tx.execute("DELETE FROM query_embeddings WHERE query_id = ?1", params![id])?;
    tx.execute("DELETE FROM queries WHERE query_id = ?1", params![id])?;
    tx.commit()?;

    tracing::info!(
        query_id = %query_id,
        retrievals = result.retrievals,
        responses = result.responses,
        feedbacks = result.feedbacks,
        "purged query"
    );
    Ok(result)
}
