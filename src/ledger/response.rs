//! Generated answers. At most one per query, enforced by `UNIQUE(query_id)`.

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use uuid::Uuid;

use super::types::{format_timestamp, parse_json, parse_timestamp, parse_uuid, NewResponse, ResponseRecord};
use super::validate;
use crate::error::{LedgerError, Result, WriteTarget};

/// Store the answer generated for a query.
///
/// A second response for the same query is rejected with
/// [`LedgerError::Duplicate`], even when two writers race.
pub fn record_response(conn: &mut Connection, response: &NewResponse) -> Result<Uuid> {
    let tx = conn.transaction()?;
    let id = insert_response(&tx, response)?;
    tx.commit()?;

    tracing::info!(
        response_id = %id,
        query_id = %response.query_id,
        latency_ms = response.latency_ms,
        refusal = response.refusal_triggered,
        "recorded response"
    );
    Ok(id)
}

pub(crate) fn insert_response(tx: &Transaction, response: &NewResponse) -> Result<Uuid> {
    validate::text_length(
        "response_text",
        &response.response_text,
        validate::RESPONSE_TEXT_MIN,
        validate::RESPONSE_TEXT_MAX,
    )?;
    validate::latency(response.latency_ms)?;
    validate::confidence(response.confidence_score)?;
    validate::max_length(
        "refusal_reason",
        response.refusal_reason.as_deref(),
        validate::REFUSAL_REASON_MAX,
    )?;

    let id = Uuid::now_v7();
    let query_id = response.query_id.to_string();
    let timestamp = format_timestamp(&response.timestamp.unwrap_or_else(chrono::Utc::now));

    let target = WriteTarget {
        entity: "response",
        key: &query_id,
        parent: "query",
        parent_id: &query_id,
    };

    tx.execute(
        "INSERT INTO query_responses (response_id, query_id, response_text, source_references, \
         generation_params, latency_ms, timestamp, confidence_score, refusal_triggered, refusal_reason) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id.to_string(),
            query_id,
            response.response_text,
            serde_json::to_string(&response.source_references)?,
            serde_json::to_string(&response.generation_params)?,
            response.latency_ms,
            timestamp,
            response.confidence_score,
            response.refusal_triggered,
            response.refusal_reason,
        ],
    )
    .map_err(|e| target.classify(e))?;

    Ok(id)
}

const RESPONSE_COLUMNS: &str = "response_id, query_id, response_text, source_references, \
                                generation_params, latency_ms, timestamp, confidence_score, \
                                refusal_triggered, refusal_reason";

fn row_to_response(row: &Row) -> rusqlite::Result<ResponseRecord> {
    Ok(ResponseRecord {
        response_id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        query_id: parse_uuid(1, &row.get::<_, String>(1)?)?,
        response_text: row.get(2)?,
        source_references: parse_json(3, &row.get::<_, String>(3)?)?,
        generation_params: parse_json(4, &row.get::<_, String>(4)?)?,
        latency_ms: row.get(5)?,
        timestamp: parse_timestamp(6, &row.get::<_, String>(6)?)?,
        confidence_score: row.get(7)?,
        refusal_triggered: row.get(8)?,
        refusal_reason: row.get(9)?,
    })
}

pub fn get_response(conn: &Connection, response_id: Uuid) -> Result<ResponseRecord> {
    conn.query_row(
        &format!("SELECT {RESPONSE_COLUMNS} FROM query_responses WHERE response_id = ?1"),
        params![response_id.to_string()],
        row_to_response,
    )
    .optional()?
    .ok_or_else(|| LedgerError::NotFound {
        entity: "response",
        id: response_id.to_string(),
    })
}

/// The response of a query, if one was recorded.
pub fn response_for_query(conn: &Connection, query_id: Uuid) -> Result<Option<ResponseRecord>> {
    Ok(conn
        .query_row(
            &format!("SELECT {RESPONSE_COLUMNS} FROM query_responses WHERE query_id = ?1"),
            params![query_id.to_string()],
            row_to_response,
        )
        .optional()?)
}
