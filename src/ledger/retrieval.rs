//! Retrieval records: which chunks were pulled for a query and how similar they were.

use rusqlite::{params, Connection, Row, Transaction};
use uuid::Uuid;

use super::types::{format_timestamp, parse_json, parse_timestamp, parse_uuid, NewRetrieval, RetrievedContext};
use super::validate;
use crate::error::{Result, WriteTarget};

/// Store the ranked chunk list for a query. Fails if the query does not exist.
pub fn record_retrieval(conn: &mut Connection, retrieval: &NewRetrieval) -> Result<Uuid> {
    let tx = conn.transaction()?;
    let id = insert_retrieval(&tx, retrieval)?;
    tx.commit()?;

    tracing::info!(
        context_id = %id,
        query_id = %retrieval.query_id,
        chunks = retrieval.chunk_ids.len(),
        "recorded retrieval"
    );
    Ok(id)
}

pub(crate) fn insert_retrieval(tx: &Transaction, retrieval: &NewRetrieval) -> Result<Uuid> {
    validate::retrieval_lists(
        retrieval.chunk_ids.len(),
        retrieval.similarity_scores.len(),
        &retrieval.similarity_scores,
    )?;

    let id = Uuid::now_v7();
    let id_str = id.to_string();
    let query_id = retrieval.query_id.to_string();
    let timestamp = format_timestamp(&retrieval.timestamp.unwrap_or_else(chrono::Utc::now));

    let target = WriteTarget {
        entity: "retrieval",
        key: &id_str,
        parent: "query",
        parent_id: &query_id,
    };

    tx.execute(
        "INSERT INTO retrieved_contexts (context_id, query_id, chunk_ids, similarity_scores, \
         retrieval_params, timestamp) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id_str,
            query_id,
            serde_json::to_string(&retrieval.chunk_ids)?,
            serde_json::to_string(&retrieval.similarity_scores)?,
            serde_json::to_string(&retrieval.retrieval_params)?,
            timestamp,
        ],
    )
    .map_err(|e| target.classify(e))?;

    Ok(id)
}

fn row_to_context(row: &Row) -> rusqlite::Result<RetrievedContext> {
    Ok(RetrievedContext {
        context_id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        query_id: parse_uuid(1, &row.get::<_, String>(1)?)?,
        chunk_ids: parse_json(2, &row.get::<_, String>(2)?)?,
        similarity_scores: parse_json(3, &row.get::<_, String>(3)?)?,
        retrieval_params: parse_json(4, &row.get::<_, String>(4)?)?,
        timestamp: parse_timestamp(5, &row.get::<_, String>(5)?)?,
    })
}

/// Retrieval records of a query, oldest first.
pub fn retrievals_for_query(conn: &Connection, query_id: Uuid) -> Result<Vec<RetrievedContext>> {
    let mut stmt = conn.prepare(
        "SELECT context_id, query_id, chunk_ids, similarity_scores, retrieval_params, timestamp \
         FROM retrieved_contexts WHERE query_id = ?1 ORDER BY timestamp, context_id",
    )?;
    let rows = stmt
        .query_map(params![query_id.to_string()], row_to_context)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::schema::EMBEDDING_DIMENSIONS;
    use crate::ledger::query::record_query;
    use crate::ledger::types::NewQuery;

    fn seeded() -> (Connection, Uuid) {
        let mut conn = db::open_memory_database().unwrap();
        let id = record_query(
            &mut conn,
            &NewQuery {
                user_id: "0".repeat(64),
                query_text: "What is AI?".into(),
                embedding: vec![0.1; EMBEDDING_DIMENSIONS],
                selected_text: None,
                book_context: None,
                session_id: None,
                ip_address_hash: None,
                timestamp: None,
            },
        )
        .unwrap();
        (conn, id)
    }

    fn retrieval(query_id: Uuid, n_chunks: usize, n_scores: usize) -> NewRetrieval {
        NewRetrieval {
            query_id,
            chunk_ids: (0..n_chunks).map(|_| Uuid::now_v7()).collect(),
            similarity_scores: (0..n_scores).map(|i| 0.9 - i as f64 * 0.05).collect(),
            retrieval_params: serde_json::json!({"top_k": 5, "threshold": 0.7}),
            timestamp: None,
        }
    }

    #[test]
    fn stores_ordered_chunks_with_scores() {
        let (mut conn, qid) = seeded();
        let input = retrieval(qid, 3, 3);
        record_retrieval(&mut conn, &input).unwrap();

        let stored = retrievals_for_query(&conn, qid).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].chunk_ids, input.chunk_ids);
        assert_eq!(stored[0].similarity_scores, input.similarity_scores);
        assert_eq!(stored[0].retrieval_params["top_k"], 5);
    }

    #[test]
    fn rejects_mismatched_and_out_of_range_lists() {
        let (mut conn, qid) = seeded();
        assert!(record_retrieval(&mut conn, &retrieval(qid, 2, 1)).is_err());
        assert!(record_retrieval(&mut conn, &retrieval(qid, 0, 0)).is_err());
        assert!(record_retrieval(&mut conn, &retrieval(qid, 11, 11)).is_err());
        assert!(retrievals_for_query(&conn, qid).unwrap().is_empty());
    }

    #[test]
    fn missing_query_is_referential_error() {
        let (mut conn, _) = seeded();
        let err = record_retrieval(&mut conn, &retrieval(Uuid::now_v7(), 1, 1)).unwrap_err();
        assert_eq!(err.code(), "REFERENTIAL_ERROR");
    }
}
