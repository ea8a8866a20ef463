#![allow(dead_code)]

use chrono::{DateTime, Utc};
use ragledger::db;
use ragledger::db::schema::EMBEDDING_DIMENSIONS;
use ragledger::ledger::types::{BookContext, NewFeedback, NewQuery, NewResponse, NewRetrieval, Rating};
use rusqlite::Connection;
use uuid::Uuid;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::load_sqlite_vec();
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

/// Generate a deterministic 1536-dim embedding with a spike at position `seed`.
pub fn test_embedding(seed: u16) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIMENSIONS];
    v[seed as usize % EMBEDDING_DIMENSIONS] = 1.0;
    v
}

/// A 64-character user hash built from one repeated character.
pub fn user(c: char) -> String {
    c.to_string().repeat(64)
}

pub fn new_query(text: &str, user_id: &str) -> NewQuery {
    NewQuery {
        user_id: user_id.to_string(),
        query_text: text.to_string(),
        embedding: test_embedding(text.len() as u16),
        selected_text: None,
        book_context: None,
        session_id: None,
        ip_address_hash: None,
        timestamp: None,
    }
}

/// A query in `book_id` at a fixed time.
pub fn book_query(text: &str, user_id: &str, book_id: &str, at: DateTime<Utc>) -> NewQuery {
    NewQuery {
        book_context: Some(BookContext {
            book_id: book_id.to_string(),
            chapter_number: Some(3),
            page_url: None,
        }),
        timestamp: Some(at),
        ..new_query(text, user_id)
    }
}

pub fn new_retrieval(query_id: Uuid, n: usize) -> NewRetrieval {
    NewRetrieval {
        query_id,
        chunk_ids: (0..n).map(|_| Uuid::now_v7()).collect(),
        similarity_scores: (0..n).map(|i| 0.9 - i as f64 * 0.05).collect(),
        retrieval_params: serde_json::json!({"top_k": n, "threshold": 0.7}),
        timestamp: None,
    }
}

pub fn new_response(query_id: Uuid, text_len: usize, latency_ms: u32) -> NewResponse {
    NewResponse {
        query_id,
        response_text: "a".repeat(text_len),
        source_references: vec![],
        generation_params: serde_json::json!({"model": "gpt-4o-mini", "temperature": 0.2}),
        latency_ms,
        confidence_score: Some(0.8),
        refusal_triggered: false,
        refusal_reason: None,
        timestamp: None,
    }
}

pub fn new_feedback(response_id: Uuid, rating: Rating) -> NewFeedback {
    NewFeedback {
        response_id,
        rating,
        comment: None,
        timestamp: None,
    }
}

/// Row count of `table`.
pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
        .unwrap()
}
