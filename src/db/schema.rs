//! SQL DDL for the query ledger.
//!
//! Defines `queries`, `query_embeddings` (vec0), `retrieved_contexts`,
//! `query_responses`, `user_feedbacks`, `analytics_aggregates` and
//! `schema_meta`. Integrity rules live in the DDL itself (CHECK, UNIQUE and
//! cascading foreign keys) so no caller can bypass them. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Dimension of the stored query embeddings.
pub const EMBEDDING_DIMENSIONS: usize = 1536;

const SCHEMA_SQL: &str = r#"
-- One row per user question (append-only)
CREATE TABLE IF NOT EXISTS queries (
    query_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL CHECK(length(user_id) = 64),
    query_text TEXT NOT NULL CHECK(length(query_text) BETWEEN 1 AND 500),
    selected_text TEXT,
    book_context TEXT CHECK(book_context IS NULL OR json_valid(book_context)),
    timestamp TEXT NOT NULL,
    session_id TEXT,
    ip_address_hash TEXT CHECK(ip_address_hash IS NULL OR length(ip_address_hash) <= 64)
);

CREATE INDEX IF NOT EXISTS idx_queries_timestamp ON queries(timestamp);
CREATE INDEX IF NOT EXISTS idx_queries_user ON queries(user_id);
CREATE INDEX IF NOT EXISTS idx_queries_session ON queries(session_id);

-- Chunks retrieved for a query, ordered, with parallel similarity scores
CREATE TABLE IF NOT EXISTS retrieved_contexts (
    context_id TEXT PRIMARY KEY,
    query_id TEXT NOT NULL REFERENCES queries(query_id) ON DELETE CASCADE,
    chunk_ids TEXT NOT NULL CHECK(
        json_valid(chunk_ids)
        AND json_type(chunk_ids) = 'array'
        AND json_array_length(chunk_ids) BETWEEN 1 AND 10
    ),
    similarity_scores TEXT NOT NULL CHECK(
        json_valid(similarity_scores)
        AND json_type(similarity_scores) = 'array'
        AND json_array_length(similarity_scores) = json_array_length(chunk_ids)
    ),
    retrieval_params TEXT NOT NULL CHECK(json_valid(retrieval_params)),
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_contexts_query ON retrieved_contexts(query_id);

-- Generated answer, at most one per query
CREATE TABLE IF NOT EXISTS query_responses (
    response_id TEXT PRIMARY KEY,
    query_id TEXT NOT NULL UNIQUE REFERENCES queries(query_id) ON DELETE CASCADE,
    response_text TEXT NOT NULL CHECK(length(response_text) BETWEEN 50 AND 2000),
    source_references TEXT NOT NULL CHECK(json_valid(source_references)),
    generation_params TEXT NOT NULL CHECK(json_valid(generation_params)),
    latency_ms INTEGER NOT NULL CHECK(latency_ms BETWEEN 100 AND 10000),
    timestamp TEXT NOT NULL,
    confidence_score REAL CHECK(
        confidence_score IS NULL OR (confidence_score >= 0.0 AND confidence_score <= 1.0)
    )
);

CREATE INDEX IF NOT EXISTS idx_responses_timestamp ON query_responses(timestamp);

-- Helpfulness feedback, at most one per response
CREATE TABLE IF NOT EXISTS user_feedbacks (
    feedback_id TEXT PRIMARY KEY,
    response_id TEXT NOT NULL UNIQUE REFERENCES query_responses(response_id) ON DELETE CASCADE,
    rating TEXT NOT NULL CHECK(rating IN ('helpful','not_helpful')),
    comment TEXT CHECK(comment IS NULL OR length(comment) <= 500),
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_feedbacks_rating ON user_feedbacks(rating);

-- Periodic rollups (derived, no foreign keys)
CREATE TABLE IF NOT EXISTS analytics_aggregates (
    aggregate_id TEXT PRIMARY KEY,
    metric_name TEXT NOT NULL CHECK(metric_name IN (
        'daily_query_count',
        'weekly_avg_latency',
        'monthly_feedback_rate',
        'top_question_topics',
        'hourly_concurrent_users'
    )),
    time_period_start TEXT NOT NULL,
    time_period_end TEXT NOT NULL,
    metric_value TEXT NOT NULL CHECK(json_valid(metric_value)),
    book_id TEXT CHECK(book_id IS NULL OR length(book_id) <= 100),
    created_at TEXT NOT NULL,
    CHECK(time_period_end > time_period_start)
);

CREATE INDEX IF NOT EXISTS idx_aggregates_metric_period_book
    ON analytics_aggregates(metric_name, time_period_start, book_id);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// vec0 virtual table must be created separately (sqlite-vec syntax).
/// Virtual tables cannot carry foreign keys; purges delete from it explicitly.
const VEC_TABLE_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS query_embeddings USING vec0(
    query_id TEXT PRIMARY KEY,
    embedding FLOAT[1536]
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
///
/// Runs under the write lock so connections bootstrapping the same file
/// concurrently take turns.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    tx.execute_batch(SCHEMA_SQL)?;
    tx.execute_batch(VEC_TABLE_SQL)?;

    tx.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    tx.commit()
}
