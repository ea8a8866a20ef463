//! Query ledger for a retrieval-augmented textbook chatbot.
//!
//! Every question a reader asks is recorded together with what was retrieved
//! to answer it, the generated answer and, optionally, the reader's rating of
//! that answer. Usage rollups are derived out of band. Five record kinds are
//! kept, linked by identifier:
//!
//! | Record | Parent | Cardinality |
//! |--------|--------|-------------|
//! | **Query** | none | root |
//! | **RetrievedContext** | Query | many per query |
//! | **QueryResponse** | Query | at most one per query |
//! | **UserFeedback** | QueryResponse | at most one per response |
//! | **AnalyticsAggregate** | none | derived |
//!
//! # Architecture
//!
//! - **Storage**: SQLite with CHECK, UNIQUE and cascading foreign-key
//!   constraints, plus [sqlite-vec](https://github.com/asg017/sqlite-vec) for
//!   the 1536-dimension query embeddings
//! - **Writes**: one transaction per operation; a full interaction is a
//!   single transaction via [`ledger::log_interaction`]
//! - **Analytics**: read-only rollups written to `analytics_aggregates`
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: database initialization, schema, migrations and health checks
//! - [`error`]: the error taxonomy every operation returns
//! - [`identity`]: anonymized user and address hashes
//! - [`ledger`]: record, read and purge ledger entries
//! - [`analytics`]: summaries and daily aggregate computation

pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod ledger;
