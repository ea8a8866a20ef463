//! Ledger record and enum definitions.
//!
//! Defines the closed enums stored as TEXT ([`Rating`], [`MetricName`],
//! [`QueryMode`]), the structured JSON payloads ([`BookContext`],
//! [`SourceReference`], [`GenerationParams`]), the input structs accepted by
//! the write operations and the records returned by the readers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// User verdict on a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Helpful,
    NotHelpful,
}

impl Rating {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Helpful => "helpful",
            Self::NotHelpful => "not_helpful",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Rating {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "helpful" => Ok(Self::Helpful),
            "not_helpful" => Ok(Self::NotHelpful),
            _ => Err(LedgerError::validation(
                "rating",
                format!("must be 'helpful' or 'not_helpful', got '{s}'"),
            )),
        }
    }
}

/// The five rollup kinds stored in `analytics_aggregates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    DailyQueryCount,
    WeeklyAvgLatency,
    MonthlyFeedbackRate,
    TopQuestionTopics,
    HourlyConcurrentUsers,
}

impl MetricName {
    pub const ALL: [MetricName; 5] = [
        Self::DailyQueryCount,
        Self::WeeklyAvgLatency,
        Self::MonthlyFeedbackRate,
        Self::TopQuestionTopics,
        Self::HourlyConcurrentUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyQueryCount => "daily_query_count",
            Self::WeeklyAvgLatency => "weekly_avg_latency",
            Self::MonthlyFeedbackRate => "monthly_feedback_rate",
            Self::TopQuestionTopics => "top_question_topics",
            Self::HourlyConcurrentUsers => "hourly_concurrent_users",
        }
    }
}

impl std::fmt::Display for MetricName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricName {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| LedgerError::validation("metric_name", format!("unknown metric: {s}")))
    }
}

/// Whether a question targets the whole book or a highlighted passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryMode {
    BookWide,
    SelectedText,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookWide => "book-wide",
            Self::SelectedText => "selected-text",
        }
    }

    /// Mode implied by the presence of selected text.
    pub fn for_selection(selected_text: Option<&str>) -> Self {
        match selected_text {
            Some(_) => Self::SelectedText,
            None => Self::BookWide,
        }
    }
}

impl std::str::FromStr for QueryMode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "book-wide" => Ok(Self::BookWide),
            "selected-text" => Ok(Self::SelectedText),
            _ => Err(LedgerError::validation("query_mode", format!("unknown mode: {s}"))),
        }
    }
}

/// Where in the book a question was asked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookContext {
    pub book_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
}

/// A citation attached to a generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReference {
    pub chapter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub citation: String,
    pub chunk_id: Uuid,
}

/// Model settings and token usage for one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt_version: String,
    pub prompt_token_count: u32,
    pub completion_token_count: u32,
}

/// Half-open time range `[start, end)` with `end` strictly after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, LedgerError> {
        if end <= start {
            return Err(LedgerError::validation(
                "time_period_end",
                format!("must be after start ({start} >= {end})"),
            ));
        }
        Ok(Self { start, end })
    }
}

// ---------------------------------------------------------------------------
// Write inputs
// ---------------------------------------------------------------------------

/// Input for [`record_query`](super::query::record_query).
#[derive(Debug, Clone)]
pub struct NewQuery {
    /// 64-character anonymized user hash (see [`crate::identity`]).
    pub user_id: String,
    pub query_text: String,
    pub embedding: Vec<f32>,
    pub selected_text: Option<String>,
    pub book_context: Option<BookContext>,
    pub session_id: Option<Uuid>,
    pub ip_address_hash: Option<String>,
    /// Defaults to now when `None`.
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewRetrieval {
    pub query_id: Uuid,
    /// Ordered by rank; parallel to `similarity_scores`.
    pub chunk_ids: Vec<Uuid>,
    pub similarity_scores: Vec<f64>,
    pub retrieval_params: serde_json::Value,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewResponse {
    pub query_id: Uuid,
    pub response_text: String,
    pub source_references: Vec<SourceReference>,
    pub generation_params: serde_json::Value,
    pub latency_ms: u32,
    pub confidence_score: Option<f64>,
    pub refusal_triggered: bool,
    pub refusal_reason: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub response_id: Uuid,
    pub rating: Rating,
    pub comment: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewAggregate {
    pub metric_name: MetricName,
    pub time_period_start: DateTime<Utc>,
    pub time_period_end: DateTime<Utc>,
    pub metric_value: serde_json::Value,
    pub book_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// A row of `queries`. The embedding is read separately via
/// [`get_query_embedding`](super::query::get_query_embedding).
#[derive(Debug, Clone, Serialize)]
pub struct Query {
    pub query_id: Uuid,
    pub user_id: String,
    pub query_text: String,
    pub selected_text: Option<String>,
    pub book_context: Option<BookContext>,
    pub query_mode: QueryMode,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<Uuid>,
    pub ip_address_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedContext {
    pub context_id: Uuid,
    pub query_id: Uuid,
    pub chunk_ids: Vec<Uuid>,
    pub similarity_scores: Vec<f64>,
    pub retrieval_params: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseRecord {
    pub response_id: Uuid,
    pub query_id: Uuid,
    pub response_text: String,
    pub source_references: Vec<SourceReference>,
    pub generation_params: serde_json::Value,
    pub latency_ms: u32,
    pub timestamp: DateTime<Utc>,
    pub confidence_score: Option<f64>,
    pub refusal_triggered: bool,
    pub refusal_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserFeedback {
    pub feedback_id: Uuid,
    pub response_id: Uuid,
    pub rating: Rating,
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsAggregate {
    pub aggregate_id: Uuid,
    pub metric_name: MetricName,
    pub time_period_start: DateTime<Utc>,
    pub time_period_end: DateTime<Utc>,
    pub metric_value: serde_json::Value,
    pub book_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Column codecs
// ---------------------------------------------------------------------------

/// Fixed-width RFC 3339 so that lexical order in SQLite equals time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_failure(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn parse_uuid(idx: usize, raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn parse_enum<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = LedgerError>,
{
    raw.parse().map_err(|e| conversion_failure(idx, e))
}
