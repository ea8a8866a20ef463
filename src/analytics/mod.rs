//! Out-of-band usage analytics over the ledger.
//!
//! Everything here reads historical rows with short statements and writes
//! only to `analytics_aggregates`, so it never holds locks on the live
//! query/response write path for longer than one rollup transaction.
//! Windows are half-open `[start, end)`; book scoping matches
//! `book_context.book_id`.

pub mod topics;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{Connection, ToSql};
use serde::Serialize;
use serde_json::json;

use crate::config::AnalyticsConfig;
use crate::ledger::aggregate::{delete_aggregates_for_period, list_aggregates, record_aggregate, BookScope};
use crate::ledger::types::{format_timestamp, AnalyticsAggregate, MetricName, NewAggregate, TimeWindow};
pub use topics::TopicCount;

/// Time window plus optional book filter shared by every metric query.
struct Scope<'a> {
    start: String,
    end: String,
    book_id: Option<&'a str>,
}

impl<'a> Scope<'a> {
    fn new(window: &TimeWindow, book_id: Option<&'a str>) -> Self {
        Self {
            start: format_timestamp(&window.start),
            end: format_timestamp(&window.end),
            book_id,
        }
    }

    /// `WHERE` body over alias `q` (the queries table).
    fn clause(&self) -> &'static str {
        if self.book_id.is_some() {
            "q.timestamp >= ?1 AND q.timestamp < ?2 AND json_extract(q.book_context, '$.book_id') = ?3"
        } else {
            "q.timestamp >= ?1 AND q.timestamp < ?2"
        }
    }

    fn params(&self) -> Vec<&dyn ToSql> {
        let mut params: Vec<&dyn ToSql> = vec![&self.start, &self.end];
        if let Some(book) = &self.book_id {
            params.push(book);
        }
        params
    }
}

/// Total queries and distinct users in the window.
pub fn query_counts(conn: &Connection, window: &TimeWindow, book_id: Option<&str>) -> Result<(u64, u64)> {
    let scope = Scope::new(window, book_id);
    let (total, users): (i64, i64) = conn.query_row(
        &format!("SELECT COUNT(*), COUNT(DISTINCT q.user_id) FROM queries q WHERE {}", scope.clause()),
        &scope.params()[..],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((total as u64, users as u64))
}

/// Value at quantile `q` of an ascending slice, by `floor(n * q)` index.
fn percentile(sorted: &[u32], q: f64) -> u32 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() as f64) * q) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Response latency percentiles (p50, p95, p99) in milliseconds; zeros when empty.
pub fn latency_percentiles(
    conn: &Connection,
    window: &TimeWindow,
    book_id: Option<&str>,
) -> Result<(u32, u32, u32)> {
    let scope = Scope::new(window, book_id);
    let mut stmt = conn.prepare(&format!(
        "SELECT r.latency_ms FROM query_responses r JOIN queries q ON q.query_id = r.query_id \
         WHERE {} ORDER BY r.latency_ms",
        scope.clause()
    ))?;
    let latencies: Vec<u32> = stmt
        .query_map(&scope.params()[..], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok((
        percentile(&latencies, 0.50),
        percentile(&latencies, 0.95),
        percentile(&latencies, 0.99),
    ))
}

/// Feedback rates as percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeedbackRates {
    pub responses: u64,
    pub feedbacks: u64,
    /// Share of responses that received feedback (0-100).
    pub feedback_rate: f64,
    /// Share of feedback rated helpful (0-100); `None` without feedback.
    pub positive_feedback_rate: Option<f64>,
}

pub fn feedback_rates(conn: &Connection, window: &TimeWindow, book_id: Option<&str>) -> Result<FeedbackRates> {
    let scope = Scope::new(window, book_id);
    let (responses, feedbacks, helpful): (i64, i64, i64) = conn.query_row(
        &format!(
            "SELECT COUNT(r.response_id), COUNT(f.feedback_id), \
                    COALESCE(SUM(f.rating = 'helpful'), 0) \
             FROM query_responses r \
             JOIN queries q ON q.query_id = r.query_id \
             LEFT JOIN user_feedbacks f ON f.response_id = r.response_id \
             WHERE {}",
            scope.clause()
        ),
        &scope.params()[..],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let feedback_rate = if responses > 0 {
        feedbacks as f64 / responses as f64 * 100.0
    } else {
        0.0
    };
    let positive_feedback_rate = (feedbacks > 0).then(|| helpful as f64 / feedbacks as f64 * 100.0);

    Ok(FeedbackRates {
        responses: responses as u64,
        feedbacks: feedbacks as u64,
        feedback_rate,
        positive_feedback_rate,
    })
}

/// Mean confidence of responses that carry one; 0.0 when none do.
pub fn average_confidence(conn: &Connection, window: &TimeWindow, book_id: Option<&str>) -> Result<f64> {
    let scope = Scope::new(window, book_id);
    let avg: Option<f64> = conn.query_row(
        &format!(
            "SELECT AVG(r.confidence_score) FROM query_responses r \
             JOIN queries q ON q.query_id = r.query_id \
             WHERE {} AND r.confidence_score IS NOT NULL",
            scope.clause()
        ),
        &scope.params()[..],
        |row| row.get(0),
    )?;
    Ok(avg.unwrap_or(0.0))
}

/// Most frequent question keywords in the window.
pub fn top_topics(
    conn: &Connection,
    window: &TimeWindow,
    book_id: Option<&str>,
    limit: usize,
) -> Result<Vec<TopicCount>> {
    let scope = Scope::new(window, book_id);
    let mut stmt = conn.prepare(&format!("SELECT q.query_text FROM queries q WHERE {}", scope.clause()))?;
    let texts: Vec<String> = stmt
        .query_map(&scope.params()[..], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(topics::top_topics(texts.iter().map(String::as_str), limit))
}

/// Distinct users per UTC hour of the window, as `(hour, users)` pairs for active hours.
pub fn hourly_users(conn: &Connection, window: &TimeWindow, book_id: Option<&str>) -> Result<Vec<(u32, u64)>> {
    let scope = Scope::new(window, book_id);
    // Timestamps are fixed-width RFC 3339, so the hour is always at offset 12.
    let mut stmt = conn.prepare(&format!(
        "SELECT CAST(substr(q.timestamp, 12, 2) AS INTEGER) AS hour, COUNT(DISTINCT q.user_id) \
         FROM queries q WHERE {} GROUP BY hour ORDER BY hour",
        scope.clause()
    ))?;
    let rows = stmt
        .query_map(&scope.params()[..], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)? as u64))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Dashboard summary for a period.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub book_id: Option<String>,
    pub total_queries: u64,
    pub unique_users: u64,
    pub latency_p50: u32,
    pub latency_p95: u32,
    pub latency_p99: u32,
    pub feedback_rate: f64,
    pub positive_feedback_rate: Option<f64>,
    pub average_confidence: f64,
    /// Estimated minutes of instructor time saved.
    pub time_saved_minutes: u64,
    pub top_topics: Vec<TopicCount>,
}

pub fn analytics_summary(
    conn: &Connection,
    window: &TimeWindow,
    book_id: Option<&str>,
    config: &AnalyticsConfig,
) -> Result<AnalyticsSummary> {
    let (total_queries, unique_users) = query_counts(conn, window, book_id)?;
    let (latency_p50, latency_p95, latency_p99) = latency_percentiles(conn, window, book_id)?;
    let feedback = feedback_rates(conn, window, book_id)?;
    let average_confidence = average_confidence(conn, window, book_id)?;
    let top_topics = top_topics(conn, window, book_id, config.top_topics)?;

    Ok(AnalyticsSummary {
        start_date: window.start,
        end_date: window.end,
        book_id: book_id.map(str::to_string),
        total_queries,
        unique_users,
        latency_p50,
        latency_p95,
        latency_p99,
        feedback_rate: feedback.feedback_rate,
        positive_feedback_rate: feedback.positive_feedback_rate,
        average_confidence,
        time_saved_minutes: (total_queries as f64 * config.minutes_per_query).floor() as u64,
        top_topics,
    })
}

/// The UTC day containing `date` as a half-open window.
pub fn day_window(date: NaiveDate) -> TimeWindow {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    TimeWindow {
        start,
        end: start + Duration::days(1),
    }
}

/// Compute and store the daily rollups for one UTC day.
///
/// Existing aggregates for exactly that day and book scope are replaced, so a
/// rerun is idempotent. Returns the stored aggregates.
pub fn compute_daily_aggregates(
    conn: &mut Connection,
    date: NaiveDate,
    book_id: Option<&str>,
    config: &AnalyticsConfig,
) -> Result<Vec<AnalyticsAggregate>> {
    let window = day_window(date);
    let mut pending: Vec<(MetricName, serde_json::Value)> = Vec::new();

    let (total_queries, unique_users) = query_counts(conn, &window, book_id)?;
    pending.push((
        MetricName::DailyQueryCount,
        json!({"total_queries": total_queries, "unique_users": unique_users}),
    ));

    if total_queries > 0 {
        let (p50, p95, p99) = latency_percentiles(conn, &window, book_id)?;
        pending.push((MetricName::WeeklyAvgLatency, json!({"p50": p50, "p95": p95, "p99": p99})));

        let topics = top_topics(conn, &window, book_id, config.top_topics)?;
        if !topics.is_empty() {
            pending.push((MetricName::TopQuestionTopics, json!({"topics": topics})));
        }

        let feedback = feedback_rates(conn, &window, book_id)?;
        if feedback.responses > 0 {
            pending.push((MetricName::MonthlyFeedbackRate, serde_json::to_value(feedback)?));
        }

        let hours = hourly_users(conn, &window, book_id)?;
        if let Some(&(peak_hour, peak_users)) = hours.iter().max_by_key(|(hour, users)| (*users, std::cmp::Reverse(*hour))) {
            let by_hour: Vec<_> = hours
                .iter()
                .map(|(hour, users)| json!({"hour": hour, "users": users}))
                .collect();
            pending.push((
                MetricName::HourlyConcurrentUsers,
                json!({"peak_hour": peak_hour, "peak_users": peak_users, "hours": by_hour}),
            ));
        }
    }

    let tx = conn.transaction()?;
    let replaced = delete_aggregates_for_period(&tx, &window.start, &window.end, book_id)?;
    for (metric, value) in &pending {
        record_aggregate(
            &tx,
            &NewAggregate {
                metric_name: *metric,
                time_period_start: window.start,
                time_period_end: window.end,
                metric_value: value.clone(),
                book_id: book_id.map(str::to_string),
            },
        )
        .with_context(|| format!("failed to store {metric} for {date}"))?;
    }
    tx.commit()?;

    tracing::info!(
        %date,
        book_id = book_id.unwrap_or("*"),
        computed = pending.len(),
        replaced,
        "daily aggregates computed"
    );

    let scope = BookScope::from_option(book_id);
    let mut stored = Vec::with_capacity(pending.len());
    for (metric, _) in &pending {
        stored.extend(
            list_aggregates(conn, *metric, &window, scope)?
                .into_iter()
                .filter(|a| a.time_period_start == window.start && a.time_period_end == window.end),
        );
    }
    Ok(stored)
}
