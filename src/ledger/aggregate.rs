//! Aggregate metrics: derived rollups with no ownership link to individual queries.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::types::{
    format_timestamp, parse_enum, parse_json, parse_timestamp, parse_uuid, AnalyticsAggregate,
    MetricName, NewAggregate, TimeWindow,
};
use super::validate;
use crate::error::{LedgerError, Result, WriteTarget};

/// Store one aggregate. The period end must be strictly after its start.
pub fn record_aggregate(conn: &Connection, aggregate: &NewAggregate) -> Result<Uuid> {
    if aggregate.time_period_end <= aggregate.time_period_start {
        return Err(LedgerError::validation(
            "time_period_end",
            "must be after time_period_start",
        ));
    }
    validate::max_length("book_id", aggregate.book_id.as_deref(), validate::BOOK_ID_MAX)?;

    let id = Uuid::now_v7();
    let id_str = id.to_string();
    let target = WriteTarget {
        entity: "aggregate",
        key: &id_str,
        parent: "aggregate",
        parent_id: &id_str,
    };

    conn.execute(
        "INSERT INTO analytics_aggregates (aggregate_id, metric_name, time_period_start, \
         time_period_end, metric_value, book_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id_str,
            aggregate.metric_name.as_str(),
            format_timestamp(&aggregate.time_period_start),
            format_timestamp(&aggregate.time_period_end),
            serde_json::to_string(&aggregate.metric_value)?,
            aggregate.book_id,
            format_timestamp(&Utc::now()),
        ],
    )
    .map_err(|e| target.classify(e))?;

    tracing::debug!(
        aggregate_id = %id,
        metric = %aggregate.metric_name,
        book_id = aggregate.book_id.as_deref().unwrap_or("*"),
        "recorded aggregate"
    );
    Ok(id)
}

/// Which books an aggregate lookup should match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookScope<'a> {
    /// Only global (unscoped) aggregates.
    Global,
    /// Only aggregates for this book.
    Book(&'a str),
    /// Both global and per-book aggregates.
    Any,
}

impl<'a> BookScope<'a> {
    pub fn from_option(book_id: Option<&'a str>) -> Self {
        match book_id {
            Some(b) => Self::Book(b),
            None => Self::Global,
        }
    }
}

fn row_to_aggregate(row: &Row) -> rusqlite::Result<AnalyticsAggregate> {
    Ok(AnalyticsAggregate {
        aggregate_id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        metric_name: parse_enum(1, &row.get::<_, String>(1)?)?,
        time_period_start: parse_timestamp(2, &row.get::<_, String>(2)?)?,
        time_period_end: parse_timestamp(3, &row.get::<_, String>(3)?)?,
        metric_value: parse_json(4, &row.get::<_, String>(4)?)?,
        book_id: row.get(5)?,
        created_at: parse_timestamp(6, &row.get::<_, String>(6)?)?,
    })
}

/// Aggregates of one kind whose period overlaps `window`, ordered by period start.
pub fn list_aggregates(
    conn: &Connection,
    metric: MetricName,
    window: &TimeWindow,
    scope: BookScope<'_>,
) -> Result<Vec<AnalyticsAggregate>> {
    let (book_clause, book_param) = match scope {
        BookScope::Global => ("AND book_id IS NULL", None),
        BookScope::Book(b) => ("AND book_id = ?4", Some(b)),
        BookScope::Any => ("", None),
    };
    let sql = format!(
        "SELECT aggregate_id, metric_name, time_period_start, time_period_end, metric_value, \
         book_id, created_at FROM analytics_aggregates \
         WHERE metric_name = ?1 AND time_period_start < ?3 AND time_period_end > ?2 {book_clause} \
         ORDER BY time_period_start, created_at"
    );

    let start = format_timestamp(&window.start);
    let end = format_timestamp(&window.end);
    let mut stmt = conn.prepare(&sql)?;
    let rows = match book_param {
        Some(book) => stmt
            .query_map(params![metric.as_str(), start, end, book], row_to_aggregate)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        None => stmt
            .query_map(params![metric.as_str(), start, end], row_to_aggregate)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };
    Ok(rows)
}

/// Remove previously stored aggregates for an exact period so a rollup can be recomputed.
pub fn delete_aggregates_for_period(
    conn: &Connection,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    book_id: Option<&str>,
) -> Result<u64> {
    let removed = conn.execute(
        "DELETE FROM analytics_aggregates \
         WHERE time_period_start = ?1 AND time_period_end = ?2 AND book_id IS ?3",
        params![format_timestamp(start), format_timestamp(end), book_id],
    )?;
    Ok(removed as u64)
}
