use anyhow::Result;
use chrono::NaiveDate;

use crate::analytics;
use crate::config::LedgerConfig;
use crate::ledger::aggregate::{list_aggregates, BookScope};
use crate::ledger::types::{AnalyticsAggregate, MetricName};

/// Compute and store the daily rollups for `date`.
pub fn aggregate(config: &LedgerConfig, date: NaiveDate, book: Option<&str>) -> Result<()> {
    let mut conn = super::open_existing(config)?;
    let stored = analytics::compute_daily_aggregates(&mut conn, date, book, &config.analytics)?;

    println!("Stored {} aggregate(s) for {date}:", stored.len());
    for aggregate in &stored {
        print_aggregate(aggregate);
    }
    Ok(())
}

/// Print stored aggregates of one metric overlapping `start..=end`.
pub fn list(
    config: &LedgerConfig,
    metric: MetricName,
    start: NaiveDate,
    end: NaiveDate,
    book: Option<&str>,
) -> Result<()> {
    let window = super::date_range(start, end)?;
    let conn = super::open_existing(config)?;
    let aggregates = list_aggregates(&conn, metric, &window, BookScope::from_option(book))?;

    if aggregates.is_empty() {
        println!("No {metric} aggregates between {start} and {end}.");
        return Ok(());
    }
    for aggregate in &aggregates {
        print_aggregate(aggregate);
    }
    Ok(())
}

fn print_aggregate(aggregate: &AnalyticsAggregate) {
    println!(
        "  {} [{} .. {}] {} {}",
        aggregate.metric_name,
        aggregate.time_period_start.format("%Y-%m-%d %H:%M"),
        aggregate.time_period_end.format("%Y-%m-%d %H:%M"),
        aggregate.book_id.as_deref().unwrap_or("(all books)"),
        aggregate.metric_value
    );
}
