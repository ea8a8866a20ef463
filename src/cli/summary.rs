use anyhow::Result;
use chrono::NaiveDate;

use crate::analytics;
use crate::config::LedgerConfig;

/// Print usage analytics for the UTC days `start..=end`.
pub fn summary(
    config: &LedgerConfig,
    start: NaiveDate,
    end: NaiveDate,
    book: Option<&str>,
    json: bool,
) -> Result<()> {
    let window = super::date_range(start, end)?;
    let conn = super::open_existing(config)?;

    let summary = analytics::analytics_summary(&conn, &window, book, &config.analytics)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Usage Summary {start} .. {end}");
    println!("{}", "=".repeat(40));
    if let Some(book) = book {
        println!("  Book:                {book}");
    }
    println!("  Total queries:       {}", summary.total_queries);
    println!("  Unique users:        {}", summary.unique_users);
    println!();

    println!("Latency (ms):");
    println!("  p50                  {}", summary.latency_p50);
    println!("  p95                  {}", summary.latency_p95);
    println!("  p99                  {}", summary.latency_p99);
    println!();

    println!("Feedback:");
    println!("  Feedback rate:       {:.1}%", summary.feedback_rate);
    match summary.positive_feedback_rate {
        Some(rate) => println!("  Helpful:             {rate:.1}%"),
        None => println!("  Helpful:             (no feedback)"),
    }
    println!();

    println!("Average confidence:    {:.2}", summary.average_confidence);
    println!("Time saved:            {} min", summary.time_saved_minutes);

    if !summary.top_topics.is_empty() {
        println!();
        println!("Top topics:");
        for t in &summary.top_topics {
            println!("  {:<30} {}", t.topic, t.count);
        }
    }

    Ok(())
}
