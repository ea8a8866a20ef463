mod helpers;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use helpers::{book_query, new_feedback, new_response, test_db, user};
use ragledger::analytics::{analytics_summary, compute_daily_aggregates, day_window};
use ragledger::config::AnalyticsConfig;
use ragledger::ledger::aggregate::{list_aggregates, BookScope};
use ragledger::ledger::feedback::record_feedback;
use ragledger::ledger::query::record_query;
use ragledger::ledger::response::record_response;
use ragledger::ledger::types::{MetricName, Rating, TimeWindow};
use rusqlite::Connection;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, day, hour, 15, 0).unwrap()
}

/// Three answered robotics questions on Dec 11 (two users), one ai-basics
/// question the same day, one robotics question on Dec 12.
fn seed(conn: &mut Connection) {
    let rows = [
        ("What is Inverse Kinematics?", 'a', "robotics", at(11, 9), 400, Some(Rating::Helpful)),
        ("How does Inverse Kinematics differ from forward?", 'a', "robotics", at(11, 9), 800, Some(Rating::NotHelpful)),
        ("Explain sensor fusion", 'b', "robotics", at(11, 14), 1200, None),
        ("What is supervised learning?", 'c', "ai-basics", at(11, 14), 600, Some(Rating::Helpful)),
        ("What is a servo?", 'a', "robotics", at(12, 10), 300, None),
    ];
    for (text, who, book, ts, latency, rating) in rows {
        let q = record_query(conn, &book_query(text, &user(who), book, ts)).unwrap();
        let r = record_response(conn, &new_response(q, 80, latency)).unwrap();
        if let Some(rating) = rating {
            record_feedback(conn, &new_feedback(r, rating)).unwrap();
        }
    }
}

fn dec(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, day).unwrap()
}

#[test]
fn summary_over_a_day_for_one_book() {
    let mut conn = test_db();
    seed(&mut conn);

    let window = day_window(dec(11));
    let summary = analytics_summary(&conn, &window, Some("robotics"), &AnalyticsConfig::default()).unwrap();

    assert_eq!(summary.total_queries, 3);
    assert_eq!(summary.unique_users, 2);
    // sorted latencies [400, 800, 1200]: floor(3 * 0.5) = 1
    assert_eq!(summary.latency_p50, 800);
    assert_eq!(summary.latency_p99, 1200);
    // 2 of 3 responses rated, 1 of 2 helpful
    assert!((summary.feedback_rate - 66.666).abs() < 0.01);
    assert_eq!(summary.positive_feedback_rate, Some(50.0));
    assert!((summary.average_confidence - 0.8).abs() < 1e-9);
    // floor(3 * 2.5)
    assert_eq!(summary.time_saved_minutes, 7);
    assert_eq!(summary.top_topics[0].topic, "Inverse Kinematics");
    assert_eq!(summary.top_topics[0].count, 2);
}

#[test]
fn summary_without_book_covers_everything_in_window() {
    let mut conn = test_db();
    seed(&mut conn);

    let window = TimeWindow::new(at(11, 0), at(13, 0)).unwrap();
    let summary = analytics_summary(&conn, &window, None, &AnalyticsConfig::default()).unwrap();
    assert_eq!(summary.total_queries, 5);
    assert_eq!(summary.unique_users, 3);
    assert_eq!(summary.book_id, None);
}

#[test]
fn window_end_is_exclusive() {
    let mut conn = test_db();
    let q = book_query("What is a servo?", &user('z'), "robotics", Utc.with_ymd_and_hms(2025, 12, 12, 0, 0, 0).unwrap());
    record_query(&mut conn, &q).unwrap();

    let day11 = analytics_summary(&conn, &day_window(dec(11)), None, &AnalyticsConfig::default()).unwrap();
    let day12 = analytics_summary(&conn, &day_window(dec(12)), None, &AnalyticsConfig::default()).unwrap();
    assert_eq!(day11.total_queries, 0);
    assert_eq!(day12.total_queries, 1);
}

#[test]
fn daily_aggregates_are_stored_and_listed() {
    let mut conn = test_db();
    seed(&mut conn);

    let stored = compute_daily_aggregates(&mut conn, dec(11), Some("robotics"), &AnalyticsConfig::default()).unwrap();
    let metrics: Vec<MetricName> = stored.iter().map(|a| a.metric_name).collect();
    assert!(metrics.contains(&MetricName::DailyQueryCount));
    assert!(metrics.contains(&MetricName::WeeklyAvgLatency));
    assert!(metrics.contains(&MetricName::TopQuestionTopics));
    assert!(metrics.contains(&MetricName::MonthlyFeedbackRate));
    assert!(metrics.contains(&MetricName::HourlyConcurrentUsers));

    let window = day_window(dec(11));
    let counts = list_aggregates(&conn, MetricName::DailyQueryCount, &window, BookScope::Book("robotics")).unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].metric_value["total_queries"], 3);
    assert_eq!(counts[0].metric_value["unique_users"], 2);
    assert_eq!(counts[0].time_period_start, window.start);
    assert_eq!(counts[0].time_period_end, window.end);

    let latency = list_aggregates(&conn, MetricName::WeeklyAvgLatency, &window, BookScope::Book("robotics")).unwrap();
    assert_eq!(latency[0].metric_value["p95"], 1200);

    let hourly = list_aggregates(&conn, MetricName::HourlyConcurrentUsers, &window, BookScope::Book("robotics")).unwrap();
    // hour 9: user a; hour 14: user b. Ties go to the earlier hour.
    assert_eq!(hourly[0].metric_value["peak_users"], 1);
    assert_eq!(hourly[0].metric_value["peak_hour"], 9);

    // Nothing global was written.
    assert!(list_aggregates(&conn, MetricName::DailyQueryCount, &window, BookScope::Global).unwrap().is_empty());
}

#[test]
fn recomputing_a_day_replaces_previous_rollups() {
    let mut conn = test_db();
    seed(&mut conn);
    let config = AnalyticsConfig::default();

    let first = compute_daily_aggregates(&mut conn, dec(11), None, &config).unwrap();
    let second = compute_daily_aggregates(&mut conn, dec(11), None, &config).unwrap();
    assert_eq!(first.len(), second.len());

    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM analytics_aggregates", [], |r| r.get(0))
        .unwrap();
    assert_eq!(total as usize, second.len());

    let counts = list_aggregates(&conn, MetricName::DailyQueryCount, &day_window(dec(11)), BookScope::Global).unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].metric_value["total_queries"], 4);
}

#[test]
fn day_without_responses_skips_feedback_rate() {
    let mut conn = test_db();
    record_query(&mut conn, &book_query("What is a gripper?", &user('q'), "robotics", at(20, 8))).unwrap();

    let stored = compute_daily_aggregates(&mut conn, dec(20), None, &AnalyticsConfig::default()).unwrap();
    let metrics: Vec<MetricName> = stored.iter().map(|a| a.metric_name).collect();
    assert!(metrics.contains(&MetricName::DailyQueryCount));
    assert!(!metrics.contains(&MetricName::MonthlyFeedbackRate));
    // no responses, so latency percentiles are zero
    let latency = stored.iter().find(|a| a.metric_name == MetricName::WeeklyAvgLatency).unwrap();
    assert_eq!(latency.metric_value["p50"], 0);
}
