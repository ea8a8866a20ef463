//! User feedback on responses. Arrives asynchronously, at most once per response.

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::types::{format_timestamp, parse_enum, parse_timestamp, parse_uuid, NewFeedback, UserFeedback};
use super::validate;
use crate::error::{LedgerError, Result, WriteTarget};

/// Attach a helpful / not-helpful verdict to a response.
pub fn record_feedback(conn: &mut Connection, feedback: &NewFeedback) -> Result<Uuid> {
    validate::max_length("comment", feedback.comment.as_deref(), validate::COMMENT_MAX)?;

    let id = Uuid::now_v7();
    let response_id = feedback.response_id.to_string();
    let timestamp = format_timestamp(&feedback.timestamp.unwrap_or_else(chrono::Utc::now));

    let target = WriteTarget {
        entity: "feedback",
        key: &response_id,
        parent: "response",
        parent_id: &response_id,
    };

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO user_feedbacks (feedback_id, response_id, rating, comment, timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id.to_string(),
            response_id,
            feedback.rating.as_str(),
            feedback.comment,
            timestamp,
        ],
    )
    .map_err(|e| target.classify(e))?;
    tx.commit()?;

    tracing::info!(
        feedback_id = %id,
        response_id = %feedback.response_id,
        rating = %feedback.rating,
        "recorded feedback"
    );
    Ok(id)
}

fn row_to_feedback(row: &Row) -> rusqlite::Result<UserFeedback> {
    Ok(UserFeedback {
        feedback_id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        response_id: parse_uuid(1, &row.get::<_, String>(1)?)?,
        rating: parse_enum(2, &row.get::<_, String>(2)?)?,
        comment: row.get(3)?,
        timestamp: parse_timestamp(4, &row.get::<_, String>(4)?)?,
    })
}

pub fn get_feedback(conn: &Connection, feedback_id: Uuid) -> Result<UserFeedback> {
    conn.query_row(
        "SELECT feedback_id, response_id, rating, comment, timestamp \
         FROM user_feedbacks WHERE feedback_id = ?1",
        params![feedback_id.to_string()],
        row_to_feedback,
    )
    .optional()?
    .ok_or_else(|| LedgerError::NotFound {
        entity: "feedback",
        id: feedback_id.to_string(),
    })
}

/// Feedback left on a response, if any.
pub fn feedback_for_response(conn: &Connection, response_id: Uuid) -> Result<Option<UserFeedback>> {
    Ok(conn
        .query_row(
            "SELECT feedback_id, response_id, rating, comment, timestamp \
             FROM user_feedbacks WHERE response_id = ?1",
            params![response_id.to_string()],
            row_to_feedback,
        )
        .optional()?)
}
