//! Boundary checks applied before any row is written.
//!
//! These mirror the CHECK constraints in the DDL so callers get a precise
//! field-level error; the DDL remains the backstop. Lengths are counted in
//! Unicode scalar values, which is what SQLite's `length()` returns for TEXT.

use crate::db::schema::EMBEDDING_DIMENSIONS;
use crate::error::{LedgerError, Result};

pub const QUERY_TEXT_MAX: usize = 500;
pub const USER_ID_LEN: usize = 64;
pub const IP_HASH_MAX: usize = 64;
pub const SELECTED_TEXT_MAX: usize = 1000;
pub const MAX_CHUNKS: usize = 10;
pub const RESPONSE_TEXT_MIN: usize = 50;
pub const RESPONSE_TEXT_MAX: usize = 2000;
pub const LATENCY_MIN_MS: u32 = 100;
pub const LATENCY_MAX_MS: u32 = 10_000;
pub const COMMENT_MAX: usize = 500;
pub const REFUSAL_REASON_MAX: usize = 500;
pub const BOOK_ID_MAX: usize = 100;

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub(crate) fn text_length(field: &'static str, text: &str, min: usize, max: usize) -> Result<()> {
    let len = char_len(text);
    if len < min || len > max {
        return Err(LedgerError::validation(
            field,
            format!("length {len} outside {min}..={max}"),
        ));
    }
    Ok(())
}

pub(crate) fn max_length(field: &'static str, text: Option<&str>, max: usize) -> Result<()> {
    match text {
        Some(t) => text_length(field, t, 0, max),
        None => Ok(()),
    }
}

/// Trim surrounding whitespace and enforce 1..=500 characters.
pub(crate) fn query_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation(
            "query_text",
            "cannot be empty or just whitespace",
        ));
    }
    text_length("query_text", trimmed, 1, QUERY_TEXT_MAX)?;
    Ok(trimmed.to_string())
}

pub(crate) fn user_id(id: &str) -> Result<()> {
    let len = char_len(id);
    if len != USER_ID_LEN {
        return Err(LedgerError::validation(
            "user_id",
            format!("must be exactly {USER_ID_LEN} characters, got {len}"),
        ));
    }
    Ok(())
}

pub(crate) fn embedding(values: &[f32]) -> Result<()> {
    if values.len() != EMBEDDING_DIMENSIONS {
        return Err(LedgerError::validation(
            "query_embedding",
            format!("expected {EMBEDDING_DIMENSIONS} dimensions, got {}", values.len()),
        ));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(LedgerError::validation("query_embedding", "contains non-finite values"));
    }
    Ok(())
}

pub(crate) fn retrieval_lists(chunk_count: usize, score_count: usize, scores: &[f64]) -> Result<()> {
    if chunk_count == 0 || chunk_count > MAX_CHUNKS {
        return Err(LedgerError::validation(
            "chunk_ids",
            format!("expected 1..={MAX_CHUNKS} chunks, got {chunk_count}"),
        ));
    }
    if chunk_count != score_count {
        return Err(LedgerError::validation(
            "similarity_scores",
            format!("{score_count} scores for {chunk_count} chunks"),
        ));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(LedgerError::validation("similarity_scores", "contains non-finite values"));
    }
    Ok(())
}

pub(crate) fn latency(ms: u32) -> Result<()> {
    if !(LATENCY_MIN_MS..=LATENCY_MAX_MS).contains(&ms) {
        return Err(LedgerError::validation(
            "latency_ms",
            format!("{ms} outside {LATENCY_MIN_MS}..={LATENCY_MAX_MS}"),
        ));
    }
    Ok(())
}

pub(crate) fn confidence(score: Option<f64>) -> Result<()> {
    match score {
        Some(s) if !(0.0..=1.0).contains(&s) => Err(LedgerError::validation(
            "confidence_score",
            format!("{s} outside 0.0..=1.0"),
        )),
        _ => Ok(()),
    }
}
