//! The query ledger: one append-only record per question/answer round trip.
//!
//! Control flow mirrors the request path: a [`query`] row is written first,
//! then its [`retrieval`] and [`response`] rows; [`feedback`] attaches later,
//! if ever; [`aggregate`] rows are derived out of band.

pub mod aggregate;
pub mod feedback;
pub mod query;
pub mod response;
pub mod retrieval;
pub mod types;
pub mod validate;

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use types::{NewQuery, NewResponse, NewRetrieval};

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}

/// A full synchronous round trip: the question, what was retrieved, what was answered.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub query: NewQuery,
    /// Chunk ids, scores and parameters; `query_id` is filled in from the new query.
    pub retrieval: Option<NewRetrieval>,
    /// `query_id` is filled in from the new query.
    pub response: NewResponse,
}

/// Ids assigned by [`log_interaction`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InteractionIds {
    pub query_id: Uuid,
    pub context_id: Option<Uuid>,
    pub response_id: Uuid,
}

/// Write query, retrieval and response in one transaction.
///
/// Either all three rows are stored or none is.
pub fn log_interaction(conn: &mut Connection, interaction: &Interaction) -> Result<InteractionIds> {
    let tx = conn.transaction()?;

    let query_id = query::insert_query(&tx, &interaction.query)?;

    let context_id = match &interaction.retrieval {
        Some(retrieval) => {
            let retrieval = NewRetrieval {
                query_id,
                ..retrieval.clone()
            };
            Some(retrieval::insert_retrieval(&tx, &retrieval)?)
        }
        None => None,
    };

    let response = NewResponse {
        query_id,
        ..interaction.response.clone()
    };
    let response_id = response::insert_response(&tx, &response)?;

    tx.commit()?;

    tracing::info!(
        query_id = %query_id,
        response_id = %response_id,
        latency_ms = response.latency_ms,
        "logged interaction"
    );
    Ok(InteractionIds {
        query_id,
        context_id,
        response_id,
    })
}
