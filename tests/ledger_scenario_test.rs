mod helpers;

use helpers::{count, new_feedback, new_query, new_response, new_retrieval, test_db, user};
use ragledger::error::LedgerError;
use ragledger::ledger::feedback::{feedback_for_response, record_feedback};
use ragledger::ledger::query::{get_query, get_query_embedding, record_query};
use ragledger::ledger::response::{record_response, response_for_query};
use ragledger::ledger::retrieval::{record_retrieval, retrievals_for_query};
use ragledger::ledger::types::{NewRetrieval, QueryMode, Rating};
use uuid::Uuid;

#[test]
fn full_round_trip_scenario() {
    let mut conn = test_db();

    let q1 = record_query(&mut conn, &new_query("What is AI?", &user('0'))).unwrap();

    let c1 = Uuid::now_v7();
    let c2 = Uuid::now_v7();
    record_retrieval(
        &mut conn,
        &NewRetrieval {
            query_id: q1,
            chunk_ids: vec![c1, c2],
            similarity_scores: vec![0.9, 0.8],
            retrieval_params: serde_json::json!({"top_k": 2}),
            timestamp: None,
        },
    )
    .unwrap();

    let r1 = record_response(&mut conn, &new_response(q1, 60, 500)).unwrap();

    let err = record_response(&mut conn, &new_response(q1, 60, 500)).unwrap_err();
    assert!(matches!(err, LedgerError::Duplicate { entity: "response", .. }));
    assert_eq!(err.code(), "DUPLICATE_ERROR");

    record_feedback(&mut conn, &new_feedback(r1, Rating::Helpful)).unwrap();
    let err = record_feedback(&mut conn, &new_feedback(r1, Rating::NotHelpful)).unwrap_err();
    assert_eq!(err.code(), "DUPLICATE_ERROR");

    // The first feedback survives untouched.
    let stored = feedback_for_response(&conn, r1).unwrap().unwrap();
    assert_eq!(stored.rating, Rating::Helpful);

    let retrievals = retrievals_for_query(&conn, q1).unwrap();
    assert_eq!(retrievals.len(), 1);
    assert_eq!(retrievals[0].chunk_ids, vec![c1, c2]);
    assert_eq!(retrievals[0].similarity_scores, vec![0.9, 0.8]);

    let response = response_for_query(&conn, q1).unwrap().unwrap();
    assert_eq!(response.response_id, r1);
    assert_eq!(response.latency_ms, 500);
    assert_eq!(count(&conn, "query_responses"), 1);
}

#[test]
fn query_text_bounds() {
    let mut conn = test_db();

    let err = record_query(&mut conn, &new_query("", &user('a'))).unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let err = record_query(&mut conn, &new_query(&"x".repeat(501), &user('a'))).unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    record_query(&mut conn, &new_query("x", &user('a'))).unwrap();
    record_query(&mut conn, &new_query(&"x".repeat(500), &user('a'))).unwrap();
    assert_eq!(count(&conn, "queries"), 2);
}

#[test]
fn user_id_must_be_64_chars() {
    let mut conn = test_db();
    for bad in ["".to_string(), "a".repeat(63), "a".repeat(65)] {
        let err = record_query(&mut conn, &new_query("What is AI?", &bad)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR", "user_id of length {}", bad.len());
    }
    assert_eq!(count(&conn, "queries"), 0);
}

#[test]
fn query_round_trips_with_embedding_and_mode() {
    let mut conn = test_db();
    let mut query = new_query("Explain this passage", &user('b'));
    query.selected_text = Some("Backpropagation computes gradients layer by layer.".into());
    let id = record_query(&mut conn, &query).unwrap();

    let stored = get_query(&conn, id).unwrap();
    assert_eq!(stored.query_text, "Explain this passage");
    assert_eq!(stored.query_mode, QueryMode::SelectedText);

    let embedding = get_query_embedding(&conn, id).unwrap();
    assert_eq!(embedding, query.embedding);
}

#[test]
fn retrieval_cardinality_rules() {
    let mut conn = test_db();
    let q = record_query(&mut conn, &new_query("What is AI?", &user('c'))).unwrap();

    let mut mismatched = new_retrieval(q, 3);
    mismatched.similarity_scores.pop();
    assert_eq!(record_retrieval(&mut conn, &mismatched).unwrap_err().code(), "VALIDATION_ERROR");

    assert_eq!(record_retrieval(&mut conn, &new_retrieval(q, 0)).unwrap_err().code(), "VALIDATION_ERROR");
    assert_eq!(record_retrieval(&mut conn, &new_retrieval(q, 11)).unwrap_err().code(), "VALIDATION_ERROR");

    record_retrieval(&mut conn, &new_retrieval(q, 1)).unwrap();
    record_retrieval(&mut conn, &new_retrieval(q, 10)).unwrap();
    assert_eq!(retrievals_for_query(&conn, q).unwrap().len(), 2);
}

#[test]
fn children_require_existing_parents() {
    let mut conn = test_db();
    let ghost = Uuid::now_v7();

    let err = record_retrieval(&mut conn, &new_retrieval(ghost, 2)).unwrap_err();
    assert!(matches!(err, LedgerError::Referential { parent: "query", .. }));

    let err = record_response(&mut conn, &new_response(ghost, 60, 500)).unwrap_err();
    assert_eq!(err.code(), "REFERENTIAL_ERROR");

    let err = record_feedback(&mut conn, &new_feedback(ghost, Rating::Helpful)).unwrap_err();
    assert_eq!(err.code(), "REFERENTIAL_ERROR");

    assert_eq!(count(&conn, "retrieved_contexts"), 0);
    assert_eq!(count(&conn, "query_responses"), 0);
    assert_eq!(count(&conn, "user_feedbacks"), 0);
}

#[test]
fn response_bounds() {
    let mut conn = test_db();
    let q = record_query(&mut conn, &new_query("What is AI?", &user('d'))).unwrap();

    for (len, latency) in [(49, 500), (2001, 500), (60, 99), (60, 10_001)] {
        let err = record_response(&mut conn, &new_response(q, len, latency)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR", "len={len} latency={latency}");
    }

    let mut bad_confidence = new_response(q, 60, 500);
    bad_confidence.confidence_score = Some(1.5);
    assert_eq!(record_response(&mut conn, &bad_confidence).unwrap_err().code(), "VALIDATION_ERROR");

    // Boundary values are accepted.
    record_response(&mut conn, &new_response(q, 50, 100)).unwrap();
}
