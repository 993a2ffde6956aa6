//! Contract tests for `RestStore` against a PostgREST-style API.
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | GET    | `/rest/v1/compliance_frameworks` | `select_*` |
//! | POST   | `/rest/v1/compliance_frameworks` | `insert_*` |
//! | PATCH  | `/rest/v1/compliance_frameworks` | `update_*` |
//! | POST   | `/rest/v1/compliance_requirements?on_conflict=..` | `upsert_*` |

use std::time::Duration;

use grc_import_core::store::{Query, RestStore, Row, Store, StoreError, Table};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn store(server: &MockServer) -> RestStore {
    RestStore::new(&server.uri(), Some("test-key"), Duration::from_secs(5)).unwrap()
}

fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn select_sends_filters_and_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/compliance_frameworks"))
        .and(query_param("select", "*"))
        .and(query_param("code", "ilike.ISO27001"))
        .and(query_param("limit", "1"))
        .and(header("apikey", "test-key"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "550e8400-e29b-41d4-a716-446655440000", "code": "ISO27001", "name": "ISO 27001" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = store(&server)
        .select(
            Table::Frameworks,
            &Query::new().eq_ignore_case("code", "ISO27001").limit(1),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "ISO 27001");
}

#[tokio::test]
async fn insert_asks_for_representation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/compliance_frameworks"))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!([{ "code": "ISO", "name": "ISO 27001" }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            { "id": "550e8400-e29b-41d4-a716-446655440000", "code": "ISO", "name": "ISO 27001" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let stored = store(&server)
        .insert(Table::Frameworks, row(json!({ "code": "ISO", "name": "ISO 27001" })))
        .await
        .unwrap();

    assert_eq!(stored["id"], "550e8400-e29b-41d4-a716-446655440000");
}

#[tokio::test]
async fn update_filters_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/compliance_frameworks"))
        .and(query_param("id", "eq.550e8400-e29b-41d4-a716-446655440000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "550e8400-e29b-41d4-a716-446655440000", "code": "ISO", "name": "Renamed" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let updated = store(&server)
        .update(
            Table::Frameworks,
            &Query::new().eq("id", "550e8400-e29b-41d4-a716-446655440000"),
            row(json!({ "name": "Renamed" })),
        )
        .await
        .unwrap();

    assert_eq!(updated[0]["name"], "Renamed");
}

#[tokio::test]
async fn upsert_merges_on_composite_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/compliance_requirements"))
        .and(query_param("on_conflict", "framework_id,requirement_code"))
        .and(|request: &Request| {
            request
                .headers
                .get("prefer")
                .and_then(|value| value.to_str().ok())
                == Some("resolution=merge-duplicates,return=representation")
        })
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            { "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7", "requirement_code": "A.1" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let stored = store(&server)
        .upsert(
            Table::Requirements,
            row(json!({ "framework_id": "f", "requirement_code": "A.1" })),
            &["framework_id", "requirement_code"],
        )
        .await
        .unwrap();

    assert_eq!(stored["requirement_code"], "A.1");
}

#[tokio::test]
async fn conflict_status_maps_to_conflict_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/compliance_frameworks"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key value"))
        .mount(&server)
        .await;

    let error = store(&server)
        .insert(Table::Frameworks, row(json!({ "code": "ISO" })))
        .await
        .unwrap_err();

    assert!(matches!(error, StoreError::Conflict { table: "compliance_frameworks", .. }));
}

#[tokio::test]
async fn service_error_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/risks"))
        .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
        .mount(&server)
        .await;

    let error = store(&server)
        .select(Table::Risks, &Query::new())
        .await
        .unwrap_err();

    match error {
        StoreError::Service { status, message, .. } => {
            assert_eq!(status, 401);
            assert_eq!(message, "JWT expired");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn non_object_rows_are_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/risks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2])))
        .mount(&server)
        .await;

    let error = store(&server)
        .select(Table::Risks, &Query::new())
        .await
        .unwrap_err();

    assert!(matches!(error, StoreError::MalformedRow { .. }));
}
