//! Integration tests for the HTTP endpoints on the main listener.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, hold_intent};

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let (app, _state) = build_test_app(8080);
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["startedAt"].is_string());
    assert!(json["uptimeSecs"].as_i64().is_some_and(|s| s >= 0));
    assert_eq!(json["connectedClients"], 0);
}

// ---------------------------------------------------------------------------
// Test: responses carry a request id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn responses_carry_request_id() {
    let (app, _state) = build_test_app(8080);
    let response = get(app, "/health").await;

    assert!(response.headers().contains_key("x-request-id"));
}

// ---------------------------------------------------------------------------
// Test: GET /api/v1/realtime reports the bound realtime port
// ---------------------------------------------------------------------------

#[tokio::test]
async fn realtime_status_reports_port_and_clients() {
    let (app, state) = build_test_app(8093);
    let _rx = state.coordinator.connect("conn-a".into()).await;

    let json = body_json(get(app, "/api/v1/realtime").await).await;

    assert_eq!(json["status"], "running");
    assert_eq!(json["port"], 8093);
    assert_eq!(json["connectedClients"], 1);
}

// ---------------------------------------------------------------------------
// Test: GET /api/v1/holds lists active holds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_holds_returns_snapshot_entries() {
    let (app, state) = build_test_app(8080);
    let _rx = state.coordinator.connect("conn-a".into()).await;
    state
        .coordinator
        .handle_intent("conn-a", hold_intent("U-101", "Tiger42", 1), 5_000)
        .await;

    let response = get(app, "/api/v1/holds").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(
        json["data"],
        serde_json::json!([{"unitId": "U-101", "holderIdentity": "Tiger42", "heldAt": 5000}])
    );
}

// ---------------------------------------------------------------------------
// Test: GET /api/v1/holds/{unit_id} returns 404 for a free unit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_hold_for_free_unit_is_not_found() {
    let (app, _state) = build_test_app(8080);
    let response = get(app, "/api/v1/holds/U-404").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn get_hold_returns_entry() {
    let (app, state) = build_test_app(8080);
    let _rx = state.coordinator.connect("conn-a".into()).await;
    state
        .coordinator
        .handle_intent("conn-a", hold_intent("U-7", "Wolf7", 1), 42)
        .await;

    let json = body_json(get(app, "/api/v1/holds/U-7").await).await;

    assert_eq!(json["data"]["holderIdentity"], "Wolf7");
    assert_eq!(json["data"]["heldAt"], 42);
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let (app, _state) = build_test_app(8080);
    let response = get(app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
