#![allow(dead_code)]

use axum::body::Body;
use axum::extract::ws::Message;
use axum::http::{Request, Response};
use axum::Router;
use holdmap_core::protocol::{parse_server_message, ServerMessage};
use holdmap_core::unit::{Unit, UnitStatus, DEFAULT_RADIUS};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use holdmap_api::app;
use holdmap_api::config::ServerConfig;
use holdmap_api::state::AppState;

/// Build a test `ServerConfig` bound to localhost with OS-assigned ports.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        realtime_port: 0,
        ..ServerConfig::default()
    }
}

/// Build the main HTTP application with the production middleware stack.
///
/// `realtime_port` is what `/api/v1/realtime` reports.
pub fn build_test_app(realtime_port: u16) -> (Router, AppState) {
    let state = AppState::new(test_config(), realtime_port);
    let app = app::http_app(state.clone()).expect("test config has valid CORS origins");
    (app, state)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn unit(id: &str) -> Unit {
    Unit {
        id: id.to_string(),
        name: id.trim_start_matches("U-").to_string(),
        x: 100.0,
        y: 200.0,
        r: DEFAULT_RADIUS,
        status: UnitStatus::Available,
        held_by: None,
        held_at: None,
        monthly_price: 4500.0,
        daily_price: 150.0,
    }
}

/// An intent to hold `id` as `holder`.
pub fn hold_intent(id: &str, holder: &str, at: i64) -> Unit {
    unit(id).held(holder, at)
}

/// An intent to release `id` back to `status`.
pub fn release_intent(id: &str, status: UnitStatus) -> Unit {
    unit(id).released(status)
}

/// Pop the next queued frame and decode it as a server message.
pub fn next_message(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<ServerMessage> {
    match rx.try_recv().ok()? {
        Message::Text(text) => Some(parse_server_message(text.as_str()).unwrap()),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

/// Drain every queued frame.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<ServerMessage> {
    std::iter::from_fn(|| next_message(rx)).collect()
}
