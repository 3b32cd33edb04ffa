//! Router assembly and background task wiring shared by the binary and the
//! integration tests.

use std::time::Duration;

use anyhow::Context;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::background;
use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;

/// Build the main HTTP application: `/health` plus the `/api/v1` tree,
/// wrapped in the standard middleware stack.
pub fn http_app(state: AppState) -> anyhow::Result<Router> {
    let cors = build_cors_layer(&state.config)?;
    let request_id_header = HeaderName::from_static("x-request-id");
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Ok(Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state))
}

/// Build the realtime application served on the dynamically chosen port.
///
/// No timeout layer: upgraded connections are long-lived.
pub fn realtime_app(state: AppState) -> Router {
    routes::realtime_routes()
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handles of the periodic tasks started by [`spawn_background_tasks`].
pub struct BackgroundTasks {
    pub sweeper: JoinHandle<()>,
    pub dedup_purge: JoinHandle<()>,
    pub heartbeat: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Wait for every task to finish, giving up on each after `grace`.
    pub async fn join(self, grace: Duration) {
        let _ = tokio::time::timeout(grace, self.sweeper).await;
        let _ = tokio::time::timeout(grace, self.dedup_purge).await;
        let _ = tokio::time::timeout(grace, self.heartbeat).await;
    }
}

/// Start the hold sweeper, the dedup purge and the heartbeat.
pub fn spawn_background_tasks(state: &AppState, cancel: &CancellationToken) -> BackgroundTasks {
    let config = &state.config;
    BackgroundTasks {
        sweeper: tokio::spawn(background::hold_sweeper::run(
            state.coordinator.clone(),
            config.sweep_interval,
            cancel.clone(),
        )),
        dedup_purge: tokio::spawn(background::dedup_purge::run(
            state.coordinator.clone(),
            config.dedup_purge_interval,
            cancel.clone(),
        )),
        heartbeat: tokio::spawn(background::heartbeat::run(
            state.ws_manager.clone(),
            background::heartbeat::HEARTBEAT_INTERVAL,
            cancel.clone(),
        )),
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Fails if any configured origin is not a valid header value.
pub fn build_cors_layer(config: &ServerConfig) -> anyhow::Result<CorsLayer> {
    let origins = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin '{o}'"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600)))
}
