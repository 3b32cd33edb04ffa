use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use holdmap_api::app;
use holdmap_api::config::ServerConfig;
use holdmap_api::listener;
use holdmap_api::state::AppState;

/// How long each task gets to wind down after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "holdmap_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        realtime_port = config.realtime_port,
        hold_ttl_secs = config.hold_ttl.as_secs(),
        "Loaded server configuration"
    );

    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;

    // --- Realtime listener (port chosen at runtime) ---
    let realtime_listener =
        listener::bind_with_fallback(host, config.realtime_port, config.realtime_port_attempts)
            .await
            .context("Failed to bind the realtime listener")?;
    let realtime_addr = realtime_listener.local_addr()?;
    tracing::info!(%realtime_addr, "Realtime listener bound");

    // --- App state ---
    let http_addr = SocketAddr::new(host, config.port);
    let state = AppState::new(config, realtime_addr.port());
    let ws_manager = state.ws_manager.clone();

    // --- Background tasks ---
    let cancel = CancellationToken::new();
    let tasks = app::spawn_background_tasks(&state, &cancel);

    // --- Servers ---
    let http_app = app::http_app(state.clone())?;
    let realtime_app = app::realtime_app(state);

    let http_listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("Failed to bind to {http_addr}"))?;
    tracing::info!(%http_addr, "Starting HTTP server");

    let http_shutdown = cancel.clone();
    let http_server = tokio::spawn(async move {
        axum::serve(http_listener, http_app)
            .with_graceful_shutdown(http_shutdown.cancelled_owned())
            .await
    });
    let realtime_shutdown = cancel.clone();
    let realtime_server = tokio::spawn(async move {
        axum::serve(realtime_listener, realtime_app)
            .with_graceful_shutdown(realtime_shutdown.cancelled_owned())
            .await
    });

    shutdown_signal().await;

    // --- Post-shutdown cleanup ---
    cancel.cancel();
    tracing::info!("Stopped accepting connections, cleaning up");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining realtime connections");
    ws_manager.shutdown_all().await;

    tasks.join(SHUTDOWN_GRACE).await;
    tracing::info!("Background tasks stopped");

    for (name, server) in [("http", http_server), ("realtime", realtime_server)] {
        match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::error!(server = name, error = %e, "Server error"),
            Ok(Err(e)) => tracing::error!(server = name, error = %e, "Server task failed"),
            Err(_) => tracing::warn!(server = name, "Server did not stop in time"),
        }
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
