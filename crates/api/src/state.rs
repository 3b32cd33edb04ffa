use std::sync::Arc;

use holdmap_core::types::Timestamp;

use crate::config::ServerConfig;
use crate::coordinator::Coordinator;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is `Copy`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Realtime connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Single-writer owner of all hold state.
    pub coordinator: Arc<Coordinator>,
    /// Port the realtime listener actually bound.
    pub realtime_port: u16,
    pub started_at: Timestamp,
}

impl AppState {
    /// Build the state graph from configuration.
    pub fn new(config: ServerConfig, realtime_port: u16) -> Self {
        let ws_manager = Arc::new(WsManager::new());
        let coordinator = Arc::new(Coordinator::from_config(Arc::clone(&ws_manager), &config));
        Self {
            config: Arc::new(config),
            ws_manager,
            coordinator,
            realtime_port,
            started_at: chrono::Utc::now(),
        }
    }
}
