//! WebSocket side of the realtime listener: the upgrade handler and the
//! registry of live connections.

mod handler;
pub mod manager;

pub use handler::ws_handler;
pub use manager::WsManager;
