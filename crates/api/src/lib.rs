//! Holdmap realtime coordinator library.
//!
//! Exposes the building blocks (config, state, coordinator, routes,
//! WebSocket infrastructure) so integration tests and the binary entrypoint
//! can both access them.

pub mod app;
pub mod background;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod listener;
pub mod response;
pub mod routes;
pub mod state;
pub mod ws;
