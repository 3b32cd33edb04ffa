//! Browser-side half of holdmap.
//!
//! A tab runs one [`adapter::RealtimeAdapter`] against the coordinator and
//! one [`session::BookingSession`] that merges the rental system's unit
//! matrix with live holds through the [`reconcile::ReconcileEngine`].

pub mod adapter;
pub mod client;
pub mod error;
pub mod events;
pub mod identity;
pub mod reconcile;
pub mod reconnect;
pub mod rental;
pub mod session;
