//! Domain core for temporary unit holds.
//!
//! Zero I/O: the lock registry, session tracking, intent de-duplication,
//! expiry policy and the realtime wire protocol live here so that the
//! coordinator server and the browser-side client share one definition.

pub mod dedup;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod sessions;
pub mod sweep;
pub mod types;
pub mod unit;
