//! Chalkboard — real-time collaborative classroom server.
//!
//! Library target exists so integration tests can assemble the router
//! against an ephemeral listener; the binary in `main.rs` is the only
//! production entry point.

pub mod db;
pub mod event;
pub mod rate_limit;
pub mod routes;
pub mod services;
pub mod state;
