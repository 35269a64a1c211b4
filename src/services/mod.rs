//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation. `room` is the
//! real-time coordination core; `session` and `note` are durable-row
//! glue invoked only from the REST path.

pub mod note;
pub mod room;
pub mod session;
