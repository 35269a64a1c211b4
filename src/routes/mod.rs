//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the websocket relay and the REST surface (sessions, notes)
//! under a single Axum router. Clients are browser apps served from a
//! separate origin, so CORS is wide open; authentication happens
//! upstream and this server trusts the emails it is handed.

pub mod notes;
pub mod sessions;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ws", get(ws::handle_ws))
        .route("/api/sessions", post(sessions::create_session))
        .route("/api/sessions/end", post(sessions::end_session))
        .route("/api/sessions/history/{teacher_email}", get(sessions::session_history))
        .route("/api/notes", post(notes::save_note))
        // GET takes a student email, DELETE a note id; one Axum route
        // since the path shapes collide.
        .route("/api/notes/{key}", get(notes::list_notes).delete(notes::delete_note))
        .route("/api/notes/view/{note_id}", get(notes::view_note))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
