//! Session REST routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::session::{self, NewSession, SessionRow};
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 200;

#[derive(Deserialize)]
pub struct CreateSessionBody {
    pub room_code: String,
    pub teacher_email: String,
    pub teacher_name: String,
    pub topic: Option<String>,
    pub difficulty: Option<String>,
    pub max_students: Option<i32>,
}

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub room_code: String,
}

/// `POST /api/sessions` — open a session record for a room.
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), StatusCode> {
    if body.room_code.is_empty() || body.teacher_email.is_empty() || body.teacher_name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let new = NewSession {
        room_code: body.room_code,
        teacher_email: body.teacher_email,
        teacher_name: body.teacher_name,
        topic: body.topic.unwrap_or_default(),
        difficulty: body.difficulty.unwrap_or_else(|| "Medium".to_owned()),
        max_students: body.max_students.unwrap_or(30),
    };

    let session_id = session::create(&state.pool, &new)
        .await
        .map_err(session_error_to_status)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id, room_code: new.room_code }),
    ))
}

#[derive(Deserialize)]
pub struct EndSessionBody {
    pub room_code: String,
    pub total_students: Option<i32>,
}

#[derive(Serialize)]
pub struct EndSessionResponse {
    pub duration: i32,
}

/// `POST /api/sessions/end` — close the active session for a room.
pub async fn end_session(
    State(state): State<AppState>,
    Json(body): Json<EndSessionBody>,
) -> Result<Json<EndSessionResponse>, StatusCode> {
    if body.room_code.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let duration = session::end(&state.pool, &body.room_code, body.total_students.unwrap_or(0))
        .await
        .map_err(session_error_to_status)?;

    Ok(Json(EndSessionResponse { duration }))
}

#[derive(Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub sessions: Vec<SessionRow>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// `GET /api/sessions/history/{teacher_email}` — page through a
/// teacher's sessions, newest first.
pub async fn session_history(
    State(state): State<AppState>,
    Path(teacher_email): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, StatusCode> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let page = session::history(&state.pool, &teacher_email, limit, offset)
        .await
        .map_err(session_error_to_status)?;

    Ok(Json(HistoryResponse { sessions: page.sessions, total: page.total, limit, offset }))
}

pub(crate) fn session_error_to_status(err: session::SessionError) -> StatusCode {
    match err {
        session::SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        session::SessionError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;
