//! Student notes REST routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::note::{self, NewNote, NoteRow, NoteSummary};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SaveNoteBody {
    pub student_email: String,
    pub student_display_name: Option<String>,
    pub room_code: String,
    pub canvas_data: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Serialize)]
pub struct SaveNoteResponse {
    pub note_id: Uuid,
}

/// `POST /api/notes` — save a canvas snapshot.
pub async fn save_note(
    State(state): State<AppState>,
    Json(body): Json<SaveNoteBody>,
) -> Result<(StatusCode, Json<SaveNoteResponse>), StatusCode> {
    if body.student_email.is_empty() || body.room_code.is_empty() || body.canvas_data.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let title = note_title(body.title, &body.room_code);
    let display_name = display_name(body.student_display_name, &body.student_email);

    let new = NewNote {
        student_email: body.student_email,
        student_display_name: display_name,
        room_code: body.room_code,
        title,
        canvas_data: body.canvas_data,
        thumbnail: body.thumbnail,
    };

    let note_id = note::save(&state.pool, &new)
        .await
        .map_err(note_error_to_status)?;

    Ok((StatusCode::CREATED, Json(SaveNoteResponse { note_id })))
}

#[derive(Serialize)]
pub struct NoteListResponse {
    pub notes: Vec<NoteSummary>,
}

/// `GET /api/notes/{student_email}` — list a student's notes without
/// canvas payloads.
pub async fn list_notes(
    State(state): State<AppState>,
    Path(student_email): Path<String>,
) -> Result<Json<NoteListResponse>, StatusCode> {
    let notes = note::list_for_student(&state.pool, &student_email)
        .await
        .map_err(note_error_to_status)?;
    Ok(Json(NoteListResponse { notes }))
}

#[derive(Serialize)]
pub struct NoteViewResponse {
    pub note: NoteRow,
}

/// `GET /api/notes/view/{note_id}` — fetch one note with its full
/// canvas payload.
pub async fn view_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
) -> Result<Json<NoteViewResponse>, StatusCode> {
    let note = note::view(&state.pool, note_id)
        .await
        .map_err(note_error_to_status)?;
    Ok(Json(NoteViewResponse { note }))
}

/// `DELETE /api/notes/{note_id}` — delete one note.
pub async fn delete_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    note::delete(&state.pool, note_id)
        .await
        .map_err(note_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub(crate) fn note_error_to_status(err: note::NoteError) -> StatusCode {
    match err {
        note::NoteError::NotFound(_) => StatusCode::NOT_FOUND,
        note::NoteError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn note_title(title: Option<String>, room_code: &str) -> String {
    title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("Note from {room_code}"))
}

/// Fall back to the email local part when no display name is supplied.
fn display_name(name: Option<String>, email: &str) -> String {
    name.filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_owned())
}

#[cfg(test)]
#[path = "notes_test.rs"]
mod tests;
