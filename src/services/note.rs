//! Student notes service — saved canvas snapshots.
//!
//! Canvas payloads and thumbnails are stored as opaque text (the client
//! sends serialized canvas JSON and a data-URL thumbnail). List queries
//! deliberately skip `canvas_data`, which can run to megabytes; the
//! full payload is fetched one note at a time on the view path.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error("note not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Parameters for saving a note.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub student_email: String,
    pub student_display_name: String,
    pub room_code: String,
    pub title: String,
    pub canvas_data: String,
    pub thumbnail: Option<String>,
}

/// Listing row: everything but the canvas payload.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NoteSummary {
    pub id: Uuid,
    pub student_email: String,
    pub student_display_name: String,
    pub room_code: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub created_at_ms: i64,
}

/// Full note row, including the canvas payload.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NoteRow {
    pub id: Uuid,
    pub student_email: String,
    pub student_display_name: String,
    pub room_code: String,
    pub title: String,
    pub canvas_data: String,
    pub thumbnail: Option<String>,
    pub created_at_ms: i64,
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Insert a note and return its id.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn save(pool: &PgPool, new: &NewNote) -> Result<Uuid, NoteError> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO student_notes (id, student_email, student_display_name, room_code, title, canvas_data, thumbnail)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(id)
    .bind(&new.student_email)
    .bind(&new.student_display_name)
    .bind(&new.room_code)
    .bind(&new.title)
    .bind(&new.canvas_data)
    .bind(&new.thumbnail)
    .execute(pool)
    .await?;

    info!(%id, student = %new.student_email, room = %new.room_code, "note saved");
    Ok(id)
}

/// List a student's notes, newest first, without canvas payloads.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_for_student(pool: &PgPool, student_email: &str) -> Result<Vec<NoteSummary>, NoteError> {
    let rows = sqlx::query_as::<_, (Uuid, String, String, String, String, Option<String>, i64)>(
        "SELECT id, student_email, student_display_name, room_code, title, thumbnail,
                (EXTRACT(EPOCH FROM created_at) * 1000)::BIGINT
         FROM student_notes
         WHERE student_email = $1
         ORDER BY created_at DESC",
    )
    .bind(student_email)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, student_email, student_display_name, room_code, title, thumbnail, created_at_ms)| NoteSummary {
            id,
            student_email,
            student_display_name,
            room_code,
            title,
            thumbnail,
            created_at_ms,
        })
        .collect())
}

/// Fetch one note with its full canvas payload.
///
/// # Errors
///
/// Returns [`NoteError::NotFound`] for an unknown id, or a database
/// error if the query fails.
pub async fn view(pool: &PgPool, note_id: Uuid) -> Result<NoteRow, NoteError> {
    let row = sqlx::query_as::<_, (Uuid, String, String, String, String, String, Option<String>, i64)>(
        "SELECT id, student_email, student_display_name, room_code, title, canvas_data, thumbnail,
                (EXTRACT(EPOCH FROM created_at) * 1000)::BIGINT
         FROM student_notes
         WHERE id = $1",
    )
    .bind(note_id)
    .fetch_optional(pool)
    .await?
    .ok_or(NoteError::NotFound(note_id))?;

    let (id, student_email, student_display_name, room_code, title, canvas_data, thumbnail, created_at_ms) = row;
    Ok(NoteRow {
        id,
        student_email,
        student_display_name,
        room_code,
        title,
        canvas_data,
        thumbnail,
        created_at_ms,
    })
}

/// Delete one note.
///
/// # Errors
///
/// Returns [`NoteError::NotFound`] for an unknown id, or a database
/// error if the delete fails.
pub async fn delete(pool: &PgPool, note_id: Uuid) -> Result<(), NoteError> {
    let result = sqlx::query("DELETE FROM student_notes WHERE id = $1")
        .bind(note_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(NoteError::NotFound(note_id));
    }

    info!(%note_id, "note deleted");
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
