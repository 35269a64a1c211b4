//! Session service — durable records of classroom sessions.
//!
//! DESIGN
//! ======
//! A session row is created when a teacher opens a room and closed when
//! they end it. Timestamps live entirely in Postgres (`NOW()`), and
//! rows come back with epoch-millisecond columns so no datetime crate
//! is needed on the Rust side. Ending a session computes the duration
//! in SQL from `started_at`, so a delayed end request still records the
//! real elapsed time.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no active session for room: {0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Parameters for creating a session row.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub room_code: String,
    pub teacher_email: String,
    pub teacher_name: String,
    pub topic: String,
    pub difficulty: String,
    pub max_students: i32,
}

/// Row returned from history queries. Timestamps are epoch millis.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionRow {
    pub id: Uuid,
    pub room_code: String,
    pub topic: String,
    pub difficulty: String,
    pub max_students: i32,
    pub total_students: Option<i32>,
    pub status: String,
    pub started_at_ms: i64,
    pub ended_at_ms: Option<i64>,
    pub duration_minutes: Option<i32>,
}

/// One page of a teacher's session history.
#[derive(Debug)]
pub struct SessionHistory {
    pub sessions: Vec<SessionRow>,
    pub total: i64,
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Insert an `active` session row and return its id.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create(pool: &PgPool, new: &NewSession) -> Result<Uuid, SessionError> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO sessions (id, room_code, teacher_email, teacher_name, topic, difficulty, max_students, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'active')",
    )
    .bind(id)
    .bind(&new.room_code)
    .bind(&new.teacher_email)
    .bind(&new.teacher_name)
    .bind(&new.topic)
    .bind(&new.difficulty)
    .bind(new.max_students)
    .execute(pool)
    .await?;

    info!(room = %new.room_code, teacher = %new.teacher_email, "session created");
    Ok(id)
}

/// Close the active session for a room, recording the headcount and the
/// elapsed minutes. Returns the computed duration.
///
/// # Errors
///
/// Returns [`SessionError::NotFound`] when the room has no active
/// session, or a database error if the update fails.
pub async fn end(pool: &PgPool, room_code: &str, total_students: i32) -> Result<i32, SessionError> {
    let duration = sqlx::query_scalar::<_, i32>(
        "UPDATE sessions
         SET status = 'ended',
             ended_at = NOW(),
             total_students = $2,
             duration_minutes = ROUND(EXTRACT(EPOCH FROM (NOW() - started_at)) / 60)::INT
         WHERE room_code = $1 AND status = 'active'
         RETURNING duration_minutes",
    )
    .bind(room_code)
    .bind(total_students)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| SessionError::NotFound(room_code.to_owned()))?;

    info!(room = %room_code, duration_minutes = duration, students = total_students, "session ended");
    Ok(duration)
}

/// Page through a teacher's sessions, newest first.
///
/// # Errors
///
/// Returns a database error if either query fails.
pub async fn history(
    pool: &PgPool,
    teacher_email: &str,
    limit: i64,
    offset: i64,
) -> Result<SessionHistory, SessionError> {
    let rows = sqlx::query_as::<
        _,
        (Uuid, String, String, String, i32, Option<i32>, String, i64, Option<i64>, Option<i32>),
    >(
        "SELECT id, room_code, topic, difficulty, max_students, total_students, status,
                (EXTRACT(EPOCH FROM started_at) * 1000)::BIGINT,
                (EXTRACT(EPOCH FROM ended_at) * 1000)::BIGINT,
                duration_minutes
         FROM sessions
         WHERE teacher_email = $1
         ORDER BY started_at DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(teacher_email)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions WHERE teacher_email = $1")
        .bind(teacher_email)
        .fetch_one(pool)
        .await?;

    let sessions = rows
        .into_iter()
        .map(
            |(
                id,
                room_code,
                topic,
                difficulty,
                max_students,
                total_students,
                status,
                started_at_ms,
                ended_at_ms,
                duration_minutes,
            )| SessionRow {
                id,
                room_code,
                topic,
                difficulty,
                max_students,
                total_students,
                status,
                started_at_ms,
                ended_at_ms,
                duration_minutes,
            },
        )
        .collect();

    Ok(SessionHistory { sessions, total })
}

// =============================================================================
// TESTS
// =============================================================================
