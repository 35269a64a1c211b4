//! Event — the typed message schemas for Chalkboard.
//!
//! ARCHITECTURE
//! ============
//! Every websocket message is one of two tagged enums: `ClientEvent`
//! (inbound) or `ServerEvent` (outbound). The ws route dispatches on the
//! variant and never inspects opaque payloads: `path` and `canvas_json`
//! are relayed verbatim as `serde_json::Value`.
//!
//! DESIGN
//! ======
//! - Wire format is `{"type": "<snake_case name>", ...fields}`.
//! - Connection ids are server-assigned UUIDs, delivered to the client
//!   in the `connected` welcome event.
//! - `join_room` is the only request with an acknowledgment
//!   (`join_ack`); everything else is fire-and-forget.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// =============================================================================
// INBOUND
// =============================================================================

/// Messages a client may send. Unknown `type` tags fail to parse and are
/// answered with an `error` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom {
        room_code: String,
        username: Option<String>,
        #[serde(default)]
        is_teacher: bool,
        max_students: Option<usize>,
        topic: Option<String>,
        difficulty: Option<String>,
    },
    DrawingData {
        room_id: String,
        /// Serialized drawable object. Opaque to the server.
        path: Value,
    },
    ObjectDeleted {
        room_id: String,
        object_id: String,
    },
    AnswerSubmitted {
        room_code: String,
        student_name: String,
        student_email: String,
        is_correct: bool,
        problem_number: i32,
    },
    RequestCanvasState {
        room_id: String,
        student_socket_id: Uuid,
    },
    CanvasStateResponse {
        canvas_json: Value,
        requester_id: Uuid,
    },
    RequestCanvasStateForRoom {
        room_id: String,
    },
    CameraFrame {
        room_id: String,
        student_id: Uuid,
        student_name: String,
        frame: String,
        timestamp: i64,
    },
    CameraStatusChange {
        room_id: String,
        student_id: Uuid,
        student_name: String,
        is_enabled: bool,
    },
    AudioChunk {
        room_id: String,
        student_id: Uuid,
        student_name: String,
        audio: String,
        timestamp: i64,
    },
    MicStatusChange {
        room_id: String,
        student_id: Uuid,
        student_name: String,
        is_enabled: bool,
    },
    TeacherReturnedToDashboard {
        room_id: String,
    },
}

impl ClientEvent {
    /// Stable name for logging, matching the wire tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::DrawingData { .. } => "drawing_data",
            Self::ObjectDeleted { .. } => "object_deleted",
            Self::AnswerSubmitted { .. } => "answer_submitted",
            Self::RequestCanvasState { .. } => "request_canvas_state",
            Self::CanvasStateResponse { .. } => "canvas_state_response",
            Self::RequestCanvasStateForRoom { .. } => "request_canvas_state_for_room",
            Self::CameraFrame { .. } => "camera_frame",
            Self::CameraStatusChange { .. } => "camera_status_change",
            Self::AudioChunk { .. } => "audio_chunk",
            Self::MicStatusChange { .. } => "mic_status_change",
            Self::TeacherReturnedToDashboard { .. } => "teacher_returned_to_dashboard",
        }
    }

    /// High-frequency media events are rate-limited and never logged
    /// per event.
    #[must_use]
    pub fn is_media(&self) -> bool {
        matches!(self, Self::CameraFrame { .. } | Self::AudioChunk { .. })
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Snapshot entry for one active student, as seen by a joining teacher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub username: String,
    pub id: Uuid,
}

/// Room summary returned in a successful join acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub current_students: usize,
    pub max_students: usize,
    pub topic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStatus {
    Ok,
    Error,
}

/// Messages the server may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Welcome message carrying the server-assigned connection id.
    Connected {
        connection_id: Uuid,
    },
    JoinAck {
        status: JoinStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_info: Option<RoomInfo>,
    },
    /// Point-in-time roster snapshot sent to a (re)joining teacher.
    ExistingStudents {
        students: Vec<RosterEntry>,
    },
    UserJoined {
        username: String,
        id: Uuid,
    },
    UserLeft {
        id: Uuid,
        username: String,
    },
    DrawingUpdate {
        room_id: String,
        path: Value,
        /// Injected by the relay: the connection that drew the path.
        user_id: Uuid,
    },
    ObjectDeleted {
        room_id: String,
        object_id: String,
    },
    ScoreUpdated {
        room_code: String,
        student_name: String,
        student_email: String,
        is_correct: bool,
        problem_number: i32,
    },
    SendCanvasState {
        requester_id: Uuid,
    },
    ReceiveCanvasState {
        canvas_json: Value,
        student_id: Uuid,
    },
    CameraFrameBroadcast {
        student_id: Uuid,
        student_name: String,
        frame: String,
        timestamp: i64,
    },
    StudentCameraStatus {
        student_id: Uuid,
        student_name: String,
        is_enabled: bool,
    },
    AudioChunkBroadcast {
        student_id: Uuid,
        student_name: String,
        audio: String,
        timestamp: i64,
    },
    StudentMicStatus {
        student_id: Uuid,
        student_name: String,
        is_enabled: bool,
    },
    TeacherReturned,
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Successful join acknowledgment.
    #[must_use]
    pub fn join_ok(room_info: RoomInfo) -> Self {
        Self::JoinAck { status: JoinStatus::Ok, message: None, room_info: Some(room_info) }
    }

    /// Rejected join acknowledgment.
    #[must_use]
    pub fn join_error(message: impl Into<String>) -> Self {
        Self::JoinAck { status: JoinStatus::Error, message: Some(message.into()), room_info: None }
    }

    /// Stable name for logging, matching the wire tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::JoinAck { .. } => "join_ack",
            Self::ExistingStudents { .. } => "existing_students",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::DrawingUpdate { .. } => "drawing_update",
            Self::ObjectDeleted { .. } => "object_deleted",
            Self::ScoreUpdated { .. } => "score_updated",
            Self::SendCanvasState { .. } => "send_canvas_state",
            Self::ReceiveCanvasState { .. } => "receive_canvas_state",
            Self::CameraFrameBroadcast { .. } => "camera_frame_broadcast",
            Self::StudentCameraStatus { .. } => "student_camera_status",
            Self::AudioChunkBroadcast { .. } => "audio_chunk_broadcast",
            Self::StudentMicStatus { .. } => "student_mic_status",
            Self::TeacherReturned => "teacher_returned",
            Self::Error { .. } => "error",
        }
    }

    /// Counterpart of [`ClientEvent::is_media`] for the send path.
    #[must_use]
    pub fn is_media(&self) -> bool {
        matches!(self, Self::CameraFrameBroadcast { .. } | Self::AudioChunkBroadcast { .. })
    }
}

// =============================================================================
// TESTS
// =============================================================================
