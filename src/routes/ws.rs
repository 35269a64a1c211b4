//! WebSocket handler — classroom event relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection ID, registers an outbound channel,
//! and enters a `select!` loop:
//! - Incoming client events → parse + dispatch by variant
//! - Relayed events from room peers → forward to client
//!
//! Handler logic is pure: it inspects the event and returns an
//! `Outcome`. The dispatch layer owns all outbound concerns — reply to
//! sender, room broadcast, or unicast — so routing behavior is testable
//! without a live socket.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → register connection → send `connected` with id
//! 2. Client sends events → dispatch → handler returns Outcome
//! 3. Dispatch applies Outcome (reply / broadcast / unicast)
//! 4. Close → `services::room::leave` (roster eviction + room pruning)

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::event::{ClientEvent, ServerEvent};
use crate::rate_limit::MediaKind;
use crate::services;
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this
/// to decide who receives what — handlers never send events directly.
enum Outcome {
    /// Send events to the sender only (acknowledgments, errors).
    Reply(Vec<ServerEvent>),
    /// Relay one event to every room member except the sender.
    RoomExcludeSender { room: String, event: ServerEvent },
    /// Forward one event to a single connection.
    Unicast { to: Uuid, event: ServerEvent },
    /// Swallow the event (rate-limited media).
    Silent,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();

    // Per-connection channel for events relayed from room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerEvent>(256);
    {
        let mut classroom = state.classroom.write().await;
        classroom.register(connection_id, client_tx);
    }

    let welcome = ServerEvent::Connected { connection_id };
    if send_event(&mut socket, &welcome).await.is_err() {
        services::room::leave(&state, connection_id).await;
        return;
    }

    info!(%connection_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, connection_id, &text).await;
                        for event in replies {
                            if send_event(&mut socket, &event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = client_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    services::room::leave(&state, connection_id).await;
    info!(%connection_id, "ws: client disconnected");
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!(event = event.name(), error = %e, "ws: failed to serialize outbound event");
            return Ok(());
        }
    };
    socket.send(Message::Text(text.into())).await
}

// =============================================================================
// EVENT DISPATCH
// =============================================================================

/// Parse and process one inbound text message and return events for the
/// sender.
///
/// This keeps websocket transport concerns separate from event routing,
/// so tests can exercise the full relay table without a live socket.
async fn process_inbound_text(state: &AppState, connection_id: Uuid, text: &str) -> Vec<ServerEvent> {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%connection_id, error = %e, "ws: invalid inbound event");
            return vec![ServerEvent::Error { message: format!("invalid event: {e}") }];
        }
    };

    if !event.is_media() {
        info!(%connection_id, event = event.name(), "ws: recv event");
    }

    let outcome = dispatch(state, connection_id, event).await;

    match outcome {
        Outcome::Reply(events) => events,
        Outcome::RoomExcludeSender { room, event } => {
            services::room::broadcast(state, &room, &event, Some(connection_id)).await;
            vec![]
        }
        Outcome::Unicast { to, event } => {
            services::room::send_to(state, to, &event).await;
            vec![]
        }
        Outcome::Silent => vec![],
    }
}

/// The relay routing table: one arm per inbound event.
async fn dispatch(state: &AppState, connection_id: Uuid, event: ClientEvent) -> Outcome {
    match event {
        ClientEvent::JoinRoom { room_code, username, is_teacher, max_students, topic, difficulty } => {
            let req = services::room::JoinRequest {
                room_code,
                username,
                is_teacher,
                max_students,
                topic,
                difficulty,
            };
            match services::room::join(state, connection_id, req).await {
                Ok(reply) => {
                    let mut events = vec![ServerEvent::join_ok(reply.room_info)];
                    if let Some(students) = reply.existing_students {
                        events.push(ServerEvent::ExistingStudents { students });
                    }
                    Outcome::Reply(events)
                }
                Err(e) => Outcome::Reply(vec![ServerEvent::join_error(e.to_string())]),
            }
        }

        ClientEvent::DrawingData { room_id, path } => Outcome::RoomExcludeSender {
            event: ServerEvent::DrawingUpdate { room_id: room_id.clone(), path, user_id: connection_id },
            room: room_id,
        },

        ClientEvent::ObjectDeleted { room_id, object_id } => Outcome::RoomExcludeSender {
            event: ServerEvent::ObjectDeleted { room_id: room_id.clone(), object_id },
            room: room_id,
        },

        ClientEvent::AnswerSubmitted { room_code, student_name, student_email, is_correct, problem_number } => {
            info!(
                room = %room_code,
                student = %student_name,
                problem = problem_number,
                correct = is_correct,
                "score update"
            );
            Outcome::RoomExcludeSender {
                event: ServerEvent::ScoreUpdated {
                    room_code: room_code.clone(),
                    student_name,
                    student_email,
                    is_correct,
                    problem_number,
                },
                room: room_code,
            }
        }

        ClientEvent::RequestCanvasState { student_socket_id, .. } => Outcome::Unicast {
            to: student_socket_id,
            event: ServerEvent::SendCanvasState { requester_id: connection_id },
        },

        ClientEvent::CanvasStateResponse { canvas_json, requester_id } => Outcome::Unicast {
            to: requester_id,
            event: ServerEvent::ReceiveCanvasState { canvas_json, student_id: connection_id },
        },

        ClientEvent::RequestCanvasStateForRoom { room_id } => Outcome::RoomExcludeSender {
            event: ServerEvent::SendCanvasState { requester_id: connection_id },
            room: room_id,
        },

        ClientEvent::CameraFrame { room_id, student_id, student_name, frame, timestamp } => {
            if !state.media_limiter.allow(connection_id, MediaKind::Camera) {
                debug!(%connection_id, room = %room_id, "camera frame dropped: rate limit");
                return Outcome::Silent;
            }
            Outcome::RoomExcludeSender {
                event: ServerEvent::CameraFrameBroadcast { student_id, student_name, frame, timestamp },
                room: room_id,
            }
        }

        ClientEvent::CameraStatusChange { room_id, student_id, student_name, is_enabled } => {
            info!(room = %room_id, student = %student_name, enabled = is_enabled, "camera status change");
            Outcome::RoomExcludeSender {
                event: ServerEvent::StudentCameraStatus { student_id, student_name, is_enabled },
                room: room_id,
            }
        }

        ClientEvent::AudioChunk { room_id, student_id, student_name, audio, timestamp } => {
            if !state.media_limiter.allow(connection_id, MediaKind::Audio) {
                debug!(%connection_id, room = %room_id, "audio chunk dropped: rate limit");
                return Outcome::Silent;
            }
            Outcome::RoomExcludeSender {
                event: ServerEvent::AudioChunkBroadcast { student_id, student_name, audio, timestamp },
                room: room_id,
            }
        }

        ClientEvent::MicStatusChange { room_id, student_id, student_name, is_enabled } => {
            info!(room = %room_id, student = %student_name, enabled = is_enabled, "mic status change");
            Outcome::RoomExcludeSender {
                event: ServerEvent::StudentMicStatus { student_id, student_name, is_enabled },
                room: room_id,
            }
        }

        ClientEvent::TeacherReturnedToDashboard { room_id } => Outcome::RoomExcludeSender {
            event: ServerEvent::TeacherReturned,
            room: room_id,
        },
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
