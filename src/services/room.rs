//! Room service — membership protocol, directory lifecycle, and fan-out.
//!
//! DESIGN
//! ======
//! Rooms are created lazily on first join and garbage-collected on the
//! leave path once no teacher is set and the roster is empty (no
//! timers). Each operation takes the classroom write guard once and
//! runs to completion, so the capacity check, takeover eviction, and
//! roster insert are a single atomic step.
//!
//! Teacher joins overwrite the teacher slot unconditionally: only the
//! most recent teacher connection is authoritative. The previous
//! connection is demoted — it stays in the broadcast group until it
//! disconnects but is no longer addressed as the teacher. The demotion
//! is surfaced as a [`TeacherTransition`] so callers and tests can
//! observe it even though no client event is emitted for it.
//!
//! ERROR HANDLING
//! ==============
//! The only join failure is a full room, reported synchronously in the
//! acknowledgment; the connection stays open and may retry another
//! code. Fan-out to a vanished room or connection is a silent no-op —
//! disconnect races are expected and clients re-request state on join.

use std::collections::HashMap;

use tracing::{info, warn};
use uuid::Uuid;

use crate::event::{RoomInfo, RosterEntry, ServerEvent};
use crate::state::{AppState, Connection, Role, Room};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("Room is full ({capacity}/{capacity} students). Please try another room.")]
    Full { capacity: usize },
}

/// Parameters of a `join_room` request.
#[derive(Debug, Clone, Default)]
pub struct JoinRequest {
    pub room_code: String,
    pub username: Option<String>,
    pub is_teacher: bool,
    pub max_students: Option<usize>,
    pub topic: Option<String>,
    pub difficulty: Option<String>,
}

/// How the teacher slot changed during a teacher-path join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeacherTransition {
    /// Slot was empty or already held by this connection.
    Assigned,
    /// A prior teacher connection was demoted.
    Replaced { previous: Uuid },
}

/// Successful join outcome: acknowledgment payload for the caller.
/// Membership broadcasts (`user_left` / `user_joined`) have already
/// been sent by the time this is returned.
#[derive(Debug)]
pub struct JoinReply {
    pub room_info: RoomInfo,
    /// Roster snapshot for a joining teacher; `None` for students or
    /// when the roster is empty.
    pub existing_students: Option<Vec<RosterEntry>>,
    pub teacher_transition: Option<TeacherTransition>,
}

// =============================================================================
// JOIN
// =============================================================================

/// Join a room, creating it on first reference.
///
/// Teacher path (`is_teacher` set, or no username supplied): the
/// teacher slot is overwritten, supplied room defaults are applied, and
/// the reply carries a point-in-time roster snapshot. Student path:
/// capacity is enforced for genuinely new names; re-joining an active
/// name is a takeover that evicts the stale connection's roster entry.
///
/// # Errors
///
/// Returns [`RoomError::Full`] when the room is at capacity and the
/// display name is not already on the roster. The connection is not
/// added to the broadcast group.
pub async fn join(state: &AppState, connection_id: Uuid, req: JoinRequest) -> Result<JoinReply, RoomError> {
    let mut classroom = state.classroom.write().await;
    let crate::state::Classroom { connections, rooms } = &mut *classroom;

    let created = !rooms.contains_key(&req.room_code);
    let room = rooms.entry(req.room_code.clone()).or_default();
    if created {
        info!(room = %req.room_code, "room created");
    }

    let teacher_path = req.is_teacher || req.username.is_none();
    if teacher_path {
        let transition = match room.teacher {
            Some(previous) if previous != connection_id => TeacherTransition::Replaced { previous },
            _ => TeacherTransition::Assigned,
        };
        room.teacher = Some(connection_id);

        // Room settings are last-writer-wins, applied only when supplied.
        if let Some(max) = req.max_students {
            room.capacity = max;
        }
        if let Some(topic) = &req.topic {
            room.topic.clone_from(topic);
        }
        if let Some(difficulty) = &req.difficulty {
            room.difficulty.clone_from(difficulty);
        }
        room.members.insert(connection_id);

        if let Some(conn) = connections.get_mut(&connection_id) {
            conn.role = if req.username.is_some() { Role::Viewer } else { Role::Teacher };
            conn.display_name = req.username.clone();
            conn.room = Some(req.room_code.clone());
        }

        if let TeacherTransition::Replaced { previous } = transition {
            info!(room = %req.room_code, %connection_id, %previous, "teacher replaced; prior connection demoted");
        } else {
            info!(room = %req.room_code, %connection_id, capacity = room.capacity, "teacher set for room");
        }

        let snapshot = roster_snapshot(room);
        return Ok(JoinReply {
            room_info: room_info(room),
            existing_students: if snapshot.is_empty() { None } else { Some(snapshot) },
            teacher_transition: Some(transition),
        });
    }

    // Student path. `username` is present here by the branch above.
    let Some(username) = req.username.clone() else {
        unreachable!("student path requires a username");
    };

    if room.roster.len() >= room.capacity && !room.roster.contains_key(&username) {
        warn!(room = %req.room_code, %username, capacity = room.capacity, "join rejected: room full");
        return Err(RoomError::Full { capacity: room.capacity });
    }

    room.members.insert(connection_id);

    // Reconnect/duplicate-tab takeover: evict the stale entry and tell
    // the room (the teacher UI drops the old tile) before overwriting.
    if let Some(&old_connection) = room.roster.get(&username) {
        info!(room = %req.room_code, %username, %old_connection, "student reconnecting; evicting stale entry");
        let left = ServerEvent::UserLeft { id: old_connection, username: username.clone() };
        broadcast_locked(connections, room, &left, None);
    }

    room.roster.insert(username.clone(), connection_id);

    if let Some(conn) = connections.get_mut(&connection_id) {
        conn.role = Role::Student;
        conn.display_name = Some(username.clone());
        conn.room = Some(req.room_code.clone());
    }

    info!(
        room = %req.room_code,
        %username,
        %connection_id,
        students = room.roster.len(),
        capacity = room.capacity,
        "student joined room"
    );

    // Everyone in the room, including the new connection, learns of the join.
    let joined = ServerEvent::UserJoined { username, id: connection_id };
    broadcast_locked(connections, room, &joined, None);

    Ok(JoinReply { room_info: room_info(room), existing_students: None, teacher_transition: None })
}

// =============================================================================
// LEAVE
// =============================================================================

/// Handle a transport disconnect: remove the registry record, drop any
/// roster entry held by this connection (broadcasting `user_left` to
/// the remaining members), clear the teacher slot if it pointed here,
/// and prune rooms that ended up empty. Unknown connections are a
/// no-op.
pub async fn leave(state: &AppState, connection_id: Uuid) {
    state.media_limiter.forget(connection_id);

    let mut classroom = state.classroom.write().await;
    let crate::state::Classroom { connections, rooms } = &mut *classroom;

    let last_room = connections
        .remove(&connection_id)
        .and_then(|conn| conn.room);
    if let Some(code) = &last_room {
        info!(%connection_id, room = %code, "connection closed");
    }

    // Sweep every room, not just the last joined one: a connection that
    // hopped rooms may still hold membership in earlier ones.
    for (code, room) in rooms.iter_mut() {
        room.members.remove(&connection_id);

        if room.teacher == Some(connection_id) {
            room.teacher = None;
            // No teacher-left broadcast: no client depends on one.
            info!(room = %code, %connection_id, "teacher disconnected; slot cleared");
        }

        let departed = room
            .roster
            .iter()
            .find(|(_, conn)| **conn == connection_id)
            .map(|(name, _)| name.clone());
        if let Some(username) = departed {
            room.roster.remove(&username);
            info!(room = %code, %username, remaining = room.roster.len(), "student left room");
            let left = ServerEvent::UserLeft { id: connection_id, username };
            broadcast_locked(connections, room, &left, None);
        }
    }

    rooms.retain(|code, room| {
        if room.is_empty() {
            info!(room = %code, "room pruned (empty)");
            false
        } else {
            true
        }
    });
}

// =============================================================================
// FAN-OUT
// =============================================================================

/// Broadcast an event to every member of a room, optionally excluding
/// one connection. Missing rooms are a silent no-op.
pub async fn broadcast(state: &AppState, room_code: &str, event: &ServerEvent, exclude: Option<Uuid>) {
    let classroom = state.classroom.read().await;
    let Some(room) = classroom.rooms.get(room_code) else {
        return;
    };
    broadcast_locked(&classroom.connections, room, event, exclude);
}

/// Forward an event to a single connection. Missing connections are a
/// silent no-op.
pub async fn send_to(state: &AppState, connection_id: Uuid, event: &ServerEvent) {
    let classroom = state.classroom.read().await;
    let Some(conn) = classroom.connections.get(&connection_id) else {
        return;
    };
    // Best-effort: if the client's channel is full, the event is dropped.
    let _ = conn.tx.try_send(event.clone());
}

fn broadcast_locked(
    connections: &HashMap<Uuid, Connection>,
    room: &Room,
    event: &ServerEvent,
    exclude: Option<Uuid>,
) {
    for member in &room.members {
        if exclude == Some(*member) {
            continue;
        }
        let Some(conn) = connections.get(member) else {
            continue;
        };
        let _ = conn.tx.try_send(event.clone());
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn room_info(room: &Room) -> RoomInfo {
    RoomInfo { current_students: room.roster.len(), max_students: room.capacity, topic: room.topic.clone() }
}

fn roster_snapshot(room: &Room) -> Vec<RosterEntry> {
    room.roster
        .iter()
        .map(|(username, id)| RosterEntry { username: username.clone(), id: *id })
        .collect()
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
