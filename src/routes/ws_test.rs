use super::*;
use crate::state::test_helpers;
use serde_json::json;
use tokio::time::{Duration, timeout};

async fn recv_event(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("event receive timed out")
        .expect("channel closed unexpectedly")
}

async fn assert_no_event(rx: &mut mpsc::Receiver<ServerEvent>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected no event"
    );
}

async fn send(state: &AppState, connection_id: Uuid, payload: serde_json::Value) -> Vec<ServerEvent> {
    process_inbound_text(state, connection_id, &payload.to_string()).await
}

async fn join_teacher(state: &AppState, connection_id: Uuid, room: &str) {
    let replies = send(state, connection_id, json!({ "type": "join_room", "room_code": room, "is_teacher": true })).await;
    assert!(matches!(replies.first(), Some(ServerEvent::JoinAck { .. })));
}

async fn join_student(state: &AppState, connection_id: Uuid, room: &str, name: &str) -> Vec<ServerEvent> {
    send(state, connection_id, json!({ "type": "join_room", "room_code": room, "username": name })).await
}

#[tokio::test]
async fn malformed_json_returns_error_event() {
    let state = test_helpers::test_app_state();
    let (conn, _rx) = test_helpers::register_connection(&state).await;

    let replies = process_inbound_text(&state, conn, "{not json").await;
    assert_eq!(replies.len(), 1);
    assert!(matches!(&replies[0], ServerEvent::Error { .. }));
}

#[tokio::test]
async fn unknown_event_type_returns_error_event() {
    let state = test_helpers::test_app_state();
    let (conn, _rx) = test_helpers::register_connection(&state).await;

    let replies = send(&state, conn, json!({ "type": "format_hard_drive" })).await;
    assert!(matches!(&replies[0], ServerEvent::Error { .. }));
}

#[tokio::test]
async fn join_ack_carries_room_info_and_full_room_is_rejected() {
    let state = test_helpers::test_app_state();
    let (teacher, _teacher_rx) = test_helpers::register_connection(&state).await;
    let (ann, _ann_rx) = test_helpers::register_connection(&state).await;
    let (ben, _ben_rx) = test_helpers::register_connection(&state).await;

    let replies = send(
        &state,
        teacher,
        json!({ "type": "join_room", "room_code": "MATH1", "is_teacher": true, "max_students": 1 }),
    )
    .await;
    let Some(ServerEvent::JoinAck { status: crate::event::JoinStatus::Ok, room_info: Some(info), .. }) =
        replies.first()
    else {
        panic!("expected ok join_ack with room_info");
    };
    assert_eq!(info.max_students, 1);

    let replies = join_student(&state, ann, "MATH1", "Ann").await;
    assert!(matches!(
        replies.first(),
        Some(ServerEvent::JoinAck { status: crate::event::JoinStatus::Ok, .. })
    ));

    let replies = join_student(&state, ben, "MATH1", "Ben").await;
    let Some(ServerEvent::JoinAck { status: crate::event::JoinStatus::Error, message: Some(message), room_info }) =
        replies.first()
    else {
        panic!("expected error join_ack");
    };
    assert!(message.contains("full"), "message should mention fullness: {message}");
    assert!(room_info.is_none());
}

#[tokio::test]
async fn teacher_join_reply_includes_roster_snapshot() {
    let state = test_helpers::test_app_state();
    let (ann, _ann_rx) = test_helpers::register_connection(&state).await;
    let (teacher, _teacher_rx) = test_helpers::register_connection(&state).await;

    join_student(&state, ann, "MATH1", "Ann").await;

    let replies = send(&state, teacher, json!({ "type": "join_room", "room_code": "MATH1", "is_teacher": true })).await;
    assert_eq!(replies.len(), 2);
    let ServerEvent::ExistingStudents { students } = &replies[1] else {
        panic!("expected existing_students");
    };
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].username, "Ann");
}

#[tokio::test]
async fn drawing_data_relays_to_peers_with_injected_user_id() {
    let state = test_helpers::test_app_state();
    let (teacher, mut teacher_rx) = test_helpers::register_connection(&state).await;
    let (ann, mut ann_rx) = test_helpers::register_connection(&state).await;

    join_teacher(&state, teacher, "MATH1").await;
    join_student(&state, ann, "MATH1", "Ann").await;
    // Drain the user_joined broadcasts.
    let _ = recv_event(&mut teacher_rx).await;
    let _ = recv_event(&mut ann_rx).await;

    let path = json!({ "points": [[0, 0], [3, 4]] });
    let replies = send(&state, ann, json!({ "type": "drawing_data", "room_id": "MATH1", "path": path })).await;
    assert!(replies.is_empty());

    let ServerEvent::DrawingUpdate { room_id, path: relayed, user_id } = recv_event(&mut teacher_rx).await else {
        panic!("expected drawing_update");
    };
    assert_eq!(room_id, "MATH1");
    assert_eq!(relayed, path);
    assert_eq!(user_id, ann);

    // The sender never receives its own strokes back.
    assert_no_event(&mut ann_rx).await;
}

#[tokio::test]
async fn object_deleted_relays_to_peers_excluding_sender() {
    let state = test_helpers::test_app_state();
    let (teacher, mut teacher_rx) = test_helpers::register_connection(&state).await;
    let (ann, mut ann_rx) = test_helpers::register_connection(&state).await;

    join_teacher(&state, teacher, "MATH1").await;
    join_student(&state, ann, "MATH1", "Ann").await;
    let _ = recv_event(&mut teacher_rx).await;
    let _ = recv_event(&mut ann_rx).await;

    send(&state, ann, json!({ "type": "object_deleted", "room_id": "MATH1", "object_id": "obj-7" })).await;

    let ServerEvent::ObjectDeleted { object_id, .. } = recv_event(&mut teacher_rx).await else {
        panic!("expected object_deleted");
    };
    assert_eq!(object_id, "obj-7");
    assert_no_event(&mut ann_rx).await;
}

#[tokio::test]
async fn answer_submitted_relays_score_updated() {
    let state = test_helpers::test_app_state();
    let (teacher, mut teacher_rx) = test_helpers::register_connection(&state).await;
    let (ann, _ann_rx) = test_helpers::register_connection(&state).await;

    join_teacher(&state, teacher, "MATH1").await;
    join_student(&state, ann, "MATH1", "Ann").await;
    let _ = recv_event(&mut teacher_rx).await;

    send(
        &state,
        ann,
        json!({
            "type": "answer_submitted",
            "room_code": "MATH1",
            "student_name": "Ann",
            "student_email": "ann@example.com",
            "is_correct": true,
            "problem_number": 3
        }),
    )
    .await;

    let ServerEvent::ScoreUpdated { student_name, is_correct, problem_number, .. } =
        recv_event(&mut teacher_rx).await
    else {
        panic!("expected score_updated");
    };
    assert_eq!(student_name, "Ann");
    assert!(is_correct);
    assert_eq!(problem_number, 3);
}

#[tokio::test]
async fn request_canvas_state_unicasts_only_to_target() {
    let state = test_helpers::test_app_state();
    let (teacher, _teacher_rx) = test_helpers::register_connection(&state).await;
    let (ann, mut ann_rx) = test_helpers::register_connection(&state).await;
    let (ben, mut ben_rx) = test_helpers::register_connection(&state).await;

    join_teacher(&state, teacher, "MATH1").await;
    join_student(&state, ann, "MATH1", "Ann").await;
    join_student(&state, ben, "MATH1", "Ben").await;
    // Drain join broadcasts.
    let _ = recv_event(&mut ann_rx).await;
    let _ = recv_event(&mut ann_rx).await;
    let _ = recv_event(&mut ben_rx).await;

    send(
        &state,
        teacher,
        json!({ "type": "request_canvas_state", "room_id": "MATH1", "student_socket_id": ann }),
    )
    .await;

    let ServerEvent::SendCanvasState { requester_id } = recv_event(&mut ann_rx).await else {
        panic!("expected send_canvas_state");
    };
    assert_eq!(requester_id, teacher);
    assert_no_event(&mut ben_rx).await;
}

#[tokio::test]
async fn canvas_state_response_unicasts_to_requester_with_sender_id() {
    let state = test_helpers::test_app_state();
    let (teacher, mut teacher_rx) = test_helpers::register_connection(&state).await;
    let (ann, _ann_rx) = test_helpers::register_connection(&state).await;

    join_teacher(&state, teacher, "MATH1").await;
    join_student(&state, ann, "MATH1", "Ann").await;
    let _ = recv_event(&mut teacher_rx).await;

    let canvas = json!({ "objects": [{ "kind": "path" }] });
    send(
        &state,
        ann,
        json!({ "type": "canvas_state_response", "canvas_json": canvas, "requester_id": teacher }),
    )
    .await;

    let ServerEvent::ReceiveCanvasState { canvas_json, student_id } = recv_event(&mut teacher_rx).await else {
        panic!("expected receive_canvas_state");
    };
    assert_eq!(canvas_json, canvas);
    assert_eq!(student_id, ann);
}

#[tokio::test]
async fn room_wide_canvas_request_reaches_everyone_but_sender() {
    let state = test_helpers::test_app_state();
    let (viewer, mut viewer_rx) = test_helpers::register_connection(&state).await;
    let (ann, mut ann_rx) = test_helpers::register_connection(&state).await;
    let (ben, mut ben_rx) = test_helpers::register_connection(&state).await;

    join_student(&state, ann, "MATH1", "Ann").await;
    join_student(&state, ben, "MATH1", "Ben").await;
    send(&state, viewer, json!({ "type": "join_room", "room_code": "MATH1", "username": "Viewer", "is_teacher": true })).await;
    // Drain join broadcasts.
    let _ = recv_event(&mut ann_rx).await;
    let _ = recv_event(&mut ann_rx).await;
    let _ = recv_event(&mut ben_rx).await;

    send(&state, viewer, json!({ "type": "request_canvas_state_for_room", "room_id": "MATH1" })).await;

    for rx in [&mut ann_rx, &mut ben_rx] {
        let ServerEvent::SendCanvasState { requester_id } = recv_event(rx).await else {
            panic!("expected send_canvas_state");
        };
        assert_eq!(requester_id, viewer);
    }
    assert_no_event(&mut viewer_rx).await;
}

#[tokio::test]
async fn teacher_returned_notifies_students_only() {
    let state = test_helpers::test_app_state();
    let (teacher, mut teacher_rx) = test_helpers::register_connection(&state).await;
    let (ann, mut ann_rx) = test_helpers::register_connection(&state).await;

    join_teacher(&state, teacher, "MATH1").await;
    join_student(&state, ann, "MATH1", "Ann").await;
    let _ = recv_event(&mut teacher_rx).await;
    let _ = recv_event(&mut ann_rx).await;

    send(&state, teacher, json!({ "type": "teacher_returned_to_dashboard", "room_id": "MATH1" })).await;

    assert!(matches!(recv_event(&mut ann_rx).await, ServerEvent::TeacherReturned));
    assert_no_event(&mut teacher_rx).await;
}

#[tokio::test]
async fn relay_to_missing_room_is_silent() {
    let state = test_helpers::test_app_state();
    let (conn, mut rx) = test_helpers::register_connection(&state).await;

    let replies = send(&state, conn, json!({ "type": "drawing_data", "room_id": "NOWHERE", "path": {} })).await;
    assert!(replies.is_empty());
    assert_no_event(&mut rx).await;
}

#[tokio::test]
async fn camera_frames_beyond_rate_limit_are_dropped() {
    let state = test_helpers::test_app_state();
    let (teacher, mut teacher_rx) = test_helpers::register_connection(&state).await;
    let (ann, _ann_rx) = test_helpers::register_connection(&state).await;

    join_teacher(&state, teacher, "MATH1").await;
    join_student(&state, ann, "MATH1", "Ann").await;
    let _ = recv_event(&mut teacher_rx).await;

    // Default limit is 15 frames per window.
    for i in 0..20 {
        send(
            &state,
            ann,
            json!({
                "type": "camera_frame",
                "room_id": "MATH1",
                "student_id": ann,
                "student_name": "Ann",
                "frame": "base64-frame",
                "timestamp": i
            }),
        )
        .await;
    }

    let mut relayed = 0;
    while timeout(Duration::from_millis(80), teacher_rx.recv()).await.is_ok() {
        relayed += 1;
    }
    assert_eq!(relayed, 15);
}

#[tokio::test]
async fn audio_limit_is_independent_of_camera_limit() {
    let state = test_helpers::test_app_state();
    let (teacher, mut teacher_rx) = test_helpers::register_connection(&state).await;
    let (ann, _ann_rx) = test_helpers::register_connection(&state).await;

    join_teacher(&state, teacher, "MATH1").await;
    join_student(&state, ann, "MATH1", "Ann").await;
    let _ = recv_event(&mut teacher_rx).await;

    for i in 0..15 {
        send(
            &state,
            ann,
            json!({
                "type": "camera_frame",
                "room_id": "MATH1",
                "student_id": ann,
                "student_name": "Ann",
                "frame": "f",
                "timestamp": i
            }),
        )
        .await;
        let _ = recv_event(&mut teacher_rx).await;
    }

    // Camera window is exhausted; audio still flows.
    send(
        &state,
        ann,
        json!({
            "type": "camera_frame",
            "room_id": "MATH1",
            "student_id": ann,
            "student_name": "Ann",
            "frame": "f",
            "timestamp": 99
        }),
    )
    .await;
    assert_no_event(&mut teacher_rx).await;

    send(
        &state,
        ann,
        json!({
            "type": "audio_chunk",
            "room_id": "MATH1",
            "student_id": ann,
            "student_name": "Ann",
            "audio": "base64-audio",
            "timestamp": 99
        }),
    )
    .await;
    assert!(matches!(recv_event(&mut teacher_rx).await, ServerEvent::AudioChunkBroadcast { .. }));
}

#[tokio::test]
async fn status_changes_relay_to_peers() {
    let state = test_helpers::test_app_state();
    let (teacher, mut teacher_rx) = test_helpers::register_connection(&state).await;
    let (ann, _ann_rx) = test_helpers::register_connection(&state).await;

    join_teacher(&state, teacher, "MATH1").await;
    join_student(&state, ann, "MATH1", "Ann").await;
    let _ = recv_event(&mut teacher_rx).await;

    send(
        &state,
        ann,
        json!({
            "type": "camera_status_change",
            "room_id": "MATH1",
            "student_id": ann,
            "student_name": "Ann",
            "is_enabled": true
        }),
    )
    .await;
    let ServerEvent::StudentCameraStatus { is_enabled, .. } = recv_event(&mut teacher_rx).await else {
        panic!("expected student_camera_status");
    };
    assert!(is_enabled);

    send(
        &state,
        ann,
        json!({
            "type": "mic_status_change",
            "room_id": "MATH1",
            "student_id": ann,
            "student_name": "Ann",
            "is_enabled": false
        }),
    )
    .await;
    let ServerEvent::StudentMicStatus { is_enabled, .. } = recv_event(&mut teacher_rx).await else {
        panic!("expected student_mic_status");
    };
    assert!(!is_enabled);
}
