//! Integration tests for the relay.
//!
//! HTTP routes are driven through Axum's `Router` via
//! `tower::ServiceExt` without starting a TCP server. Session behavior
//! is driven through the same channel API the socket tasks use.

#![allow(clippy::unwrap_used, clippy::unreachable)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use turret_core::config::RigPolicy;
use turret_core::{ManualClock, TurretConfig};
use turret_protocol::{ActuatorFrame, VideoFrame};
use turret_relay::control::{ControlForwarder, run_control_forwarder};
use turret_relay::routing::{route_binary, route_text};
use turret_relay::session::{Outbound, SessionRole};
use turret_relay::{AppState, RelayError, build_router};

fn make_state(config: TurretConfig) -> (Arc<AppState>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let state = Arc::new(AppState::new(config, Arc::clone(&clock) as _));
    (state, clock)
}

async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let response = build_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_reports_sessions_and_idle_game() {
    let (state, _) = make_state(TurretConfig::default());
    let (_rig, _rig_rx) = state.connect(SessionRole::Rig).await.unwrap();
    let (_op, _op_rx) = state.connect(SessionRole::Operator).await.unwrap();

    let (status, body) = get_json(Arc::clone(&state), "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rig_connected"], true);
    assert_eq!(body["operators"], 1);
    assert_eq!(body["game"]["active"], false);
}

#[tokio::test]
async fn leaderboard_endpoint_lists_entries() {
    let (state, _) = make_state(TurretConfig::default());
    let (op, _rx) = state.connect(SessionRole::Operator).await.unwrap();
    route_text(&state, &op, r#"{"action":"join_queue","name":"Ace"}"#).await;
    route_text(&state, &op, r#"{"action":"add_score","score":250}"#).await;
    route_text(&state, &op, r#"{"action":"stop_game"}"#).await;

    let (status, body) = get_json(state, "/api/leaderboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"][0]["name"], "Ace");
    assert_eq!(body["entries"][0]["score"], 250);
}

#[tokio::test]
async fn index_page_is_html() {
    let (state, _) = make_state(TurretConfig::default());
    let response = build_router(state)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8(bytes.to_vec()).unwrap().contains("Turret Relay"));
}

#[tokio::test]
async fn unknown_role_is_not_found() {
    let (state, _) = make_state(TurretConfig::default());
    let (status, body) = get_json(state, "/ws/camera").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn plain_get_on_session_path_is_bad_request() {
    let (state, _) = make_state(TurretConfig::default());
    for role in ["rig", "pi", "operator", "client"] {
        let (status, _) = get_json(Arc::clone(&state), &format!("/ws/{role}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "role {role}");
    }
}

// ---------------------------------------------------------------------------
// Video fan-out
// ---------------------------------------------------------------------------

#[tokio::test]
async fn both_operators_receive_identical_video() {
    let (state, _) = make_state(TurretConfig::default());
    let (rig, _rig_rx) = state.connect(SessionRole::Rig).await.unwrap();
    let (_a, mut rx_a) = state.connect(SessionRole::Operator).await.unwrap();
    let (_b, mut rx_b) = state.connect(SessionRole::Operator).await.unwrap();

    let frame = Bytes::from(VideoFrame::encode(1_700_000_000_123.0, &[0xFF, 0xD8, 0xFF]));
    route_binary(&state, &rig, frame.clone()).await;

    assert_eq!(rx_a.try_recv().unwrap(), Outbound::Binary(frame.clone()));
    assert_eq!(rx_b.try_recv().unwrap(), Outbound::Binary(frame));
}

#[tokio::test]
async fn broken_operator_does_not_block_the_other() {
    let (state, _) = make_state(TurretConfig::default());
    let (rig, _rig_rx) = state.connect(SessionRole::Rig).await.unwrap();
    let (_live, mut live_rx) = state.connect(SessionRole::Operator).await.unwrap();
    let (_dead, dead_rx) = state.connect(SessionRole::Operator).await.unwrap();
    drop(dead_rx);

    let frame = Bytes::from(VideoFrame::encode(1.0, b"img"));
    route_binary(&state, &rig, frame.clone()).await;

    assert_eq!(live_rx.try_recv().unwrap(), Outbound::Binary(frame));
    let status = state.status().await;
    assert_eq!(status.operators, 1);
    assert!(status.rig_connected);
}

#[tokio::test]
async fn video_frames_keep_their_order() {
    let (state, _) = make_state(TurretConfig::default());
    let (rig, _rig_rx) = state.connect(SessionRole::Rig).await.unwrap();
    let (_op, mut rx) = state.connect(SessionRole::Operator).await.unwrap();

    let frames: Vec<Bytes> = (0..5_u8)
        .map(|i| Bytes::from(VideoFrame::encode(f64::from(i), &[i])))
        .collect();
    for frame in &frames {
        route_binary(&state, &rig, frame.clone()).await;
    }
    for frame in frames {
        assert_eq!(rx.try_recv().unwrap(), Outbound::Binary(frame));
    }
}

// ---------------------------------------------------------------------------
// Rig admission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_rig_rejected_by_default() {
    let (state, _) = make_state(TurretConfig::default());
    let (first, _rx) = state.connect(SessionRole::Rig).await.unwrap();
    let err = state.connect(SessionRole::Rig).await.unwrap_err();
    assert!(matches!(err, RelayError::SessionConflict));
    assert_eq!(err.to_string(), "rig already connected");
    assert_eq!(state.registry.lock().await.rig_id(), Some(first.id()));
}

#[tokio::test]
async fn second_rig_supersedes_when_configured() {
    let mut config = TurretConfig::default();
    config.relay.rig_policy = RigPolicy::Supersede;
    let (state, _) = make_state(config);
    let (_first, mut first_rx) = state.connect(SessionRole::Rig).await.unwrap();
    let (second, _second_rx) = state.connect(SessionRole::Rig).await.unwrap();

    assert!(matches!(first_rx.try_recv().unwrap(), Outbound::Close { .. }));
    assert_eq!(state.registry.lock().await.rig_id(), Some(second.id()));
}

// ---------------------------------------------------------------------------
// Control path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn last_operator_to_write_wins() {
    let (state, _) = make_state(TurretConfig::default());
    let (a, _rx_a) = state.connect(SessionRole::Operator).await.unwrap();
    let (b, _rx_b) = state.connect(SessionRole::Operator).await.unwrap();

    route_binary(&state, &a, Bytes::from_static(&[0, 0, 0, 0, 0, 0, 0, 0])).await;
    route_binary(&state, &b, Bytes::from_static(&[255, 255, 255, 255, 255, 255, 0, 0])).await;

    let latest = state.control.latest().await.unwrap();
    assert_eq!(latest.source, b.id());
    assert_eq!(latest.frame.channels, [127; 6]);
}

#[tokio::test]
async fn forwarder_sends_latest_frame_then_one_failsafe() {
    let mut config = TurretConfig::default();
    config.relay.control_rate_hz = 200;
    let (state, clock) = make_state(config);
    let (_rig, mut rig_rx) = state.connect(SessionRole::Rig).await.unwrap();
    let (op, _op_rx) = state.connect(SessionRole::Operator).await.unwrap();

    let forwarder = tokio::spawn(run_control_forwarder(Arc::clone(&state)));

    route_binary(&state, &op, Bytes::from_static(&[255, 0, 127, 127, 0, 255, 0x34, 0x12])).await;
    let expected = ActuatorFrame::parse(&[127, 0x81, 0, 0, 0x81, 127, 0x12, 0x34]).unwrap();
    let received = tokio::time::timeout(Duration::from_secs(2), rig_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, Outbound::Binary(Bytes::copy_from_slice(&expected.to_bytes())));

    // Let input go stale: the next distinct frame the rig sees is the failsafe.
    clock.advance(Duration::from_millis(500));
    let failsafe = Bytes::copy_from_slice(&ControlForwarder::failsafe_frame().to_bytes());
    let deadline = Duration::from_secs(2);
    let saw_failsafe = tokio::time::timeout(deadline, async {
        while let Some(message) = rig_rx.recv().await {
            if message == Outbound::Binary(failsafe.clone()) {
                return true;
            }
        }
        false
    })
    .await
    .unwrap();
    assert!(saw_failsafe);

    // After the failsafe the forwarder stays quiet.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rig_rx.try_recv().is_err());

    forwarder.abort();
}

#[tokio::test]
async fn control_without_rig_is_dropped_silently() {
    let (state, _) = make_state(TurretConfig::default());
    let (op, mut op_rx) = state.connect(SessionRole::Operator).await.unwrap();
    route_binary(&state, &op, Bytes::from_static(&[127; 8])).await;

    assert!(state.control.latest().await.is_some());
    assert!(op_rx.try_recv().is_err());
    assert_eq!(state.status().await.operators, 1);
}
