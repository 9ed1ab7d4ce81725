//! Inbound frame routing.
//!
//! Each reader task hands its frames to [`route_binary`] or
//! [`route_text`]. Per-message failures are logged and dropped; nothing
//! here closes a connection.
//!
//! | From     | Binary                          | Text                    |
//! |----------|---------------------------------|-------------------------|
//! | rig      | video, fanned out to operators  | detections, to the game |
//! | operator | control frame, to the cell      | lobby command           |

use axum::body::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;
use turret_core::LobbyError;
use turret_core::config::VideoHeaderMode;
use turret_protocol::{
    GameMode, Loadout, OperatorCommand, RigMessage, ServerEvent, VideoFrame, translate_control,
};

use crate::error::RelayError;
use crate::session::{Outbound, Session, SessionRole};
use crate::state::AppState;

/// Route a binary frame by the sender's role.
pub async fn route_binary(state: &AppState, session: &Session, payload: Bytes) {
    match session.role() {
        SessionRole::Rig => relay_video(state, payload).await,
        SessionRole::Operator => accept_control(state, session, &payload).await,
    }
}

/// Route a text frame by the sender's role.
pub async fn route_text(state: &AppState, session: &Session, text: &str) {
    match session.role() {
        SessionRole::Rig => accept_detections(state, text).await,
        SessionRole::Operator => run_command(state, session, text).await,
    }
}

/// Push the current lobby snapshot to every operator.
pub async fn publish_game_state(state: &AppState) {
    let view = state.lobby.lock().await.view();
    let json = match ServerEvent::GameState(view).to_json() {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize game state");
            return;
        }
    };
    let report = state.registry.lock().await.broadcast_text(&json);
    debug!(delivered = report.delivered, removed = report.removed.len(), "Game state published");
}

async fn relay_video(state: &AppState, payload: Bytes) {
    let frame = match state.config.relay.video_header {
        VideoHeaderMode::Validate => {
            if let Err(e) = VideoFrame::parse(&payload) {
                warn!(error = %e, len = payload.len(), "Video frame dropped");
                return;
            }
            payload
        }
        VideoHeaderMode::Stamp => Bytes::from(VideoFrame::encode(wall_clock_ms(), &payload)),
    };
    let report = state.registry.lock().await.fan_out(&frame);
    if !report.removed.is_empty() {
        info!(removed = report.removed.len(), "Operators dropped during video fan-out");
    }
}

async fn accept_control(state: &AppState, session: &Session, payload: &[u8]) {
    match translate_control(payload) {
        Ok(frame) => {
            state
                .control
                .store(frame, session.id(), state.clock.now())
                .await;
        }
        Err(e) => warn!(session = %session.id(), error = %e, "Control frame dropped"),
    }
}

async fn accept_detections(state: &AppState, text: &str) {
    let detections = match RigMessage::from_json(text) {
        Ok(RigMessage::Detections { detections }) => detections,
        Err(e) => {
            warn!(error = %e, "Rig message dropped");
            return;
        }
    };
    let written = state.lobby.lock().await.observe(&detections);
    debug!(received = detections.len(), written, "Detections applied");
}

async fn run_command(state: &AppState, session: &Session, text: &str) {
    let command = match OperatorCommand::from_json(text) {
        Ok(command) => command,
        Err(e) => {
            warn!(session = %session.id(), error = %e, "Operator command dropped");
            return;
        }
    };

    let outcome = match command {
        OperatorCommand::JoinQueue {
            name,
            mode,
            loadout,
        } => join_queue(state, session, &name, mode, loadout).await,
        OperatorCommand::StopGame => state.lobby.lock().await.stop(owner(session)).map(|_| ()),
        OperatorCommand::AddScore { score } => state
            .lobby
            .lock()
            .await
            .add_score(owner(session), score)
            .map(|_| ()),
        OperatorCommand::Fire => fire(state, session).await,
    };

    match outcome {
        Ok(()) => publish_game_state(state).await,
        Err(e) => debug!(session = %session.id(), error = %e, "Operator command refused"),
    }
}

async fn join_queue(
    state: &AppState,
    session: &Session,
    name: &str,
    mode: GameMode,
    loadout: Loadout,
) -> Result<(), LobbyError> {
    let mut lobby = state.lobby.lock().await;
    let pilot = lobby.join_queue(owner(session), name, mode, loadout)?;
    lobby.tick();
    debug!(session = %session.id(), %pilot, "Operator joined the queue");
    Ok(())
}

async fn fire(state: &AppState, session: &Session) -> Result<(), LobbyError> {
    let report = state.lobby.lock().await.fire(owner(session))?.report();
    let json = match ServerEvent::ShotResult(report).to_json() {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize shot result");
            return Ok(());
        }
    };
    let sent = state
        .registry
        .lock()
        .await
        .send_to(session.id(), Outbound::Text(json));
    if let Err(RelayError::UnroutableDelivery { session }) = sent {
        debug!(%session, "Shot result not delivered, shooter removed");
    }
    Ok(())
}

/// Lobby entries are owned by the session that created them.
const fn owner(session: &Session) -> Uuid {
    *session.id().as_uuid()
}

/// Wall-clock receive time in epoch milliseconds.
#[allow(clippy::cast_precision_loss)]
fn wall_clock_ms() -> f64 {
    // Exact in f64 for any date this relay will see.
    chrono::Utc::now().timestamp_millis() as f64
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreachable, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;
    use turret_core::{ManualClock, TurretConfig};
    use turret_protocol::{ActuatorFrame, GameStateView};

    use super::*;

    fn state_with(config: TurretConfig) -> AppState {
        AppState::new(config, Arc::new(ManualClock::new()))
    }

    fn video(ts: f64, body: &[u8]) -> Bytes {
        Bytes::from(VideoFrame::encode(ts, body))
    }

    fn next_game_state(rx: &mut mpsc::Receiver<Outbound>) -> GameStateView {
        loop {
            if let Outbound::Text(json) = rx.try_recv().unwrap() {
                if let ServerEvent::GameState(view) = serde_json::from_str(&json).unwrap() {
                    return view;
                }
            }
        }
    }

    #[tokio::test]
    async fn validated_video_is_forwarded_byte_for_byte() {
        let state = state_with(TurretConfig::default());
        let (rig, _rig_rx) = state.connect(SessionRole::Rig).await.unwrap();
        let (_op, mut op_rx) = state.connect(SessionRole::Operator).await.unwrap();

        let frame = video(1_700_000_000_000.0, b"jpeg");
        route_binary(&state, &rig, frame.clone()).await;
        assert_eq!(op_rx.try_recv().unwrap(), Outbound::Binary(frame));
    }

    #[tokio::test]
    async fn short_video_is_dropped_in_validate_mode() {
        let state = state_with(TurretConfig::default());
        let (rig, _rig_rx) = state.connect(SessionRole::Rig).await.unwrap();
        let (_op, mut op_rx) = state.connect(SessionRole::Operator).await.unwrap();

        route_binary(&state, &rig, Bytes::from_static(b"short")).await;
        assert!(op_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stamp_mode_prepends_a_header() {
        let mut config = TurretConfig::default();
        config.relay.video_header = VideoHeaderMode::Stamp;
        let state = state_with(config);
        let (rig, _rig_rx) = state.connect(SessionRole::Rig).await.unwrap();
        let (_op, mut op_rx) = state.connect(SessionRole::Operator).await.unwrap();

        route_binary(&state, &rig, Bytes::from_static(b"jpeg")).await;
        let Outbound::Binary(bytes) = op_rx.try_recv().unwrap() else {
            unreachable!("expected a binary frame");
        };
        let parsed = VideoFrame::parse(&bytes).unwrap();
        assert_eq!(parsed.payload, b"jpeg");
        assert!(parsed.captured_at_ms > 0.0);
    }

    #[tokio::test]
    async fn operator_control_lands_in_the_cell() {
        let state = state_with(TurretConfig::default());
        let (op, _rx) = state.connect(SessionRole::Operator).await.unwrap();

        route_binary(&state, &op, Bytes::from_static(&[255, 0, 127, 127, 0, 255, 0x34, 0x12])).await;
        let latest = state.control.latest().await.unwrap();
        assert_eq!(
            latest.frame,
            ActuatorFrame::parse(&[127, 0x81, 0, 0, 0x81, 127, 0x12, 0x34]).unwrap()
        );
        assert_eq!(latest.source, op.id());
    }

    #[tokio::test]
    async fn malformed_control_is_ignored() {
        let state = state_with(TurretConfig::default());
        let (op, _rx) = state.connect(SessionRole::Operator).await.unwrap();

        route_binary(&state, &op, Bytes::from_static(&[1, 2, 3])).await;
        assert!(state.control.latest().await.is_none());
        assert_eq!(state.status().await.operators, 1);
    }

    #[tokio::test]
    async fn join_fire_and_stop_through_commands() {
        let mut config = TurretConfig::default();
        config.game.base_hp = 10;
        let state = state_with(config);
        let (rig, _rig_rx) = state.connect(SessionRole::Rig).await.unwrap();
        let (op, mut op_rx) = state.connect(SessionRole::Operator).await.unwrap();

        route_text(&state, &op, r#"{"action":"join_queue","name":"Ace"}"#).await;
        let view = next_game_state(&mut op_rx);
        assert_eq!(view.player.as_deref(), Some("Ace"));

        route_text(
            &state,
            &rig,
            r#"{"type":"detections","detections":[{"text":"enemy_1","bbox":[[300,220],[340,220],[340,260],[300,260]]}]}"#,
        )
        .await;

        route_text(&state, &op, r#"{"action":"fire"}"#).await;
        let Outbound::Text(json) = op_rx.try_recv().unwrap() else {
            unreachable!("expected a text frame");
        };
        let ServerEvent::ShotResult(report) = serde_json::from_str(&json).unwrap() else {
            unreachable!("expected a shot result");
        };
        assert!(report.fired);
        assert_eq!(report.hits, ["ALPHA"]);
        assert_eq!(next_game_state(&mut op_rx).score, 600);

        route_text(&state, &op, r#"{"action":"stop_game"}"#).await;
        let view = next_game_state(&mut op_rx);
        assert!(!view.active);
        assert_eq!(view.leaderboard[0].score, 600);
    }

    #[tokio::test]
    async fn commands_from_non_pilots_change_nothing() {
        let state = state_with(TurretConfig::default());
        let (pilot, _pilot_rx) = state.connect(SessionRole::Operator).await.unwrap();
        let (other, mut other_rx) = state.connect(SessionRole::Operator).await.unwrap();

        route_text(&state, &pilot, r#"{"action":"join_queue","name":"Ace"}"#).await;
        while other_rx.try_recv().is_ok() {}

        route_text(&state, &other, r#"{"action":"stop_game"}"#).await;
        route_text(&state, &other, r#"{"action":"fire"}"#).await;
        route_text(&state, &other, "not json").await;
        assert!(other_rx.try_recv().is_err());
        assert_eq!(state.lobby.lock().await.active_pilot(), Some("Ace"));
    }

    #[tokio::test]
    async fn stale_pilot_cannot_touch_a_reused_name() {
        let state = state_with(TurretConfig::default());
        let (mut first, _first_rx) = state.connect(SessionRole::Operator).await.unwrap();
        let (second, _second_rx) = state.connect(SessionRole::Operator).await.unwrap();

        route_text(&state, &first, r#"{"action":"join_queue","name":"Ace"}"#).await;
        route_text(&state, &first, r#"{"action":"stop_game"}"#).await;
        route_text(&state, &second, r#"{"action":"join_queue","name":"Ace"}"#).await;
        route_text(&state, &second, r#"{"action":"add_score","score":5}"#).await;

        route_text(&state, &first, r#"{"action":"add_score","score":1000}"#).await;
        route_text(&state, &first, r#"{"action":"fire"}"#).await;
        route_text(&state, &first, r#"{"action":"stop_game"}"#).await;
        {
            let lobby = state.lobby.lock().await;
            assert_eq!(lobby.active_pilot(), Some("Ace"));
            assert_eq!(lobby.score(), Some(5));
        }

        state.disconnect(&mut first).await;
        let lobby = state.lobby.lock().await;
        assert_eq!(lobby.active_pilot(), Some("Ace"));
        assert_eq!(lobby.score(), Some(5));
        assert_eq!(lobby.leaderboard().len(), 1);
    }

    #[tokio::test]
    async fn second_join_from_one_session_is_refused() {
        let state = state_with(TurretConfig::default());
        let (mut pilot, _rx) = state.connect(SessionRole::Operator).await.unwrap();

        route_text(&state, &pilot, r#"{"action":"join_queue","name":"Ace"}"#).await;
        route_text(&state, &pilot, r#"{"action":"join_queue","name":"Bo"}"#).await;
        {
            let lobby = state.lobby.lock().await;
            assert_eq!(lobby.active_pilot(), Some("Ace"));
            assert!(lobby.queued().is_empty());
        }

        // Disconnecting still ends the mission it owns.
        state.disconnect(&mut pilot).await;
        let lobby = state.lobby.lock().await;
        assert!(lobby.active_pilot().is_none());
        assert_eq!(lobby.leaderboard()[0].name, "Ace");
    }

    #[tokio::test]
    async fn pilot_disconnect_ends_the_mission() {
        let state = state_with(TurretConfig::default());
        let (mut pilot, _rx) = state.connect(SessionRole::Operator).await.unwrap();
        route_text(&state, &pilot, r#"{"action":"join_queue","name":"Ace"}"#).await;

        state.disconnect(&mut pilot).await;
        let lobby = state.lobby.lock().await;
        assert!(lobby.active_pilot().is_none());
        assert_eq!(lobby.leaderboard()[0].name, "Ace");
    }
}
