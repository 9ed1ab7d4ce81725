//! Periodic lobby tick and game-state broadcast.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::routing::publish_game_state;
use crate::state::AppState;

/// Advance the lobby once and push the snapshot to every operator.
/// Returns whether the lobby changed.
pub async fn tick_once(state: &AppState) -> bool {
    let changed = state.lobby.lock().await.tick();
    if changed {
        debug!("Lobby advanced");
    }
    publish_game_state(state).await;
    changed
}

/// Tick the lobby every `state_broadcast_ms` until the task is aborted.
pub async fn run_mission_clock(state: Arc<AppState>) {
    let period = state.config.relay.state_broadcast();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_ms = state.config.relay.state_broadcast_ms, "Mission clock started");

    loop {
        interval.tick().await;
        tick_once(&state).await;
    }
}
