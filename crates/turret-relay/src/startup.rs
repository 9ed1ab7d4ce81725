//! Relay startup helper for the server binary.
//!
//! Provides [`spawn_relay`] which launches the HTTP + `WebSocket` server,
//! the control forwarder, and the mission clock on background Tokio
//! tasks.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::control::run_control_forwarder;
use crate::mission::run_mission_clock;
use crate::server::{ServerError, listen_addr, start_server};
use crate::state::AppState;

/// Errors that can occur when spawning the relay.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Handles to the relay's background tasks.
#[derive(Debug)]
pub struct RelayHandles {
    /// HTTP server; finishes after `Ctrl-C`.
    pub server: JoinHandle<()>,
    /// Control forwarder; runs until aborted.
    pub forwarder: JoinHandle<()>,
    /// Mission clock; runs until aborted.
    pub mission_clock: JoinHandle<()>,
}

impl RelayHandles {
    /// Wait for the server to stop, then stop the background loops.
    pub async fn join(self) {
        if let Err(e) = self.server.await {
            tracing::error!(error = %e, "Relay server task failed");
        }
        self.forwarder.abort();
        self.mission_clock.abort();
    }
}

/// Spawn the relay on background Tokio tasks.
///
/// The listen address is checked before anything is spawned so obvious
/// misconfiguration fails fast.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the configured address does not
/// parse.
pub fn spawn_relay(state: Arc<AppState>) -> Result<RelayHandles, StartupError> {
    let server_config = state.config.server.clone();
    let addr = listen_addr(&server_config)?;

    let server_state = Arc::clone(&state);
    let server = tokio::spawn(async move {
        if let Err(e) = start_server(&server_config, server_state).await {
            tracing::error!(error = %e, "Relay server exited with error");
        }
    });
    let forwarder = tokio::spawn(run_control_forwarder(Arc::clone(&state)));
    let mission_clock = tokio::spawn(run_mission_clock(state));

    tracing::info!(%addr, "Relay spawned on background tasks");

    Ok(RelayHandles {
        server,
        forwarder,
        mission_clock,
    })
}
