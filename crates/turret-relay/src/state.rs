//! Shared application state for the relay.
//!
//! [`AppState`] owns the session registry, the latest-control cell, and
//! the mission lobby. Each sits behind its own lock. No code path holds
//! the registry lock and the lobby lock at the same time.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};
use turret_core::{Clock, Lobby, TurretConfig};
use turret_protocol::{GameStateView, LeaderboardEntry};

use crate::control::ControlCell;
use crate::error::RelayError;
use crate::registry::{Admission, SessionHandle, SessionRegistry};
use crate::routing;
use crate::session::{Outbound, Session, SessionRole};

/// Close reason sent to a rig that is replaced by a newer one.
pub const SUPERSEDED_REASON: &str = "superseded by a newer rig connection";

/// Body of `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayStatus {
    /// Whether a rig session is registered.
    pub rig_connected: bool,
    /// Number of registered operator sessions.
    pub operators: usize,
    /// Current lobby snapshot.
    pub game: GameStateView,
}

/// Body of `GET /api/leaderboard`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardResponse {
    /// Best finished games, highest first.
    pub entries: Vec<LeaderboardEntry>,
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor, and
/// shared with the control forwarder and mission clock.
#[derive(Debug)]
pub struct AppState {
    /// Validated configuration.
    pub config: TurretConfig,
    /// Monotonic time source.
    pub clock: Arc<dyn Clock>,
    /// Live sessions.
    pub registry: Mutex<SessionRegistry>,
    /// Latest operator control frame.
    pub control: ControlCell,
    /// Pilot queue, active mission, leaderboard.
    pub lobby: Mutex<Lobby>,
}

impl AppState {
    /// Build state from a validated configuration.
    pub fn new(config: TurretConfig, clock: Arc<dyn Clock>) -> Self {
        let lobby = Lobby::new(&config, Arc::clone(&clock));
        Self {
            config,
            clock,
            registry: Mutex::new(SessionRegistry::new()),
            control: ControlCell::new(),
            lobby: Mutex::new(lobby),
        }
    }

    /// Create and register a session for a new connection.
    ///
    /// Returns the registered session and the receiving half of its
    /// outbound queue, which the caller drains into the socket.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::SessionConflict`] if `role` is
    /// [`SessionRole::Rig`], a rig is already registered, and the
    /// configured policy is `reject`.
    pub async fn connect(
        &self,
        role: SessionRole,
    ) -> Result<(Session, mpsc::Receiver<Outbound>), RelayError> {
        let mut session = Session::new(role);
        let (tx, rx) = mpsc::channel(self.config.relay.outbound_queue);
        let handle = SessionHandle::new(session.id(), role, tx);

        let admission = self
            .registry
            .lock()
            .await
            .register(handle, self.config.relay.rig_policy)?;
        session.register()?;

        if let Admission::Superseded(old) = admission {
            let close = Outbound::Close {
                reason: SUPERSEDED_REASON.to_owned(),
            };
            if old.tx.try_send(close).is_err() {
                warn!(session = %old.id, "Superseded rig could not be told to close");
            }
        }

        info!(session = %session.id(), %role, "Session registered");
        Ok((session, rx))
    }

    /// Tear down a session: unregister it and withdraw whatever queue
    /// entry or mission it owns.
    pub async fn disconnect(&self, session: &mut Session) {
        if !session.close() {
            return;
        }
        self.registry.lock().await.unregister(session.id());
        info!(session = %session.id(), role = %session.role(), "Session closed");

        if session.role() != SessionRole::Operator {
            return;
        }
        let changed = self.lobby.lock().await.leave(*session.id().as_uuid());
        if changed {
            info!(session = %session.id(), "Pilot left the lobby");
            routing::publish_game_state(self).await;
        }
    }

    /// Snapshot for `GET /api/status`.
    pub async fn status(&self) -> RelayStatus {
        let game = self.lobby.lock().await.view();
        let registry = self.registry.lock().await;
        RelayStatus {
            rig_connected: registry.rig_connected(),
            operators: registry.operator_count(),
            game,
        }
    }

    /// Snapshot for `GET /api/leaderboard`.
    pub async fn leaderboard(&self) -> LeaderboardResponse {
        LeaderboardResponse {
            entries: self.lobby.lock().await.leaderboard().to_vec(),
        }
    }
}
