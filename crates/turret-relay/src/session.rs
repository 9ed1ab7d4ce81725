//! Session identity, role, and lifecycle.
//!
//! A [`Session`] moves `Connecting -> Registered -> Closed` and never
//! back. A device that reconnects gets a new session.

use std::fmt;
use std::str::FromStr;

use axum::body::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::error::RelayError;

/// Unique identifier for one connection.
///
/// UUID v7, so ids sort by connection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new time-ordered id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Borrow the inner UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of the relay a session is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    /// The turret: sends video and detections, receives actuator frames.
    Rig,
    /// A human at a gamepad: sends control frames and commands, receives
    /// video and game state.
    Operator,
}

impl SessionRole {
    /// Canonical path segment for this role.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rig => "rig",
            Self::Operator => "operator",
        }
    }
}

impl FromStr for SessionRole {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rig" | "pi" => Ok(Self::Rig),
            "operator" | "client" => Ok(Self::Operator),
            other => Err(RelayError::UnknownRole(other.to_owned())),
        }
    }
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Socket accepted, not yet in the registry.
    Connecting,
    /// In the registry and routable.
    Registered,
    /// Gone. Terminal.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("connecting"),
            Self::Registered => f.write_str("registered"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// One connection's identity and lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    role: SessionRole,
    state: SessionState,
}

impl Session {
    /// A freshly accepted connection.
    pub fn new(role: SessionRole) -> Self {
        Self {
            id: SessionId::new(),
            role,
            state: SessionState::Connecting,
        }
    }

    /// This session's id.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// This session's role.
    pub const fn role(&self) -> SessionRole {
        self.role
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// `Connecting -> Registered`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidTransition`] from any other state.
    pub fn register(&mut self) -> Result<(), RelayError> {
        if self.state != SessionState::Connecting {
            return Err(RelayError::InvalidTransition {
                from: self.state,
                to: SessionState::Registered,
            });
        }
        self.state = SessionState::Registered;
        Ok(())
    }

    /// Move to `Closed`. Returns `false` if already closed.
    pub fn close(&mut self) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        self.state = SessionState::Closed;
        true
    }
}

/// A frame queued for a session's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Binary frame (video to operators, actuator frames to the rig).
    Binary(Bytes),
    /// Text frame (JSON events).
    Text(String),
    /// Send a close frame and end the session.
    Close {
        /// Close reason shown to the peer.
        reason: String,
    },
}
