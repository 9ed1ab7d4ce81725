//! Error types for the relay.
//!
//! [`RelayError`] covers session setup and delivery failures. Most of
//! them never leave the relay: delivery errors are logged and the
//! offending session is dropped. The ones that can surface on the HTTP
//! path convert into a JSON response via
//! [`IntoResponse`](axum::response::IntoResponse).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::session::{SessionId, SessionState};

/// Errors that can occur in the relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The connection path named a role the relay does not serve.
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// A rig tried to register while another rig is registered.
    #[error("rig already connected")]
    SessionConflict,

    /// A peer's outbound queue is closed; the session is gone.
    #[error("session {session} is no longer reachable")]
    UnroutableDelivery {
        /// The session that could not be reached.
        session: SessionId,
    },

    /// A frame was addressed to the rig but none is registered.
    #[error("no rig connected")]
    NoRig,

    /// The rig's outbound queue is full; the frame was not queued.
    #[error("rig queue full")]
    RigBusy,

    /// The request could not be upgraded to a `WebSocket`.
    #[error("websocket upgrade failed: {0}")]
    Upgrade(String),

    /// A session lifecycle transition that the state machine forbids.
    #[error("invalid session transition {from} -> {to}")]
    InvalidTransition {
        /// State the session was in.
        from: SessionState,
        /// State that was requested.
        to: SessionState,
    },
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::UnknownRole(_) => StatusCode::NOT_FOUND,
            Self::Upgrade(_) => StatusCode::BAD_REQUEST,
            Self::SessionConflict => StatusCode::CONFLICT,
            Self::NoRig | Self::RigBusy => StatusCode::SERVICE_UNAVAILABLE,
            Self::UnroutableDelivery { .. } | Self::InvalidTransition { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
