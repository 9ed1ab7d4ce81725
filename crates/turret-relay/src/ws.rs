//! `WebSocket` endpoint for rig and operator sessions.
//!
//! Clients connect to `GET /ws/{role}`. After the upgrade the socket is
//! split: a reader task routes inbound frames, a writer task drains the
//! session's outbound queue. When either ends the other is aborted and
//! the session is torn down. Other sessions are not touched.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::routing;
use crate::session::{Outbound, Session, SessionId, SessionRole};
use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` session.
///
/// # Route
///
/// `GET /ws/{role}` where `role` is `rig`, `pi`, `operator`, or
/// `client`. Unknown roles get 404; requests that are not upgrades get
/// 400.
pub async fn ws_session(
    Path(role): Path<String>,
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let role = match role.parse::<SessionRole>() {
        Ok(role) => role,
        Err(e) => return e.into_response(),
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return RelayError::Upgrade(rejection.body_text()).into_response(),
    };
    ws.on_upgrade(move |socket| run_session(socket, role, state))
}

/// Drive one connection from registration to teardown.
async fn run_session(mut socket: WebSocket, role: SessionRole, state: Arc<AppState>) {
    let (mut session, rx) = match state.connect(role).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!(%role, error = %e, "Session refused");
            refuse(&mut socket, &e, state.config.relay.send_timeout()).await;
            return;
        }
    };

    let relay = &state.config.relay;
    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(
        sink,
        rx,
        session.id(),
        relay.send_timeout(),
        relay.keepalive(),
    ));
    let mut reader = tokio::spawn(read_loop(
        stream,
        Arc::clone(&state),
        session.clone(),
        relay.idle_timeout(),
    ));

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    state.disconnect(&mut session).await;
}

/// Close a connection that could not be registered.
async fn refuse(socket: &mut WebSocket, error: &RelayError, send_timeout: Duration) {
    let code = match error {
        RelayError::SessionConflict => close_code::POLICY,
        _ => close_code::ERROR,
    };
    let frame = CloseFrame {
        code,
        reason: error.to_string().into(),
    };
    if !matches!(
        timeout(send_timeout, socket.send(Message::Close(Some(frame)))).await,
        Ok(Ok(()))
    ) {
        debug!("Close frame not delivered to refused peer");
    }
}

/// Receive frames until the peer closes, errors, or goes idle.
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    state: Arc<AppState>,
    session: Session,
    idle_timeout: Duration,
) {
    let id = session.id();
    loop {
        let Ok(next) = timeout(idle_timeout, stream.next()).await else {
            info!(session = %id, "Session idle, closing");
            return;
        };
        match next {
            Some(Ok(Message::Binary(payload))) => {
                routing::route_binary(&state, &session, payload).await;
            }
            Some(Ok(Message::Text(text))) => {
                routing::route_text(&state, &session, text.as_str()).await;
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => {
                debug!(session = %id, "Peer closed");
                return;
            }
            Some(Err(e)) => {
                debug!(session = %id, error = %e, "Receive failed");
                return;
            }
        }
    }
}

/// Drain the outbound queue into the socket, pinging while quiet.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
    id: SessionId,
    send_timeout: Duration,
    keepalive: Duration,
) {
    let mut ping = tokio::time::interval(keepalive);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.reset();

    loop {
        let (message, last) = tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(Outbound::Binary(bytes)) => (Message::Binary(bytes), false),
                Some(Outbound::Text(text)) => (Message::Text(text.into()), false),
                Some(Outbound::Close { reason }) => {
                    let frame = CloseFrame { code: close_code::NORMAL, reason: reason.into() };
                    (Message::Close(Some(frame)), true)
                }
                None => return,
            },
            _ = ping.tick() => (Message::Ping(Bytes::new()), false),
        };

        match timeout(send_timeout, sink.send(message)).await {
            Ok(Ok(())) if !last => {}
            Ok(Ok(())) => return,
            Ok(Err(e)) => {
                debug!(session = %id, error = %e, "Send failed");
                return;
            }
            Err(_) => {
                warn!(session = %id, timeout = ?send_timeout, "Send timed out");
                return;
            }
        }
    }
}
