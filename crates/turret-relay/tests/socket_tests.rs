//! End-to-end tests over real sockets.
//!
//! The router is served on an ephemeral localhost port and driven with a
//! `WebSocket` client, so the reader and writer tasks, close frames, and
//! timeouts run exactly as they do in production.

#![allow(clippy::unwrap_used, clippy::unreachable)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use turret_core::{MonotonicClock, TurretConfig};
use turret_protocol::VideoFrame;
use turret_relay::control::run_control_forwarder;
use turret_relay::state::RelayStatus;
use turret_relay::{AppState, build_router};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(3);

async fn serve(config: TurretConfig) -> (Arc<AppState>, SocketAddr) {
    let state = Arc::new(AppState::new(config, Arc::new(MonotonicClock)));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(Arc::clone(&state));
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    tokio::spawn(run_control_forwarder(Arc::clone(&state)));
    (state, addr)
}

async fn connect(addr: SocketAddr, role: &str) -> Client {
    let (client, _response) = connect_async(format!("ws://{addr}/ws/{role}")).await.unwrap();
    client
}

async fn wait_until(state: &AppState, done: impl Fn(&RelayStatus) -> bool) {
    tokio::time::timeout(WAIT, async {
        loop {
            if done(&state.status().await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

/// Next binary frame, skipping text events and keepalives.
async fn next_binary(client: &mut Client) -> Vec<u8> {
    tokio::time::timeout(WAIT, async {
        loop {
            match client.next().await.unwrap().unwrap() {
                Message::Binary(bytes) => return bytes.to_vec(),
                Message::Close(frame) => unreachable!("closed: {frame:?}"),
                _ => {}
            }
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn dropped_operator_leaves_rig_and_other_operators_streaming() {
    let (state, addr) = serve(TurretConfig::default()).await;
    let mut rig = connect(addr, "rig").await;
    let gone = connect(addr, "operator").await;
    let mut watcher = connect(addr, "client").await;
    wait_until(&state, |s| s.rig_connected && s.operators == 2).await;

    drop(gone);
    wait_until(&state, |s| s.operators == 1).await;
    assert!(state.status().await.rig_connected);

    let frame = VideoFrame::encode(1_700_000_000_000.0, b"jpeg bytes");
    rig.send(Message::binary(frame.clone())).await.unwrap();
    assert_eq!(next_binary(&mut watcher).await, frame);

    // Control still flows the other way, translated for the rig.
    watcher
        .send(Message::binary(vec![255, 0, 127, 127, 0, 255, 0x34, 0x12]))
        .await
        .unwrap();
    let control = tokio::time::timeout(WAIT, async {
        loop {
            let bytes = next_binary(&mut rig).await;
            if bytes != [0, 0, 0, 0, 0x81, 0x81, 0, 0] {
                return bytes;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(control, [127, 0x81, 0, 0, 0x81, 127, 0x12, 0x34]);
}

#[tokio::test]
async fn second_rig_is_closed_with_policy_violation() {
    let (state, addr) = serve(TurretConfig::default()).await;
    let _rig = connect(addr, "rig").await;
    wait_until(&state, |s| s.rig_connected).await;
    let first = state.registry.lock().await.rig_id();

    let mut second = connect(addr, "pi").await;
    let message = tokio::time::timeout(WAIT, second.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let Message::Close(Some(frame)) = message else {
        unreachable!("expected a close frame");
    };
    assert_eq!(u16::from(frame.code), 1008);
    assert_eq!(frame.reason.as_str(), "rig already connected");

    assert!(state.status().await.rig_connected);
    assert_eq!(state.registry.lock().await.rig_id(), first);
}

#[tokio::test]
async fn silent_peer_is_closed_after_idle_timeout() {
    let mut config = TurretConfig::default();
    config.relay.idle_timeout_ms = 300;
    config.relay.keepalive_ms = 100;
    let (state, addr) = serve(config).await;

    // Never polled, so it never answers the relay's pings.
    let _silent = connect(addr, "operator").await;
    wait_until(&state, |s| s.operators == 1).await;
    wait_until(&state, |s| s.operators == 0).await;
}
