//! Most-recent-wins control path from operators to the rig.
//!
//! Operators write translated frames into a [`ControlCell`]; whoever
//! wrote last wins. A single forwarder task samples the cell at
//! `control_rate_hz` and sends to the rig, so actuator timing does not
//! depend on how often operators send. When input goes stale the
//! forwarder sends a failsafe frame until one reaches the rig's queue,
//! then goes quiet.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use turret_protocol::{ActuatorFrame, ControlFrame, encode_actuator};

use crate::error::RelayError;
use crate::session::{Outbound, SessionId};
use crate::state::AppState;

/// The last control frame any operator sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestControl {
    /// Translated frame, ready for the rig.
    pub frame: ActuatorFrame,
    /// When the relay received it.
    pub received_at: Instant,
    /// Operator that sent it.
    pub source: SessionId,
}

/// Lock-protected slot holding the latest control frame.
#[derive(Debug, Default)]
pub struct ControlCell {
    latest: Mutex<Option<LatestControl>>,
}

impl ControlCell {
    /// An empty cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot.
    pub async fn store(&self, frame: ActuatorFrame, source: SessionId, received_at: Instant) {
        *self.latest.lock().await = Some(LatestControl {
            frame,
            received_at,
            source,
        });
    }

    /// Copy of the slot.
    pub async fn latest(&self) -> Option<LatestControl> {
        *self.latest.lock().await
    }
}

/// What the forwarder should do on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardDecision {
    /// Send this fresh frame.
    Send(ActuatorFrame),
    /// Input went stale: send this neutral frame and, once it is queued
    /// for the rig, report it with
    /// [`confirm_failsafe`](ControlForwarder::confirm_failsafe).
    Failsafe(ActuatorFrame),
    /// Nothing to send.
    Quiet,
}

/// Staleness state machine for the forwarder.
#[derive(Debug, Clone)]
pub struct ControlForwarder {
    timeout: Duration,
    failsafe_sent: bool,
}

impl ControlForwarder {
    /// Frames older than `timeout` are stale.
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            failsafe_sent: false,
        }
    }

    /// The frame sent when input goes stale: the idle operator frame
    /// run through the codec.
    pub fn failsafe_frame() -> ActuatorFrame {
        encode_actuator(&ControlFrame::IDLE)
    }

    /// Decide what to send at `now` given the cell's contents.
    pub fn next(&mut self, latest: Option<&LatestControl>, now: Instant) -> ForwardDecision {
        let Some(latest) = latest else {
            return ForwardDecision::Quiet;
        };
        if now.saturating_duration_since(latest.received_at) < self.timeout {
            self.failsafe_sent = false;
            return ForwardDecision::Send(latest.frame);
        }
        if self.failsafe_sent {
            return ForwardDecision::Quiet;
        }
        ForwardDecision::Failsafe(Self::failsafe_frame())
    }

    /// Record that the failsafe frame reached the rig's queue. Until this
    /// is called, every stale tick yields [`ForwardDecision::Failsafe`].
    pub const fn confirm_failsafe(&mut self) {
        self.failsafe_sent = true;
    }
}

/// Sample the control cell at the configured rate and forward to the rig.
///
/// Runs until the task is aborted.
pub async fn run_control_forwarder(state: Arc<AppState>) {
    let relay = &state.config.relay;
    let mut forwarder = ControlForwarder::new(relay.control_timeout());
    let mut interval = tokio::time::interval(relay.control_period());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        rate_hz = relay.control_rate_hz,
        timeout_ms = relay.control_timeout_ms,
        "Control forwarder started"
    );

    loop {
        interval.tick().await;
        forward_once(&state, &mut forwarder).await;
    }
}

/// One forwarder tick: sample the cell and send whatever is due.
pub async fn forward_once(state: &AppState, forwarder: &mut ControlForwarder) {
    let latest = state.control.latest().await;
    match forwarder.next(latest.as_ref(), state.clock.now()) {
        ForwardDecision::Send(frame) => {
            deliver_to_rig(state, frame).await;
        }
        ForwardDecision::Failsafe(frame) => {
            if deliver_to_rig(state, frame).await {
                info!("Control input stale, failsafe frame sent");
                forwarder.confirm_failsafe();
            }
        }
        ForwardDecision::Quiet => {}
    }
}

/// Queue `frame` for the rig. Returns whether it was queued.
async fn deliver_to_rig(state: &AppState, frame: ActuatorFrame) -> bool {
    let message = Outbound::Binary(Bytes::copy_from_slice(&frame.to_bytes()));
    match state.registry.lock().await.send_to_rig(message) {
        Ok(()) => true,
        Err(RelayError::NoRig) => false,
        Err(RelayError::UnroutableDelivery { session }) => {
            warn!(%session, "Rig unreachable, session removed");
            false
        }
        Err(e) => {
            debug!(error = %e, "Control frame not delivered");
            false
        }
    }
}
