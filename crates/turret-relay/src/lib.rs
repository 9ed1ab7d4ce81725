//! Session relay between the Turret rig and its operators.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/{role}`) where the rig streams video
//!   and detections and operators stream control frames and lobby
//!   commands
//! - **REST endpoints** for relay status and the leaderboard
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! Every connection becomes a [`Session`] with a reader task and a writer
//! task. Readers route inbound frames through [`routing`]; writers drain a
//! bounded per-session queue so a slow operator never stalls the rig.
//! Two background loops run next to the server: the control forwarder
//! ([`control::run_control_forwarder`]) sends the most recent actuator
//! frame to the rig at a fixed rate, and the mission clock
//! ([`mission::run_mission_clock`]) ticks the lobby and broadcasts game
//! state.
//!
//! [`Session`]: session::Session

pub mod control;
pub mod error;
pub mod handlers;
pub mod mission;
pub mod registry;
pub mod router;
pub mod routing;
pub mod server;
pub mod session;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::RelayError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use startup::{RelayHandles, StartupError, spawn_relay};
pub use state::AppState;
