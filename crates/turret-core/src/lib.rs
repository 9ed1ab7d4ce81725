//! Target tracking and hit resolution for the Turret rig.
//!
//! Everything in this crate is synchronous and free of I/O. The relay
//! wraps these types in locks and drives them from socket tasks.
//!
//! # Modules
//!
//! - [`clock`] -- [`Clock`] trait with monotonic and manual sources.
//! - [`config`] -- `turret-config.yaml` loading into [`TurretConfig`].
//! - [`tracker`] -- [`TargetTracker`]: detections in, live targets out,
//!   with a grace period and a hard time-to-live.
//! - [`game`] -- [`GameState`]: enemy roster, alias resolution, and
//!   [`ShotResult`]s.
//! - [`lobby`] -- [`Lobby`]: pilot queue, timed missions, and leaderboard.
//!
//! [`Clock`]: clock::Clock
//! [`TurretConfig`]: config::TurretConfig
//! [`TargetTracker`]: tracker::TargetTracker
//! [`GameState`]: game::GameState
//! [`ShotResult`]: game::ShotResult
//! [`Lobby`]: lobby::Lobby

pub mod clock;
pub mod config;
pub mod game;
pub mod lobby;
pub mod tracker;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ConfigError, TurretConfig};
pub use game::{Enemy, GameState, ShotResult, resolve_alias};
pub use lobby::{Lobby, LobbyError};
pub use tracker::{Target, TargetTracker};
