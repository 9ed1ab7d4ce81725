//! Wire protocol types shared by every Turret crate.
//!
//! This crate owns the byte layouts and JSON shapes that cross a socket.
//! It performs no I/O.
//!
//! # Modules
//!
//! - [`codec`] -- Operator [`ControlFrame`] to rig [`ActuatorFrame`]
//!   translation.
//! - [`video`] -- The 8-byte timestamp header carried by every video frame.
//! - [`messages`] -- JSON text messages: rig detections, operator commands,
//!   and server events.
//! - [`error`] -- [`ProtocolError`].
//!
//! [`ControlFrame`]: codec::ControlFrame
//! [`ActuatorFrame`]: codec::ActuatorFrame
//! [`ProtocolError`]: error::ProtocolError

pub mod codec;
pub mod error;
pub mod messages;
pub mod video;

pub use codec::{
    ActuatorFrame, CONTROL_FRAME_LEN, ControlFrame, encode_actuator, scale_axis, translate_control,
};
pub use error::ProtocolError;
pub use messages::{
    Detection, EnemyView, GameMode, GameStateView, LeaderboardEntry, Loadout, OperatorCommand,
    Point, RigMessage, ServerEvent, ShotReport,
};
pub use video::{VIDEO_HEADER_LEN, VideoFrame};
