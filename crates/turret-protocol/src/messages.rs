//! JSON text messages exchanged over the relay sockets.
//!
//! Binary frames carry video and control; everything else is a JSON text
//! frame:
//!
//! - rig -> relay: [`RigMessage`] (marker detections)
//! - operator -> relay: [`OperatorCommand`] (lobby and fire commands)
//! - relay -> operators: [`ServerEvent`] (game state and shot results)

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A pixel coordinate in the camera frame. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    /// Horizontal pixel offset from the left edge.
    pub x: f64,
    /// Vertical pixel offset from the top edge.
    pub y: f64,
}

impl Point {
    /// Construct a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// One decoded marker reported by the rig's detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Marker payload text, e.g. `ALPHA` or `enemy_2`.
    #[serde(alias = "text")]
    pub id: String,
    /// Bounding polygon, ordered, in frame pixels.
    #[serde(alias = "bbox")]
    pub polygon: Vec<Point>,
}

impl Detection {
    /// Construct a detection from an identifier and polygon.
    pub fn new(id: impl Into<String>, polygon: Vec<Point>) -> Self {
        Self {
            id: id.into(),
            polygon,
        }
    }
}

// ---------------------------------------------------------------------------
// Rig -> relay
// ---------------------------------------------------------------------------

/// Text messages a rig may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RigMessage {
    /// Markers visible in the most recent frame.
    Detections {
        /// Every marker decoded from that frame.
        detections: Vec<Detection>,
    },
}

impl RigMessage {
    /// Parse a rig text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidMessage`] if `text` is not a known
    /// rig message.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

// ---------------------------------------------------------------------------
// Operator -> relay
// ---------------------------------------------------------------------------

/// Difficulty selected when joining the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Standard enemy hit points.
    #[default]
    Casual,
    /// Enemies carry multiplied hit points.
    Hardcore,
}

/// Weapon profile selected when joining the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loadout {
    /// Balanced damage.
    #[default]
    Vanguard,
    /// Light rounds, half damage.
    Interceptor,
    /// Heavy rounds, two and a half times damage.
    Juggernaut,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Casual => f.write_str("casual"),
            Self::Hardcore => f.write_str("hardcore"),
        }
    }
}

impl fmt::Display for Loadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vanguard => f.write_str("vanguard"),
            Self::Interceptor => f.write_str("interceptor"),
            Self::Juggernaut => f.write_str("juggernaut"),
        }
    }
}

/// Text commands an operator may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OperatorCommand {
    /// Enter the pilot queue under `name`.
    JoinQueue {
        /// Display name; empty means anonymous.
        #[serde(default)]
        name: String,
        /// Requested difficulty.
        #[serde(default)]
        mode: GameMode,
        /// Requested weapon profile.
        #[serde(default)]
        loadout: Loadout,
    },
    /// End the sender's active game early.
    StopGame,
    /// Credit bonus points to the sender's active game.
    AddScore {
        /// Points to add.
        score: u32,
    },
    /// Pull the trigger.
    Fire,
}

impl OperatorCommand {
    /// Parse an operator text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidMessage`] if `text` is not a known
    /// command.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

// ---------------------------------------------------------------------------
// Relay -> operators
// ---------------------------------------------------------------------------

/// Public view of one roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyView {
    /// Canonical call sign.
    pub id: String,
    /// Remaining hit points.
    pub hp: u32,
    /// Starting hit points.
    pub max_hp: u32,
    /// Whether `hp > 0`.
    pub alive: bool,
}

/// One finished game on the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Pilot name.
    pub name: String,
    /// Final score.
    pub score: u64,
}

/// Snapshot of the lobby and active game pushed to every operator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameStateView {
    /// Whether a game is running.
    pub active: bool,
    /// Active pilot, if any.
    pub player: Option<String>,
    /// Active game's difficulty.
    pub mode: Option<GameMode>,
    /// Active game's weapon profile.
    pub loadout: Option<Loadout>,
    /// Whole seconds left in the active game.
    pub time_left: u64,
    /// Active game's score.
    pub score: u64,
    /// Waiting pilot names, head first.
    pub queue: Vec<String>,
    /// Best finished games, highest first.
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Active game's roster.
    pub enemies: Vec<EnemyView>,
}

/// Outcome of one `fire` command, sent to the firing operator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShotReport {
    /// Always true once the shot was taken.
    pub fired: bool,
    /// Call signs that took damage.
    pub hits: Vec<String>,
    /// Damage applied per call sign.
    pub damage: BTreeMap<String, u32>,
    /// Call signs brought to zero hit points by this shot.
    pub kills: Vec<String>,
}

/// Text events the relay pushes to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Periodic and on-change lobby snapshot.
    GameState(GameStateView),
    /// Result of the recipient's last shot.
    ShotResult(ShotReport),
}

impl ServerEvent {
    /// Serialize for a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidMessage`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn detections_accept_detector_field_names() {
        let text = r#"{"type":"detections","detections":[
            {"text":"ALPHA","bbox":[[300,220],[340,220],[340,260],[300,260]]}
        ]}"#;
        let RigMessage::Detections { detections } = RigMessage::from_json(text).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].id, "ALPHA");
        assert_eq!(detections[0].polygon[2], Point::new(340.0, 260.0));
    }

    #[test]
    fn detections_accept_canonical_field_names() {
        let text = r#"{"type":"detections","detections":[{"id":"enemy_1","polygon":[[1.5,2]]}]}"#;
        let RigMessage::Detections { detections } = RigMessage::from_json(text).unwrap();
        assert_eq!(detections[0].polygon, vec![Point::new(1.5, 2.0)]);
    }

    #[test]
    fn join_queue_defaults_mode_and_loadout() {
        let cmd = OperatorCommand::from_json(r#"{"action":"join_queue","name":"Ace"}"#).unwrap();
        assert_eq!(
            cmd,
            OperatorCommand::JoinQueue {
                name: "Ace".to_owned(),
                mode: GameMode::Casual,
                loadout: Loadout::Vanguard,
            }
        );
    }

    #[test]
    fn parses_remaining_commands() {
        let join = r#"{"action":"join_queue","name":"B","mode":"hardcore","loadout":"juggernaut"}"#;
        assert!(matches!(
            OperatorCommand::from_json(join).unwrap(),
            OperatorCommand::JoinQueue { mode: GameMode::Hardcore, loadout: Loadout::Juggernaut, .. }
        ));
        assert_eq!(
            OperatorCommand::from_json(r#"{"action":"stop_game"}"#).unwrap(),
            OperatorCommand::StopGame
        );
        assert_eq!(
            OperatorCommand::from_json(r#"{"action":"add_score","score":25}"#).unwrap(),
            OperatorCommand::AddScore { score: 25 }
        );
        assert_eq!(
            OperatorCommand::from_json(r#"{"action":"fire"}"#).unwrap(),
            OperatorCommand::Fire
        );
    }

    #[test]
    fn unknown_command_is_invalid() {
        let err = OperatorCommand::from_json(r#"{"action":"self_destruct"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn game_state_event_is_tagged() {
        let event = ServerEvent::GameState(GameStateView {
            active: true,
            player: Some("Ace".to_owned()),
            time_left: 42,
            ..GameStateView::default()
        });
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "game_state");
        assert_eq!(json["player"], "Ace");
        assert_eq!(json["time_left"], 42);
        assert!(json["queue"].is_array());
    }

    #[test]
    fn point_distance() {
        let d = Point::new(0.0, 0.0).distance_to(Point::new(3.0, 4.0));
        assert_eq!(d, 5.0);
    }
}
