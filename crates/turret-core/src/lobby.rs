//! Pilot queue, timed missions, and leaderboard.
//!
//! Operators join a FIFO queue by name. When no mission is running the
//! head of the queue becomes the pilot and gets a fresh [`GameState`].
//! A mission ends when its timer runs out, every enemy is down, the
//! pilot stops it, or the pilot leaves. Finished missions go on a
//! bounded leaderboard.
//!
//! Every queue entry and mission is owned by the connection that joined
//! it, identified by a [`Uuid`]. Commands and departures are matched on
//! that owner, never on the display name, and an owner holds at most one
//! entry at a time.
//!
//! The lobby is driven by [`tick`](Lobby::tick); nothing here spawns
//! tasks or reads the wall clock directly.

use std::cmp::Reverse;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;
use turret_protocol::{Detection, GameMode, GameStateView, LeaderboardEntry, Loadout};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::{GameConfig, TrackerConfig, TurretConfig};
use crate::game::{GameState, ShotResult};

/// Name used when a pilot joins without one.
pub const ANONYMOUS_PILOT: &str = "Anonymous";

/// Longest pilot name kept, in characters.
pub const MAX_PILOT_NAME_CHARS: usize = 32;

/// Errors from lobby commands.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LobbyError {
    /// The name is taken, or the sender already holds a queue entry or
    /// the active mission.
    #[error("pilot {name} is already queued or flying")]
    AlreadyQueued {
        /// The conflicting pilot name.
        name: String,
    },

    /// The command needs the active pilot and came from someone else.
    #[error("sender is not the active pilot")]
    NotPilot,

    /// The command needs a running mission and none is.
    #[error("no game is active")]
    NoActiveGame,
}

#[derive(Debug, Clone)]
struct QueuedPilot {
    owner: Uuid,
    name: String,
    mode: GameMode,
    loadout: Loadout,
}

#[derive(Debug)]
struct Mission {
    owner: Uuid,
    pilot: String,
    started_at: Instant,
    score: u64,
    game: GameState,
}

/// Queue, active mission, and leaderboard.
#[derive(Debug)]
pub struct Lobby {
    queue: VecDeque<QueuedPilot>,
    active: Option<Mission>,
    leaderboard: Vec<LeaderboardEntry>,
    game_config: GameConfig,
    tracker_config: TrackerConfig,
    clock: Arc<dyn Clock>,
}

/// Trim and cap a requested pilot name; blank names become anonymous.
pub fn normalize_pilot_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return ANONYMOUS_PILOT.to_owned();
    }
    trimmed.chars().take(MAX_PILOT_NAME_CHARS).collect()
}

impl Lobby {
    /// Create an idle lobby.
    pub fn new(config: &TurretConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue: VecDeque::new(),
            active: None,
            leaderboard: Vec::new(),
            game_config: config.game.clone(),
            tracker_config: config.tracker.clone(),
            clock,
        }
    }

    /// Add a pilot owned by `owner` to the back of the queue. Returns the
    /// normalized name the pilot is known by.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::AlreadyQueued`] if `owner` already holds an
    /// entry, or if the name is waiting or is the active pilot.
    pub fn join_queue(
        &mut self,
        owner: Uuid,
        name: &str,
        mode: GameMode,
        loadout: Loadout,
    ) -> Result<String, LobbyError> {
        if let Some(held) = self.pilot_of(owner) {
            return Err(LobbyError::AlreadyQueued {
                name: held.to_owned(),
            });
        }
        let name = normalize_pilot_name(name);
        let flying = self.active_pilot() == Some(name.as_str());
        if flying || self.queue.iter().any(|p| p.name == name) {
            return Err(LobbyError::AlreadyQueued { name });
        }
        info!(pilot = %name, %mode, %loadout, position = self.queue.len(), "Pilot queued");
        self.queue.push_back(QueuedPilot {
            owner,
            name: name.clone(),
            mode,
            loadout,
        });
        Ok(name)
    }

    /// Promote the head of the queue if no mission is running. Returns the
    /// new pilot's name.
    pub fn start_next(&mut self) -> Option<String> {
        if self.active.is_some() {
            return None;
        }
        let next = self.queue.pop_front()?;
        let mut game = GameState::new(
            self.game_config.clone(),
            self.tracker_config.clone(),
            Arc::clone(&self.clock),
        );
        game.init_game(&next.name, next.mode, next.loadout);
        info!(pilot = %next.name, waiting = self.queue.len(), "Mission started");
        self.active = Some(Mission {
            owner: next.owner,
            pilot: next.name.clone(),
            started_at: self.clock.now(),
            score: 0,
            game,
        });
        Some(next.name)
    }

    /// End the active mission at its owner's request.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::NoActiveGame`] when idle, or
    /// [`LobbyError::NotPilot`] if `owner` does not own the mission.
    pub fn stop(&mut self, owner: Uuid) -> Result<LeaderboardEntry, LobbyError> {
        self.mission_for(owner)?;
        self.finish("stopped").ok_or(LobbyError::NoActiveGame)
    }

    /// Credit bonus points to the active mission. Returns the new score.
    ///
    /// # Errors
    ///
    /// Same as [`stop`](Self::stop).
    pub fn add_score(&mut self, owner: Uuid, points: u32) -> Result<u64, LobbyError> {
        let mission = self.mission_for(owner)?;
        mission.score = mission.score.saturating_add(u64::from(points));
        Ok(mission.score)
    }

    /// Shoot on behalf of the active pilot and score the result.
    ///
    /// # Errors
    ///
    /// Same as [`stop`](Self::stop).
    pub fn fire(&mut self, owner: Uuid) -> Result<ShotResult, LobbyError> {
        let per_hit = self.game_config.score_per_hit;
        let per_kill = self.game_config.score_per_kill;
        let mission = self.mission_for(owner)?;
        let result = mission.game.attempt_shot();
        let earned = count(result.hits.len())
            .saturating_mul(per_hit)
            .saturating_add(count(result.kills.len()).saturating_mul(per_kill));
        mission.score = mission.score.saturating_add(earned);
        Ok(result)
    }

    /// Route a frame's detections to the active game. Returns the number
    /// of targets written, zero when idle.
    pub fn observe(&mut self, detections: &[Detection]) -> usize {
        self.active
            .as_mut()
            .map_or(0, |mission| mission.game.observe(detections))
    }

    /// Withdraw whatever `owner` holds: its queue entry, or its mission,
    /// which is ended and recorded. Returns whether anything changed.
    pub fn leave(&mut self, owner: Uuid) -> bool {
        let queued_before = self.queue.len();
        self.queue.retain(|p| p.owner != owner);
        let mut changed = self.queue.len() != queued_before;
        if self.active.as_ref().is_some_and(|m| m.owner == owner) {
            changed |= self.finish("pilot left").is_some();
        }
        changed
    }

    /// Advance mission state: end an expired or cleared mission, prune the
    /// tracker, and start the next pilot. Returns whether the visible state
    /// changed.
    pub fn tick(&mut self) -> bool {
        let mut changed = false;
        if let Some(mission) = self.active.as_mut() {
            mission.game.prune();
            if mission.game.all_down() {
                changed |= self.finish("roster cleared").is_some();
            } else if self.time_left().is_zero() {
                changed |= self.finish("time expired").is_some();
            }
        }
        changed |= self.start_next().is_some();
        changed
    }

    /// Time remaining in the active mission; zero when idle.
    pub fn time_left(&self) -> Duration {
        self.active.as_ref().map_or(Duration::ZERO, |mission| {
            let elapsed = self.clock.now().saturating_duration_since(mission.started_at);
            self.game_config.duration().saturating_sub(elapsed)
        })
    }

    /// Name of the active pilot.
    pub fn active_pilot(&self) -> Option<&str> {
        self.active.as_ref().map(|m| m.pilot.as_str())
    }

    /// Name of the entry `owner` holds, queued or flying.
    pub fn pilot_of(&self, owner: Uuid) -> Option<&str> {
        self.active
            .as_ref()
            .filter(|m| m.owner == owner)
            .map(|m| m.pilot.as_str())
            .or_else(|| {
                self.queue
                    .iter()
                    .find(|p| p.owner == owner)
                    .map(|p| p.name.as_str())
            })
    }

    /// The active mission's game.
    pub fn game(&self) -> Option<&GameState> {
        self.active.as_ref().map(|m| &m.game)
    }

    /// The active mission's score.
    pub fn score(&self) -> Option<u64> {
        self.active.as_ref().map(|m| m.score)
    }

    /// Waiting pilot names, head first.
    pub fn queued(&self) -> Vec<String> {
        self.queue.iter().map(|p| p.name.clone()).collect()
    }

    /// Finished missions, best first.
    pub fn leaderboard(&self) -> &[LeaderboardEntry] {
        &self.leaderboard
    }

    /// Snapshot for the `game_state` event.
    pub fn view(&self) -> GameStateView {
        let remaining = self.time_left();
        let time_left = remaining
            .as_secs()
            .saturating_add(u64::from(remaining.subsec_nanos() > 0));
        GameStateView {
            active: self.active.is_some(),
            player: self.active.as_ref().map(|m| m.pilot.clone()),
            mode: self.game().map(GameState::mode),
            loadout: self.game().map(GameState::loadout),
            time_left,
            score: self.score().unwrap_or(0),
            queue: self.queued(),
            leaderboard: self.leaderboard.clone(),
            enemies: self.game().map(GameState::enemy_views).unwrap_or_default(),
        }
    }

    fn mission_for(&mut self, owner: Uuid) -> Result<&mut Mission, LobbyError> {
        let mission = self.active.as_mut().ok_or(LobbyError::NoActiveGame)?;
        if mission.owner != owner {
            return Err(LobbyError::NotPilot);
        }
        Ok(mission)
    }

    fn finish(&mut self, reason: &str) -> Option<LeaderboardEntry> {
        let mission = self.active.take()?;
        let entry = LeaderboardEntry {
            name: mission.pilot,
            score: mission.score,
        };
        info!(pilot = %entry.name, score = entry.score, reason, "Mission finished");

        // Stable sort keeps earlier finishes ahead on equal scores.
        self.leaderboard.push(entry.clone());
        self.leaderboard.sort_by_key(|e| Reverse(e.score));
        self.leaderboard.truncate(self.game_config.leaderboard_size);
        Some(entry)
    }
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}
