//! Configuration loading and typed config structures for the Turret relay.
//!
//! The configuration lives in `turret-config.yaml`. Every field has a
//! default, so an empty or missing file yields a working setup. The
//! binary validates the result with [`TurretConfig::validate`] before
//! anything is started.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Largest roster the call-sign table supports.
pub const MAX_ROSTER_SIZE: usize = 26;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Which value is wrong and why.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `turret-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TurretConfig {
    /// Listen address.
    #[serde(default)]
    pub server: ServerSection,

    /// Session relay timing and policies.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Target tracker timing and frame geometry.
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Roster, damage, and scoring.
    #[serde(default)]
    pub game: GameConfig,

    /// Log level and output format.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TurretConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for the listen address:
    /// - `TURRET_HOST` overrides `server.host`
    /// - `TURRET_PORT` overrides `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if `TURRET_PORT` is not a port number.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.server.apply_env_overrides()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.tracker;
        if t.grace_period_ms == 0 {
            return Err(invalid("tracker.grace_period_ms must be at least 1"));
        }
        if t.hard_ttl_ms < t.grace_period_ms {
            return Err(invalid("tracker.hard_ttl_ms must not be shorter than grace_period_ms"));
        }
        if !is_positive(t.frame_width) || !is_positive(t.frame_height) {
            return Err(invalid("tracker frame dimensions must be positive"));
        }
        if !is_positive(t.crosshair_threshold_px) {
            return Err(invalid("tracker.crosshair_threshold_px must be positive"));
        }

        let r = &self.relay;
        if !(1..=1000).contains(&r.control_rate_hz) {
            return Err(invalid("relay.control_rate_hz must be within 1..=1000"));
        }
        if r.outbound_queue == 0 {
            return Err(invalid("relay.outbound_queue must be at least 1"));
        }
        if r.state_broadcast_ms == 0 || r.keepalive_ms == 0 {
            return Err(invalid("relay intervals must be at least 1 ms"));
        }
        if r.send_timeout_ms == 0 || r.idle_timeout_ms == 0 {
            return Err(invalid("relay timeouts must be at least 1 ms"));
        }
        // Pongs to keepalive pings are all a spectating operator sends.
        if r.keepalive_ms >= r.idle_timeout_ms {
            return Err(invalid("relay.keepalive_ms must be shorter than idle_timeout_ms"));
        }

        let g = &self.game;
        if !(1..=MAX_ROSTER_SIZE).contains(&g.roster_size) {
            return Err(ConfigError::Invalid {
                reason: format!("game.roster_size must be within 1..={MAX_ROSTER_SIZE}"),
            });
        }
        if g.base_hp == 0 {
            return Err(invalid("game.base_hp must be at least 1"));
        }
        if g.hardcore_hp_multiplier == 0 {
            return Err(invalid("game.hardcore_hp_multiplier must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

/// Listen address configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Host address to bind (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSection {
    /// Apply `TURRET_HOST` / `TURRET_PORT` overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `TURRET_PORT` is set but is not
    /// a valid port number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("TURRET_HOST") {
            self.host = val;
        }
        if let Ok(val) = std::env::var("TURRET_PORT") {
            self.port = val.parse().map_err(|e| ConfigError::Invalid {
                reason: format!("TURRET_PORT={val}: {e}"),
            })?;
        }
        Ok(())
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// What to do when a rig connects while another rig is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RigPolicy {
    /// Close the newcomer; the registered rig keeps control.
    #[default]
    Reject,
    /// Close the registered rig and register the newcomer.
    Supersede,
}

/// How the relay treats the 8-byte timestamp header on video frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoHeaderMode {
    /// The rig supplies the header; frames without a usable one are dropped.
    #[default]
    Validate,
    /// The rig sends bare images; the relay prepends its receive time.
    Stamp,
}

/// Session relay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayConfig {
    /// Rate at which the latest actuator frame is forwarded to the rig.
    #[serde(default = "default_control_rate_hz")]
    pub control_rate_hz: u32,

    /// Age after which the latest control frame is considered stale and
    /// replaced by a single failsafe frame.
    #[serde(default = "default_control_timeout_ms")]
    pub control_timeout_ms: u64,

    /// Second-rig policy.
    #[serde(default)]
    pub rig_policy: RigPolicy,

    /// Video header handling.
    #[serde(default)]
    pub video_header: VideoHeaderMode,

    /// Per-session outbound queue depth.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    /// Deadline for a single socket write.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// A session that sends nothing for this long is closed.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Interval between keepalive pings.
    #[serde(default = "default_keepalive_ms")]
    pub keepalive_ms: u64,

    /// Interval between `game_state` broadcasts.
    #[serde(default = "default_state_broadcast_ms")]
    pub state_broadcast_ms: u64,
}

impl RelayConfig {
    /// Period between control forwards.
    pub fn control_period(&self) -> Duration {
        Duration::from_secs(1)
            .checked_div(self.control_rate_hz.max(1))
            .unwrap_or(Duration::from_millis(50))
    }

    /// [`control_timeout_ms`](Self::control_timeout_ms) as a duration.
    pub const fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    /// [`send_timeout_ms`](Self::send_timeout_ms) as a duration.
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// [`idle_timeout_ms`](Self::idle_timeout_ms) as a duration.
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// [`keepalive_ms`](Self::keepalive_ms) as a duration.
    pub const fn keepalive(&self) -> Duration {
        Duration::from_millis(self.keepalive_ms)
    }

    /// [`state_broadcast_ms`](Self::state_broadcast_ms) as a duration.
    pub const fn state_broadcast(&self) -> Duration {
        Duration::from_millis(self.state_broadcast_ms)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            control_rate_hz: default_control_rate_hz(),
            control_timeout_ms: default_control_timeout_ms(),
            rig_policy: RigPolicy::default(),
            video_header: VideoHeaderMode::default(),
            outbound_queue: default_outbound_queue(),
            send_timeout_ms: default_send_timeout_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            keepalive_ms: default_keepalive_ms(),
            state_broadcast_ms: default_state_broadcast_ms(),
        }
    }
}

/// Target tracker configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackerConfig {
    /// How long a target stays active after its last sighting.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// How long an unrefreshed target is kept before it is forgotten.
    #[serde(default = "default_hard_ttl_ms")]
    pub hard_ttl_ms: u64,

    /// Camera frame width in pixels.
    #[serde(default = "default_frame_width")]
    pub frame_width: f64,

    /// Camera frame height in pixels.
    #[serde(default = "default_frame_height")]
    pub frame_height: f64,

    /// Radius around the frame centre that counts as "under the crosshair".
    #[serde(default = "default_crosshair_threshold_px")]
    pub crosshair_threshold_px: f64,
}

impl TrackerConfig {
    /// [`grace_period_ms`](Self::grace_period_ms) as a duration.
    pub const fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// [`hard_ttl_ms`](Self::hard_ttl_ms) as a duration.
    pub const fn hard_ttl(&self) -> Duration {
        Duration::from_millis(self.hard_ttl_ms)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            hard_ttl_ms: default_hard_ttl_ms(),
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            crosshair_threshold_px: default_crosshair_threshold_px(),
        }
    }
}

/// Roster, damage, and scoring configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameConfig {
    /// Number of enemies per game (`ALPHA`, `BRAVO`, ...).
    #[serde(default = "default_roster_size")]
    pub roster_size: usize,

    /// Starting hit points per enemy in casual mode.
    #[serde(default = "default_base_hp")]
    pub base_hp: u32,

    /// Damage a vanguard loadout deals per hit.
    #[serde(default = "default_damage_per_hit")]
    pub damage_per_hit: u32,

    /// Hit point multiplier applied in hardcore mode.
    #[serde(default = "default_hardcore_hp_multiplier")]
    pub hardcore_hp_multiplier: u32,

    /// Points awarded per enemy hit.
    #[serde(default = "default_score_per_hit")]
    pub score_per_hit: u64,

    /// Bonus points per enemy brought to zero.
    #[serde(default = "default_score_per_kill")]
    pub score_per_kill: u64,

    /// Length of one mission.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Number of finished games kept on the leaderboard.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
}

impl GameConfig {
    /// [`duration_secs`](Self::duration_secs) as a duration.
    pub const fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            roster_size: default_roster_size(),
            base_hp: default_base_hp(),
            damage_per_hit: default_damage_per_hit(),
            hardcore_hp_multiplier: default_hardcore_hp_multiplier(),
            score_per_hit: default_score_per_hit(),
            score_per_kill: default_score_per_kill(),
            duration_secs: default_duration_secs(),
            leaderboard_size: default_leaderboard_size(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8000
}

const fn default_control_rate_hz() -> u32 {
    20
}

const fn default_control_timeout_ms() -> u64 {
    500
}

const fn default_outbound_queue() -> usize {
    64
}

const fn default_send_timeout_ms() -> u64 {
    2_000
}

const fn default_idle_timeout_ms() -> u64 {
    30_000
}

const fn default_keepalive_ms() -> u64 {
    10_000
}

const fn default_state_broadcast_ms() -> u64 {
    1_000
}

const fn default_grace_period_ms() -> u64 {
    500
}

const fn default_hard_ttl_ms() -> u64 {
    5_000
}

const fn default_frame_width() -> f64 {
    640.0
}

const fn default_frame_height() -> f64 {
    480.0
}

const fn default_crosshair_threshold_px() -> f64 {
    50.0
}

const fn default_roster_size() -> usize {
    5
}

const fn default_base_hp() -> u32 {
    100
}

const fn default_damage_per_hit() -> u32 {
    10
}

const fn default_hardcore_hp_multiplier() -> u32 {
    2
}

const fn default_score_per_hit() -> u64 {
    100
}

const fn default_score_per_kill() -> u64 {
    500
}

const fn default_duration_secs() -> u64 {
    120
}

const fn default_leaderboard_size() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_owned()
}
