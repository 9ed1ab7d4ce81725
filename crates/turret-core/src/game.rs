//! Targeting engine: enemy roster and shot resolution.
//!
//! A game owns a fixed roster of enemies with canonical call signs
//! (`ALPHA`, `BRAVO`, ...) and a [`TargetTracker`] scoped to that game.
//! Each shot reads the tracker's crosshair set, maps every marker to a
//! roster slot with [`resolve_alias`], and applies one hit of damage per
//! enemy.
//!
//! ## Shot rules
//!
//! - A shot always fires; there is no ammunition or cooldown here.
//! - An enemy takes at most one hit per shot, even if several markers in
//!   the crosshair resolve to it.
//! - Enemies already at zero hit points are skipped and do not appear in
//!   [`ShotResult::hits`].
//! - Markers that resolve to nothing are ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info};
use turret_protocol::{Detection, EnemyView, GameMode, Loadout, ShotReport};

use crate::clock::Clock;
use crate::config::{GameConfig, MAX_ROSTER_SIZE, TrackerConfig};
use crate::tracker::TargetTracker;

/// Canonical call signs, in roster order.
pub const CALL_SIGNS: [&str; MAX_ROSTER_SIZE] = [
    "ALPHA", "BRAVO", "CHARLIE", "DELTA", "ECHO", "FOXTROT", "GOLF", "HOTEL", "INDIA", "JULIETT",
    "KILO", "LIMA", "MIKE", "NOVEMBER", "OSCAR", "PAPA", "QUEBEC", "ROMEO", "SIERRA", "TANGO",
    "UNIFORM", "VICTOR", "WHISKEY", "XRAY", "YANKEE", "ZULU",
];

/// Case-insensitive prefix of the numbered alias form `enemy_<N>`.
const NUMBERED_ALIAS_PREFIX: &str = "enemy_";

/// One roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enemy {
    /// Canonical call sign.
    pub id: String,
    /// Remaining hit points, always within `0..=max_hp`.
    pub hp: u32,
    /// Starting hit points.
    pub max_hp: u32,
}

impl Enemy {
    /// A fresh enemy at full health.
    pub fn new(id: impl Into<String>, max_hp: u32) -> Self {
        Self {
            id: id.into(),
            hp: max_hp,
            max_hp,
        }
    }

    /// Whether the enemy still has hit points.
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Subtract `amount` hit points, stopping at zero. Returns the damage
    /// actually applied.
    pub const fn apply_damage(&mut self, amount: u32) -> u32 {
        let applied = if amount < self.hp { amount } else { self.hp };
        self.hp = self.hp.saturating_sub(applied);
        applied
    }

    /// Wire representation.
    pub fn view(&self) -> EnemyView {
        EnemyView {
            id: self.id.clone(),
            hp: self.hp,
            max_hp: self.max_hp,
            alive: self.is_alive(),
        }
    }
}

/// Outcome of one [`GameState::attempt_shot`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShotResult {
    /// True for every completed shot.
    pub fired: bool,
    /// Call signs that took damage, in roster order.
    pub hits: Vec<String>,
    /// Damage applied per call sign.
    pub damage: BTreeMap<String, u32>,
    /// Call signs this shot brought to zero hit points.
    pub kills: Vec<String>,
}

impl ShotResult {
    /// Wire representation.
    pub fn report(&self) -> ShotReport {
        ShotReport {
            fired: self.fired,
            hits: self.hits.clone(),
            damage: self.damage.clone(),
            kills: self.kills.clone(),
        }
    }
}

/// Map a marker identifier to a roster index.
///
/// Resolution order:
/// 1. exact match against a canonical call sign;
/// 2. `enemy_<N>` (prefix case-insensitive, `N` decimal digits, 1-based)
///    mapped to index `N - 1` when that slot exists.
///
/// Anything else resolves to `None`.
pub fn resolve_alias(identifier: &str, roster: &[Enemy]) -> Option<usize> {
    if let Some(idx) = roster.iter().position(|e| e.id == identifier) {
        return Some(idx);
    }

    let prefix = identifier.get(..NUMBERED_ALIAS_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(NUMBERED_ALIAS_PREFIX) {
        return None;
    }
    let digits = identifier.get(NUMBERED_ALIAS_PREFIX.len()..)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let ordinal: usize = digits.parse().ok()?;
    let idx = ordinal.checked_sub(1)?;
    (idx < roster.len()).then_some(idx)
}

/// Hit points each enemy starts with for `mode`.
pub const fn starting_hp(config: &GameConfig, mode: GameMode) -> u32 {
    match mode {
        GameMode::Casual => config.base_hp,
        GameMode::Hardcore => config.base_hp.saturating_mul(config.hardcore_hp_multiplier),
    }
}

/// Damage one hit deals with `loadout`, never less than 1.
pub fn damage_per_hit(config: &GameConfig, loadout: Loadout) -> u32 {
    let percent: u32 = match loadout {
        Loadout::Vanguard => 100,
        Loadout::Interceptor => 50,
        Loadout::Juggernaut => 250,
    };
    (config.damage_per_hit.saturating_mul(percent) / 100).max(1)
}

/// Roster, tracker, and rules for one pilot's game.
#[derive(Debug)]
pub struct GameState {
    player_name: String,
    mode: GameMode,
    loadout: Loadout,
    enemies: Vec<Enemy>,
    tracker: TargetTracker,
    damage_per_hit: u32,
    game_config: GameConfig,
    tracker_config: TrackerConfig,
    clock: Arc<dyn Clock>,
}

impl GameState {
    /// Create an empty game. Call [`init_game`](Self::init_game) before
    /// shooting; until then the roster is empty and every shot misses.
    pub fn new(game_config: GameConfig, tracker_config: TrackerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            player_name: String::new(),
            mode: GameMode::default(),
            loadout: Loadout::default(),
            enemies: Vec::new(),
            tracker: TargetTracker::new(&tracker_config),
            damage_per_hit: damage_per_hit(&game_config, Loadout::default()),
            game_config,
            tracker_config,
            clock,
        }
    }

    /// Start a fresh game: rebuild the roster at full health and replace
    /// the tracker with an empty one.
    pub fn init_game(&mut self, player_name: &str, mode: GameMode, loadout: Loadout) {
        let hp = starting_hp(&self.game_config, mode);
        let size = self.game_config.roster_size.min(MAX_ROSTER_SIZE);

        player_name.clone_into(&mut self.player_name);
        self.mode = mode;
        self.loadout = loadout;
        self.damage_per_hit = damage_per_hit(&self.game_config, loadout);
        self.enemies = CALL_SIGNS
            .iter()
            .take(size)
            .map(|id| Enemy::new(*id, hp))
            .collect();
        self.tracker = TargetTracker::new(&self.tracker_config);

        info!(
            player = player_name,
            %mode,
            %loadout,
            roster = self.enemies.len(),
            hp,
            damage_per_hit = self.damage_per_hit,
            "Game initialized"
        );
    }

    /// Feed one frame's detections to this game's tracker.
    pub fn observe(&mut self, detections: &[Detection]) -> usize {
        let now = self.clock.now();
        self.tracker.update(detections, now)
    }

    /// Fire at whatever is under the crosshair.
    pub fn attempt_shot(&mut self) -> ShotResult {
        let now = self.clock.now();
        let targets = self
            .tracker
            .get_crosshair_targets(now, self.tracker_config.crosshair_threshold_px);

        let mut struck = BTreeSet::new();
        for target in &targets {
            if let Some(idx) = resolve_alias(&target.id, &self.enemies) {
                struck.insert(idx);
            } else {
                debug!(marker = %target.id, "Crosshair marker matches no enemy");
            }
        }

        let mut result = ShotResult {
            fired: true,
            ..ShotResult::default()
        };
        for idx in struck {
            let Some(enemy) = self.enemies.get_mut(idx) else {
                continue;
            };
            if !enemy.is_alive() {
                continue;
            }
            let applied = enemy.apply_damage(self.damage_per_hit);
            result.hits.push(enemy.id.clone());
            result.damage.insert(enemy.id.clone(), applied);
            if !enemy.is_alive() {
                result.kills.push(enemy.id.clone());
            }
        }

        debug!(
            in_crosshair = targets.len(),
            hits = result.hits.len(),
            kills = result.kills.len(),
            "Shot resolved"
        );
        result
    }

    /// Drop tracker entries past the hard TTL.
    pub fn prune(&mut self) -> usize {
        let now = self.clock.now();
        self.tracker.prune(now)
    }

    /// The roster in call-sign order.
    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    /// Look up an enemy by canonical call sign.
    pub fn enemy(&self, id: &str) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.id == id)
    }

    /// Wire representation of the roster.
    pub fn enemy_views(&self) -> Vec<EnemyView> {
        self.enemies.iter().map(Enemy::view).collect()
    }

    /// Whether a non-empty roster has been fully downed.
    pub fn all_down(&self) -> bool {
        !self.enemies.is_empty() && self.enemies.iter().all(|e| !e.is_alive())
    }

    /// This game's tracker.
    pub const fn tracker(&self) -> &TargetTracker {
        &self.tracker
    }

    /// Pilot name passed to [`init_game`](Self::init_game).
    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    /// Selected difficulty.
    pub const fn mode(&self) -> GameMode {
        self.mode
    }

    /// Selected weapon profile.
    pub const fn loadout(&self) -> Loadout {
        self.loadout
    }

    /// Damage one hit currently deals.
    pub const fn damage_per_hit(&self) -> u32 {
        self.damage_per_hit
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use turret_protocol::Point;

    use super::*;
    use crate::clock::ManualClock;

    fn square(id: &str, cx: f64, cy: f64) -> Detection {
        Detection::new(
            id,
            vec![
                Point::new(cx - 20.0, cy - 20.0),
                Point::new(cx + 20.0, cy - 20.0),
                Point::new(cx + 20.0, cy + 20.0),
                Point::new(cx - 20.0, cy + 20.0),
            ],
        )
    }

    fn new_game() -> (GameState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let mut game = GameState::new(
            GameConfig::default(),
            TrackerConfig::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        game.init_game("Tester", GameMode::Casual, Loadout::Vanguard);
        (game, clock)
    }

    fn hp(game: &GameState, id: &str) -> u32 {
        game.enemy(id).unwrap().hp
    }

    #[test]
    fn init_builds_canonical_roster() {
        let (game, _) = new_game();
        let ids: Vec<&str> = game.enemies().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["ALPHA", "BRAVO", "CHARLIE", "DELTA", "ECHO"]);
        assert!(game.enemies().iter().all(|e| e.hp == 100 && e.max_hp == 100));
        assert_eq!(game.player_name(), "Tester");
    }

    #[test]
    fn centered_marker_is_hit() {
        let (mut game, _) = new_game();
        game.observe(&[square("ALPHA", 320.0, 240.0)]);

        let before = hp(&game, "ALPHA");
        let result = game.attempt_shot();

        assert!(result.fired);
        assert_eq!(result.hits, ["ALPHA"]);
        assert_eq!(result.damage.get("ALPHA"), Some(&10));
        assert!(hp(&game, "ALPHA") < before);
    }

    #[test]
    fn off_center_marker_is_missed() {
        let (mut game, _) = new_game();
        game.observe(&[square("ALPHA", 5.0, 5.0)]);

        let result = game.attempt_shot();

        assert!(result.fired);
        assert!(result.hits.is_empty());
        assert_eq!(hp(&game, "ALPHA"), 100);
    }

    #[test]
    fn numbered_alias_reports_canonical_id() {
        let (mut game, _) = new_game();
        game.observe(&[square("enemy_1", 320.0, 240.0)]);

        let result = game.attempt_shot();

        assert_eq!(result.hits, ["ALPHA"]);
        assert!(!result.hits.iter().any(|h| h == "enemy_1"));
        assert_eq!(hp(&game, "ALPHA"), 90);
    }

    #[test]
    fn empty_crosshair_still_fires() {
        let (mut game, _) = new_game();
        let result = game.attempt_shot();
        assert!(result.fired);
        assert!(result.hits.is_empty());
    }

    #[test]
    fn stale_marker_is_not_hit() {
        let (mut game, clock) = new_game();
        game.observe(&[square("ALPHA", 320.0, 240.0)]);
        clock.advance(Duration::from_millis(600));

        assert!(game.attempt_shot().hits.is_empty());
        assert_eq!(hp(&game, "ALPHA"), 100);
    }

    #[test]
    fn two_aliases_of_one_enemy_hit_once() {
        let (mut game, _) = new_game();
        game.observe(&[square("BRAVO", 320.0, 240.0), square("ENEMY_2", 325.0, 240.0)]);

        let result = game.attempt_shot();
        assert_eq!(result.hits, ["BRAVO"]);
        assert_eq!(hp(&game, "BRAVO"), 90);
    }

    #[test]
    fn hits_are_in_roster_order() {
        let (mut game, _) = new_game();
        game.observe(&[
            square("ECHO", 320.0, 240.0),
            square("ALPHA", 322.0, 240.0),
            square("CHARLIE", 318.0, 240.0),
        ]);
        assert_eq!(game.attempt_shot().hits, ["ALPHA", "CHARLIE", "ECHO"]);
    }

    #[test]
    fn hp_clamps_at_zero_and_downed_enemy_is_not_reported() {
        let clock = Arc::new(ManualClock::new());
        let config = GameConfig {
            base_hp: 25,
            ..GameConfig::default()
        };
        let mut game = GameState::new(config, TrackerConfig::default(), clock);
        game.init_game("Tester", GameMode::Casual, Loadout::Vanguard);
        game.observe(&[square("ALPHA", 320.0, 240.0)]);

        assert!(game.attempt_shot().kills.is_empty());
        assert!(game.attempt_shot().kills.is_empty());
        let third = game.attempt_shot();
        assert_eq!(third.damage.get("ALPHA"), Some(&5));
        assert_eq!(third.kills, ["ALPHA"]);
        assert_eq!(hp(&game, "ALPHA"), 0);
        assert!(!game.enemy("ALPHA").unwrap().is_alive());

        let fourth = game.attempt_shot();
        assert!(fourth.fired);
        assert!(fourth.hits.is_empty());
        assert_eq!(hp(&game, "ALPHA"), 0);
    }

    #[test]
    fn init_game_resets_roster_and_tracker() {
        let (mut game, _) = new_game();
        game.observe(&[square("ALPHA", 320.0, 240.0)]);
        let _ = game.attempt_shot();

        game.init_game("Next", GameMode::Hardcore, Loadout::Juggernaut);
        assert!(game.tracker().is_empty());
        assert_eq!(hp(&game, "ALPHA"), 200);
        assert_eq!(game.damage_per_hit(), 25);
    }

    #[test]
    fn loadout_scales_damage() {
        let config = GameConfig::default();
        assert_eq!(damage_per_hit(&config, Loadout::Vanguard), 10);
        assert_eq!(damage_per_hit(&config, Loadout::Interceptor), 5);
        assert_eq!(damage_per_hit(&config, Loadout::Juggernaut), 25);

        let tiny = GameConfig {
            damage_per_hit: 1,
            ..GameConfig::default()
        };
        assert_eq!(damage_per_hit(&tiny, Loadout::Interceptor), 1);
    }

    #[test]
    fn all_down_requires_every_enemy_at_zero() {
        let (mut game, _) = new_game();
        assert!(!game.all_down());
        for enemy in &mut game.enemies {
            enemy.apply_damage(u32::MAX);
        }
        assert!(game.all_down());
    }

    #[test]
    fn alias_resolution_rules() {
        let roster: Vec<Enemy> = CALL_SIGNS.iter().take(3).map(|id| Enemy::new(*id, 10)).collect();

        assert_eq!(resolve_alias("ALPHA", &roster), Some(0));
        assert_eq!(resolve_alias("CHARLIE", &roster), Some(2));
        assert_eq!(resolve_alias("enemy_1", &roster), Some(0));
        assert_eq!(resolve_alias("Enemy_3", &roster), Some(2));
        assert_eq!(resolve_alias("ENEMY_2", &roster), Some(1));

        assert_eq!(resolve_alias("alpha", &roster), None);
        assert_eq!(resolve_alias("enemy_0", &roster), None);
        assert_eq!(resolve_alias("enemy_4", &roster), None);
        assert_eq!(resolve_alias("enemy_", &roster), None);
        assert_eq!(resolve_alias("enemy_+1", &roster), None);
        assert_eq!(resolve_alias("enemy_1x", &roster), None);
        assert_eq!(resolve_alias("DELTA", &roster), None);
        assert_eq!(resolve_alias("", &roster), None);
        assert_eq!(resolve_alias("énemy_1", &roster), None);
    }
}
