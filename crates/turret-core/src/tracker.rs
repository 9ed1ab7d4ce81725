//! Target tracker: detection stream in, live target set out.
//!
//! Each detection upserts a [`Target`] keyed by its marker text. Reads
//! apply two age thresholds:
//!
//! - **grace period** -- a target younger than this is *active*, so a
//!   marker that flickers out of detection for a few frames still counts
//!   as present;
//! - **hard TTL** -- a target at least this old is deleted from the store
//!   and is gone until a new detection re-creates it.
//!
//! Targets between the two thresholds are kept but not reported.
//! Deletion happens lazily inside [`TargetTracker::get_active_targets`]
//! and eagerly in [`TargetTracker::prune`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;
use turret_protocol::{Detection, Point};

use crate::config::TrackerConfig;

/// A currently or recently observed marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Marker payload text.
    pub id: String,
    /// Bounding polygon from the latest sighting.
    pub polygon: Vec<Point>,
    /// Arithmetic mean of the polygon's points.
    pub center: Point,
    /// Instant of the latest sighting.
    pub last_seen: Instant,
}

impl Target {
    /// Time since the latest sighting. Zero if `now` precedes it.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

/// Mean of a polygon's points, or `None` for an empty polygon.
pub fn centroid(polygon: &[Point]) -> Option<Point> {
    let count = f64::from(u32::try_from(polygon.len()).ok().filter(|&n| n > 0)?);
    let (sx, sy) = polygon
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / count, sy / count))
}

/// Store of known targets with grace-period and hard-TTL expiry.
#[derive(Debug, Clone)]
pub struct TargetTracker {
    targets: HashMap<String, Target>,
    grace_period: Duration,
    hard_ttl: Duration,
    frame_width: f64,
    frame_height: f64,
}

impl TargetTracker {
    /// Create an empty tracker from configuration.
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            targets: HashMap::new(),
            grace_period: config.grace_period(),
            hard_ttl: config.hard_ttl(),
            frame_width: config.frame_width,
            frame_height: config.frame_height,
        }
    }

    /// Record one frame's detections, stamped at `now`.
    ///
    /// Each detection overwrites any stored target with the same marker
    /// text and resets its age. Detections with an empty polygon have no
    /// centre and are skipped. Returns the number of targets written.
    pub fn update(&mut self, detections: &[Detection], now: Instant) -> usize {
        let mut written = 0_usize;
        for det in detections {
            let Some(center) = centroid(&det.polygon) else {
                debug!(id = %det.id, "Skipping detection with empty polygon");
                continue;
            };
            self.targets.insert(
                det.id.clone(),
                Target {
                    id: det.id.clone(),
                    polygon: det.polygon.clone(),
                    center,
                    last_seen: now,
                },
            );
            written = written.saturating_add(1);
        }
        written
    }

    /// Targets seen within the grace period, in no particular order.
    ///
    /// Side effect: every stored target whose age has reached the hard TTL
    /// is deleted.
    pub fn get_active_targets(&mut self, now: Instant) -> Vec<Target> {
        self.prune(now);
        self.targets
            .values()
            .filter(|t| t.age(now) < self.grace_period)
            .cloned()
            .collect()
    }

    /// Active targets whose centre lies strictly within `threshold_px` of
    /// the frame centre.
    pub fn get_crosshair_targets(&mut self, now: Instant, threshold_px: f64) -> Vec<Target> {
        let crosshair = self.frame_center();
        let mut active = self.get_active_targets(now);
        active.retain(|t| t.center.distance_to(crosshair) < threshold_px);
        active
    }

    /// Delete every target whose age has reached the hard TTL. Returns the
    /// number removed.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.targets.len();
        let ttl = self.hard_ttl;
        self.targets.retain(|_, t| t.age(now) < ttl);
        let removed = before.saturating_sub(self.targets.len());
        if removed > 0 {
            debug!(removed, "Pruned expired targets");
        }
        removed
    }

    /// The crosshair position: centre of the camera frame.
    pub fn frame_center(&self) -> Point {
        Point::new(self.frame_width / 2.0, self.frame_height / 2.0)
    }

    /// Change the frame geometry used for crosshair distance.
    pub const fn set_frame_size(&mut self, width: f64, height: f64) {
        self.frame_width = width;
        self.frame_height = height;
    }

    /// Whether a target with this marker text is stored (active or not).
    pub fn contains(&self, id: &str) -> bool {
        self.targets.contains_key(id)
    }

    /// Number of stored targets, including inactive ones.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Configured grace period.
    pub const fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Configured hard TTL.
    pub const fn hard_ttl(&self) -> Duration {
        self.hard_ttl
    }
}

impl Default for TargetTracker {
    fn default() -> Self {
        Self::new(&TrackerConfig::default())
    }
}
