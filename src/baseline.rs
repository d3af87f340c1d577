//! Drift baseline tracking
//!
//! Side-sway is measured against a reference position rather than against the
//! previous frame. The reference is set from the first valid sample and then
//! re-anchored unconditionally every `rebaseline_interval_secs`. Anchoring
//! samples never produce a drift reading of their own.

use crate::config::FluxConfig;
use crate::types::Point3;
use serde::{Deserialize, Serialize};

/// Reference point and anchor time for one session
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BaselineState {
    /// Current reference, `None` until the first valid sample
    pub reference_point: Option<Point3>,
    /// Logical time the reference was last set
    pub last_anchor_time: f64,
}

/// Result of comparing a sample with the baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftResult {
    /// Weighted horizontal/depth distance from the reference (0 on anchoring)
    pub distance: f64,
    /// This sample created the very first reference
    pub is_first_anchor: bool,
    /// This sample replaced a stale reference
    pub is_reanchor: bool,
}

impl DriftResult {
    /// Anchoring samples must be treated as "no signal"
    pub fn is_anchor(&self) -> bool {
        self.is_first_anchor || self.is_reanchor
    }
}

/// Drift-compensation tracker owned by one session
#[derive(Debug, Clone)]
pub struct BaselineTracker {
    state: BaselineState,
    rebaseline_interval_secs: f64,
    weight_x: f64,
    weight_z: f64,
}

impl BaselineTracker {
    pub fn new(rebaseline_interval_secs: f64, weight_x: f64, weight_z: f64) -> Self {
        Self {
            state: BaselineState::default(),
            rebaseline_interval_secs,
            weight_x,
            weight_z,
        }
    }

    pub fn from_config(config: &FluxConfig) -> Self {
        Self::new(
            config.rebaseline_interval_secs,
            config.sway_weight_x,
            config.sway_weight_z,
        )
    }

    /// Compare a sample with the reference, anchoring when needed
    pub fn evaluate(&mut self, point: Point3, now: f64) -> DriftResult {
        let Some(reference) = self.state.reference_point else {
            self.anchor(point, now);
            log::debug!("baseline anchored at ({:.3}, {:.3}, {:.3})", point.x, point.y, point.z);
            return DriftResult {
                distance: 0.0,
                is_first_anchor: true,
                is_reanchor: false,
            };
        };

        if now - self.state.last_anchor_time >= self.rebaseline_interval_secs {
            self.anchor(point, now);
            log::debug!("baseline re-anchored at t={now}");
            return DriftResult {
                distance: 0.0,
                is_first_anchor: false,
                is_reanchor: true,
            };
        }

        DriftResult {
            distance: self.weighted_distance(point, reference),
            is_first_anchor: false,
            is_reanchor: false,
        }
    }

    /// `sqrt(wx * dx² + wz * dz²)`; vertical movement is ignored
    fn weighted_distance(&self, point: Point3, reference: Point3) -> f64 {
        let dx = point.x - reference.x;
        let dz = point.z - reference.z;
        (self.weight_x * dx * dx + self.weight_z * dz * dz).sqrt()
    }

    fn anchor(&mut self, point: Point3, now: f64) {
        self.state.reference_point = Some(point);
        self.state.last_anchor_time = now;
    }

    pub fn state(&self) -> BaselineState {
        self.state
    }

    /// Forget the reference; the next sample anchors again
    pub fn reset(&mut self) {
        self.state = BaselineState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> BaselineTracker {
        BaselineTracker::new(30.0, 1.0, 0.25)
    }

    #[test]
    fn test_first_sample_anchors() {
        let mut t = tracker();
        let result = t.evaluate(Point3::new(0.9, 0.1, 0.7), 1.0);

        assert!(result.is_first_anchor);
        assert!(result.is_anchor());
        assert_eq!(result.distance, 0.0);
        assert_eq!(t.state().reference_point, Some(Point3::new(0.9, 0.1, 0.7)));
        assert_eq!(t.state().last_anchor_time, 1.0);
    }

    #[test]
    fn test_no_movement_zero_distance() {
        let mut t = tracker();
        t.evaluate(Point3::new(0.5, 0.5, 0.0), 1.0);
        let result = t.evaluate(Point3::new(0.5, 0.5, 0.0), 2.0);

        assert!(!result.is_anchor());
        assert_eq!(result.distance, 0.0);
    }

    #[test]
    fn test_vertical_movement_ignored() {
        let mut t = tracker();
        t.evaluate(Point3::new(0.5, 0.5, 0.0), 1.0);
        let result = t.evaluate(Point3::new(0.5, 0.9, 0.0), 2.0);
        assert_eq!(result.distance, 0.0);
    }

    #[test]
    fn test_horizontal_weighted_more_than_depth() {
        let mut t = tracker();
        t.evaluate(Point3::new(0.5, 0.5, 0.0), 1.0);

        let sideways = t.evaluate(Point3::new(0.6, 0.5, 0.0), 2.0);
        let forward = t.evaluate(Point3::new(0.5, 0.5, 0.1), 3.0);

        assert!((sideways.distance - 0.1).abs() < 1e-9);
        assert!((forward.distance - 0.05).abs() < 1e-9);
        assert!(sideways.distance > forward.distance);
    }

    #[test]
    fn test_reanchor_at_exact_interval() {
        let mut t = tracker();
        t.evaluate(Point3::new(0.5, 0.5, 0.0), 0.0);

        let moved = Point3::new(0.9, 0.5, 0.0);
        let result = t.evaluate(moved, 30.0);

        assert!(result.is_reanchor);
        assert!(!result.is_first_anchor);
        assert_eq!(t.state().reference_point, Some(moved));
        assert_eq!(t.state().last_anchor_time, 30.0);

        // Measured against the new reference afterwards
        let after = t.evaluate(moved, 31.0);
        assert!(!after.is_anchor());
        assert_eq!(after.distance, 0.0);
    }

    #[test]
    fn test_just_before_interval_measures() {
        let mut t = tracker();
        t.evaluate(Point3::new(0.5, 0.5, 0.0), 0.0);
        let result = t.evaluate(Point3::new(0.7, 0.5, 0.0), 29.9);
        assert!(!result.is_anchor());
        assert!((result.distance - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_reset_forgets_reference() {
        let mut t = tracker();
        t.evaluate(Point3::new(0.5, 0.5, 0.0), 0.0);
        t.reset();
        assert!(t.evaluate(Point3::new(0.1, 0.5, 0.0), 1.0).is_first_anchor);
    }
}
