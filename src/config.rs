//! Analyzer configuration
//!
//! All detector thresholds, debounce thresholds and buffer sizes live here so
//! they can be tuned per deployment. A configuration is validated once, when it
//! is loaded or handed to the analyzer, never per frame.

use crate::error::FluxError;
use crate::types::BehaviorKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of recent frames kept per session and behavior
pub const DEFAULT_BUFFER_CAPACITY: usize = 20;

/// Default seconds between unconditional baseline re-anchors
pub const DEFAULT_REBASELINE_INTERVAL_SECS: f64 = 30.0;

/// Default seconds of inactivity after which a session is reclaimed
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: i64 = 600;

/// Upper bound on the idle timeout (30 days)
pub const MAX_SESSION_IDLE_TIMEOUT_SECS: i64 = 30 * 24 * 60 * 60;

/// Debounce and buffering settings for one behavior kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Positive detections needed before an event fires
    pub trigger_threshold: u32,
    /// Maximum frames retained in the recency buffer (K)
    pub buffer_capacity: usize,
    /// Whether the recency buffer is emptied when an event fires
    #[serde(default = "default_true")]
    pub clear_on_trigger: bool,
}

fn default_true() -> bool {
    true
}

impl BehaviorConfig {
    pub const fn new(trigger_threshold: u32) -> Self {
        Self {
            trigger_threshold,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            clear_on_trigger: true,
        }
    }
}

/// Per-kind behavior settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfigs {
    pub hand_raise: BehaviorConfig,
    pub side_sway: BehaviorConfig,
    pub eye_touch: BehaviorConfig,
    pub folded_arm: BehaviorConfig,
}

impl Default for BehaviorConfigs {
    fn default() -> Self {
        Self {
            hand_raise: BehaviorConfig::new(1),
            side_sway: BehaviorConfig::new(2),
            eye_touch: BehaviorConfig::new(2),
            folded_arm: BehaviorConfig::new(3),
        }
    }
}

impl BehaviorConfigs {
    pub fn get(&self, kind: BehaviorKind) -> &BehaviorConfig {
        match kind {
            BehaviorKind::HandRaise => &self.hand_raise,
            BehaviorKind::SideSway => &self.side_sway,
            BehaviorKind::EyeTouch => &self.eye_touch,
            BehaviorKind::FoldedArm => &self.folded_arm,
        }
    }

    pub fn get_mut(&mut self, kind: BehaviorKind) -> &mut BehaviorConfig {
        match kind {
            BehaviorKind::HandRaise => &mut self.hand_raise,
            BehaviorKind::SideSway => &mut self.side_sway,
            BehaviorKind::EyeTouch => &mut self.eye_touch,
            BehaviorKind::FoldedArm => &mut self.folded_arm,
        }
    }
}

/// Full analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxConfig {
    pub behaviors: BehaviorConfigs,

    /// Seconds after which the sway baseline is re-anchored unconditionally
    pub rebaseline_interval_secs: f64,
    /// Weight of horizontal movement in the drift distance
    pub sway_weight_x: f64,
    /// Weight of depth movement in the drift distance (must be below `sway_weight_x`)
    pub sway_weight_z: f64,
    /// Drift distance above which the body counts as swaying
    pub sway_threshold: f64,
    /// Interpret `sway_threshold` as a fraction of the current shoulder width
    pub sway_threshold_relative_to_shoulder_width: bool,

    /// Max distance between an eye and the fingertip centroid
    pub eye_touch_threshold: f64,
    /// Minimum face mesh size for eye-touch evaluation
    pub min_face_points: usize,
    /// Minimum hand size for eye-touch evaluation
    pub min_hand_points: usize,

    /// Max wrist-to-opposite-elbow distance for folded arms
    pub folded_arm_threshold: f64,

    /// Seconds without frames after which a session may be swept
    pub session_idle_timeout_secs: i64,
}

impl Default for FluxConfig {
    fn default() -> Self {
        Self {
            behaviors: BehaviorConfigs::default(),
            rebaseline_interval_secs: DEFAULT_REBASELINE_INTERVAL_SECS,
            sway_weight_x: 1.0,
            sway_weight_z: 0.25,
            sway_threshold: 0.05,
            sway_threshold_relative_to_shoulder_width: false,
            eye_touch_threshold: 0.07,
            min_face_points: crate::landmarks::face::POINT_COUNT,
            min_hand_points: crate::landmarks::hand::POINT_COUNT,
            folded_arm_threshold: 0.12,
            session_idle_timeout_secs: DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
        }
    }
}

impl FluxConfig {
    /// Settings for one behavior kind
    pub fn behavior(&self, kind: BehaviorKind) -> &BehaviorConfig {
        self.behaviors.get(kind)
    }

    /// Check every invariant the pipeline relies on
    pub fn validate(&self) -> Result<(), FluxError> {
        for kind in BehaviorKind::ALL {
            let behavior = self.behavior(kind);
            if behavior.trigger_threshold == 0 {
                return Err(invalid(format!("{kind}: trigger_threshold must be at least 1")));
            }
            if behavior.buffer_capacity <= 1 {
                return Err(invalid(format!(
                    "{kind}: buffer_capacity must be greater than 1, got {}",
                    behavior.buffer_capacity
                )));
            }
        }

        require_positive("rebaseline_interval_secs", self.rebaseline_interval_secs)?;
        require_positive("sway_threshold", self.sway_threshold)?;
        require_positive("eye_touch_threshold", self.eye_touch_threshold)?;
        require_positive("folded_arm_threshold", self.folded_arm_threshold)?;

        if !(self.sway_weight_x.is_finite() && self.sway_weight_z.is_finite())
            || self.sway_weight_x < 0.0
            || self.sway_weight_z < 0.0
        {
            return Err(invalid("sway weights must be finite and non-negative"));
        }
        if self.sway_weight_x <= self.sway_weight_z {
            return Err(invalid(format!(
                "sway_weight_x ({}) must exceed sway_weight_z ({})",
                self.sway_weight_x, self.sway_weight_z
            )));
        }

        if self.min_face_points == 0 || self.min_hand_points == 0 {
            return Err(invalid("minimum point counts must be at least 1"));
        }
        if self.session_idle_timeout_secs <= 0
            || self.session_idle_timeout_secs > MAX_SESSION_IDLE_TIMEOUT_SECS
        {
            return Err(invalid(format!(
                "session_idle_timeout_secs must be in 1..={}, got {}",
                MAX_SESSION_IDLE_TIMEOUT_SECS, self.session_idle_timeout_secs
            )));
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, FluxError> {
        let config: FluxConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self, FluxError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, FluxError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn invalid(msg: impl Into<String>) -> FluxError {
    FluxError::InvalidConfiguration(msg.into())
}

fn require_positive(name: &str, value: f64) -> Result<(), FluxError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be a positive number, got {value}")))
    }
}
