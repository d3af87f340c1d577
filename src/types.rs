//! Core data types
//!
//! Landmark geometry, frames, behavior kinds and the per-frame evaluation
//! result that flows out of the analyzer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::debounce::CounterState;
use crate::emotion::{korean_label, EmotionReading, EmotionSummary};

/// A normalized 3D keypoint.
///
/// x and y are image-relative (typically 0-1), z is depth relative to the
/// body center (typically -1 to 1). Serialized as `[x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Midpoint between two points
    pub fn midpoint(a: Point3, b: Point3) -> Point3 {
        Point3::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0, (a.z + b.z) / 2.0)
    }

    /// Euclidean distance in 3D
    pub fn distance(&self, other: &Point3) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }

    /// Euclidean distance in the image plane, ignoring depth
    pub fn planar_distance(&self, other: &Point3) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(v: [f64; 3]) -> Self {
        Point3::new(v[0], v[1], v[2])
    }
}

impl From<Point3> for [f64; 3] {
    fn from(p: Point3) -> Self {
        [p.x, p.y, p.z]
    }
}

/// Ordered keypoints indexed by an anatomical schema (see [`crate::landmarks`]).
///
/// Lookups never panic: an absent index yields `None` and the detector asking
/// for it declines. Points with a NaN or infinite coordinate count as absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet(Vec<Point3>);

impl LandmarkSet {
    pub fn new(points: Vec<Point3>) -> Self {
        Self(points)
    }

    pub fn get(&self, index: usize) -> Option<Point3> {
        self.0.get(index).copied().filter(Point3::is_finite)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn points(&self) -> &[Point3] {
        &self.0
    }

    /// Centroid of the given indices, or `None` if any index is absent
    pub fn centroid(&self, indices: &[usize]) -> Option<Point3> {
        if indices.is_empty() {
            return None;
        }
        let mut sum = Point3::default();
        for &idx in indices {
            let p = self.get(idx)?;
            sum.x += p.x;
            sum.y += p.y;
            sum.z += p.z;
        }
        let n = indices.len() as f64;
        Some(Point3::new(sum.x / n, sum.y / n, sum.z / n))
    }
}

impl From<Vec<Point3>> for LandmarkSet {
    fn from(points: Vec<Point3>) -> Self {
        Self(points)
    }
}

/// Everything the landmark provider detected in one video frame.
///
/// Each set is optional: `None` means "no detection" for that model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<LandmarkSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face: Option<LandmarkSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hands: Vec<LandmarkSet>,
}

impl LandmarkPayload {
    pub fn with_pose(pose: LandmarkSet) -> Self {
        Self {
            pose: Some(pose),
            ..Default::default()
        }
    }

    /// Check if the provider detected anything at all
    pub fn is_empty(&self) -> bool {
        self.pose.is_none() && self.face.is_none() && self.hands.is_empty()
    }
}

/// Tracked motion categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    /// A wrist rises above the mouth/shoulder midline
    HandRaise,
    /// The shoulder midpoint drifts away from its baseline
    SideSway,
    /// Fingertips come close to either eye
    EyeTouch,
    /// Wrists rest on the opposite elbows
    FoldedArm,
}

impl BehaviorKind {
    pub const ALL: [BehaviorKind; 4] = [
        BehaviorKind::HandRaise,
        BehaviorKind::SideSway,
        BehaviorKind::EyeTouch,
        BehaviorKind::FoldedArm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorKind::HandRaise => "hand_raise",
            BehaviorKind::SideSway => "side_sway",
            BehaviorKind::EyeTouch => "eye_touch",
            BehaviorKind::FoldedArm => "folded_arm",
        }
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one user's stream, usually `room:user`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build a key from a room and user id. A missing or empty room yields
    /// the bare user id.
    pub fn from_parts(room_id: Option<&str>, user_id: &str) -> Self {
        match room_id {
            Some(room) if !room.is_empty() => Self(format!("{room}:{user_id}")),
            _ => Self(user_id.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One admitted video frame for one behavior kind.
///
/// The payload is shared between the frames created for each behavior kind
/// of the same video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub session_key: SessionKey,
    pub kind: BehaviorKind,
    /// Caller-supplied logical time in seconds
    pub timestamp: f64,
    pub payload: Arc<LandmarkPayload>,
}

/// Outcome of a detector on one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Required landmarks were missing, nothing was evaluated
    Declined,
    /// Evaluated, behavior not present
    Negative,
    /// Evaluated, behavior present
    Positive,
}

impl Signal {
    pub fn from_bool(present: bool) -> Self {
        if present {
            Signal::Positive
        } else {
            Signal::Negative
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Signal::Positive)
    }
}

/// Whether the recency buffer took the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    Accepted,
    /// Timestamp not strictly greater than the last admitted one
    Rejected,
}

/// Result of `EvaluateFrame` for one behavior kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameEvaluation {
    pub kind: BehaviorKind,
    pub admission: Admission,
    pub signal: Signal,
    /// True only for a positive, admitted detection
    pub raw_signal: bool,
    /// True when this frame completed a debounce run
    pub event_fired: bool,
    pub raw_count: u32,
    pub event_count: u64,
}

impl FrameEvaluation {
    pub(crate) fn new(
        kind: BehaviorKind,
        admission: Admission,
        signal: Signal,
        event_fired: bool,
        counters: CounterState,
    ) -> Self {
        Self {
            kind,
            admission,
            signal,
            raw_signal: admission == Admission::Accepted && signal.is_positive(),
            event_fired,
            raw_count: counters.raw_count,
            event_count: counters.event_count,
        }
    }
}

/// Dominant emotion of one frame, as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominantEmotion {
    pub label: String,
    /// Localized display word
    pub display: String,
    /// Score rounded to a whole percentage
    pub percentage: f64,
}

impl DominantEmotion {
    pub fn from_reading(reading: &EmotionReading) -> Option<Self> {
        reading.dominant().map(|(label, percentage)| Self {
            label: label.to_string(),
            display: korean_label(label).to_string(),
            percentage,
        })
    }
}

/// Everything the analyzer concluded about one video frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub session_key: SessionKey,
    pub timestamp: f64,
    /// 1 when an event fired for the kind on this frame, else 0
    pub actions: BTreeMap<BehaviorKind, u8>,
    /// Counters of every kind after this frame
    pub counters: BTreeMap<BehaviorKind, CounterState>,
    pub evaluations: Vec<FrameEvaluation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<DominantEmotion>,
}

impl FrameReport {
    /// Kinds whose event fired on this frame
    pub fn fired(&self) -> Vec<BehaviorKind> {
        self.evaluations
            .iter()
            .filter(|e| e.event_fired)
            .map(|e| e.kind)
            .collect()
    }
}

/// Final state of a session, reported when it ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_key: SessionKey,
    pub counters: BTreeMap<BehaviorKind, CounterState>,
    pub emotions: EmotionSummary,
    pub created_at_utc: DateTime<Utc>,
    pub last_seen_utc: DateTime<Utc>,
}
