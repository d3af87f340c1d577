//! Behavior detectors
//!
//! Pure classifiers mapping the landmarks of one frame to a [`Signal`]. None of
//! them keep state between calls; side-sway hands its shoulder midpoint to the
//! session's [`BaselineTracker`] and only compares the returned drift.
//!
//! A detector that cannot find every landmark it needs returns
//! [`Signal::Declined`] instead of guessing.

use crate::baseline::BaselineTracker;
use crate::config::FluxConfig;
use crate::landmarks::{face, hand, pose};
use crate::types::{BehaviorKind, LandmarkPayload, LandmarkSet, Point3, Signal};

/// Stateless behavior detectors
pub struct BehaviorDetector;

impl BehaviorDetector {
    /// Run the detector for `kind` against one frame's landmarks
    pub fn detect(
        kind: BehaviorKind,
        payload: &LandmarkPayload,
        config: &FluxConfig,
        baseline: &mut BaselineTracker,
        now: f64,
    ) -> Signal {
        match kind {
            BehaviorKind::HandRaise => match &payload.pose {
                Some(landmarks) => Self::hand_raise(landmarks),
                None => Signal::Declined,
            },
            BehaviorKind::SideSway => match &payload.pose {
                Some(landmarks) => Self::side_sway(landmarks, baseline, now, config),
                None => Signal::Declined,
            },
            BehaviorKind::EyeTouch => Self::eye_touch(payload.face.as_ref(), &payload.hands, config),
            BehaviorKind::FoldedArm => match &payload.pose {
                Some(landmarks) => Self::folded_arm(landmarks, config.folded_arm_threshold),
                None => Signal::Declined,
            },
        }
    }

    /// Hand raise: either wrist is above the midline between mouth and shoulders.
    ///
    /// Formula: `wrist_y < ((mouth_l.y + mouth_r.y) / 2 + (shoulder_l.y + shoulder_r.y) / 2) / 2`
    /// Image y grows downwards, so "above" is numerically smaller.
    pub fn hand_raise(landmarks: &LandmarkSet) -> Signal {
        let Some(midline) = mouth_shoulder_midline(landmarks) else {
            return Signal::Declined;
        };
        let (Some(left), Some(right)) = (
            landmarks.get(pose::LEFT_WRIST),
            landmarks.get(pose::RIGHT_WRIST),
        ) else {
            return Signal::Declined;
        };

        Signal::from_bool(left.y < midline || right.y < midline)
    }

    /// Side sway: weighted drift of the shoulder midpoint from the session baseline.
    ///
    /// The anchoring sample (first one, or first after the rebaseline interval)
    /// is always negative.
    pub fn side_sway(
        landmarks: &LandmarkSet,
        baseline: &mut BaselineTracker,
        now: f64,
        config: &FluxConfig,
    ) -> Signal {
        let (Some(left), Some(right)) = (
            landmarks.get(pose::LEFT_SHOULDER),
            landmarks.get(pose::RIGHT_SHOULDER),
        ) else {
            return Signal::Declined;
        };

        let threshold = if config.sway_threshold_relative_to_shoulder_width {
            config.sway_threshold * (left.x - right.x).abs()
        } else {
            config.sway_threshold
        };

        let midpoint = Point3::midpoint(left, right);
        if !midpoint.is_finite() {
            return Signal::Declined;
        }
        let drift = baseline.evaluate(midpoint, now);
        if drift.is_anchor() {
            return Signal::Negative;
        }
        Signal::from_bool(drift.distance > threshold)
    }

    /// Eye touch: the centroid of the index/middle/ring fingertips of any hand
    /// is within `eye_touch_threshold` of either eye's corner centroid.
    pub fn eye_touch(
        face_set: Option<&LandmarkSet>,
        hands: &[LandmarkSet],
        config: &FluxConfig,
    ) -> Signal {
        let Some(face_set) = face_set.filter(|f| f.len() >= config.min_face_points) else {
            return Signal::Declined;
        };
        let (Some(left_eye), Some(right_eye)) = (
            face_set.centroid(&face::LEFT_EYE_CORNERS),
            face_set.centroid(&face::RIGHT_EYE_CORNERS),
        ) else {
            return Signal::Declined;
        };

        let fingertips: Vec<Point3> = hands
            .iter()
            .filter(|h| h.len() >= config.min_hand_points)
            .filter_map(|h| h.centroid(&hand::MIDDLE_FINGERTIPS))
            .collect();
        if fingertips.is_empty() {
            return Signal::Declined;
        }

        let touching = fingertips.iter().any(|tips| {
            tips.distance(&left_eye) < config.eye_touch_threshold
                || tips.distance(&right_eye) < config.eye_touch_threshold
        });
        Signal::from_bool(touching)
    }

    /// Folded arms: each wrist rests near the opposite elbow (image-plane distance).
    pub fn folded_arm(landmarks: &LandmarkSet, threshold: f64) -> Signal {
        let (Some(l_elbow), Some(r_elbow), Some(l_wrist), Some(r_wrist)) = (
            landmarks.get(pose::LEFT_ELBOW),
            landmarks.get(pose::RIGHT_ELBOW),
            landmarks.get(pose::LEFT_WRIST),
            landmarks.get(pose::RIGHT_WRIST),
        ) else {
            return Signal::Declined;
        };

        let crossed = l_wrist.planar_distance(&r_elbow) < threshold
            && r_wrist.planar_distance(&l_elbow) < threshold;
        Signal::from_bool(crossed)
    }
}

/// Y coordinate halfway between the mouth center and the shoulder center
fn mouth_shoulder_midline(landmarks: &LandmarkSet) -> Option<f64> {
    let mouth_y = (landmarks.get(pose::MOUTH_LEFT)?.y + landmarks.get(pose::MOUTH_RIGHT)?.y) / 2.0;
    let shoulder_y =
        (landmarks.get(pose::LEFT_SHOULDER)?.y + landmarks.get(pose::RIGHT_SHOULDER)?.y) / 2.0;
    Some((mouth_y + shoulder_y) / 2.0)
}
