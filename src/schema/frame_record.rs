//! gesture.frame.v1 record definition

use crate::emotion::EmotionReading;
use crate::types::{BehaviorKind, LandmarkPayload, LandmarkSet, SessionKey};
use serde::{Deserialize, Serialize};

/// Current schema version
pub const SCHEMA_VERSION: &str = "gesture.frame.v1";

/// One video frame of one user, as produced by the landmark extraction stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Schema version (must be "gesture.frame.v1")
    pub schema_version: String,
    /// Call or room the user is in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub user_id: String,
    /// Capture time in seconds, monotonic per user
    pub timestamp: f64,
    /// Behaviors to evaluate; absent or empty means all of them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub behaviors: Vec<BehaviorKind>,
    #[serde(default)]
    pub landmarks: LandmarkPayload,
    /// Emotion classifier output for the same frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<EmotionReading>,
}

impl FrameRecord {
    pub fn new(user_id: impl Into<String>, timestamp: f64, landmarks: LandmarkPayload) -> Self {
        FrameRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            room_id: None,
            user_id: user_id.into(),
            timestamp,
            behaviors: Vec::new(),
            landmarks,
            emotion: None,
        }
    }

    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    pub fn with_behaviors(mut self, behaviors: Vec<BehaviorKind>) -> Self {
        self.behaviors = behaviors;
        self
    }

    pub fn with_emotion(mut self, emotion: EmotionReading) -> Self {
        self.emotion = Some(emotion);
        self
    }

    /// `room:user`, or the bare user id without a room
    pub fn session_key(&self) -> SessionKey {
        SessionKey::from_parts(self.room_id.as_deref(), &self.user_id)
    }

    /// Validate the record schema
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        if self.user_id.trim().is_empty() {
            return Err(ValidationError::EmptyUserId);
        }

        if !self.timestamp.is_finite() {
            return Err(ValidationError::NonFiniteTimestamp);
        }

        let landmarks = &self.landmarks;
        check_finite("pose", landmarks.pose.as_ref())?;
        check_finite("face", landmarks.face.as_ref())?;
        for hand in &landmarks.hands {
            check_finite("hands", Some(hand))?;
        }

        Ok(())
    }
}

fn check_finite(set: &'static str, landmarks: Option<&LandmarkSet>) -> Result<(), ValidationError> {
    let Some(landmarks) = landmarks else {
        return Ok(());
    };
    match landmarks.points().iter().position(|p| !p.is_finite()) {
        Some(index) => Err(ValidationError::NonFiniteCoordinate { set, index }),
        None => Ok(()),
    }
}

/// Validation errors for frame records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("user_id must not be empty")]
    EmptyUserId,

    #[error("timestamp must be a finite number of seconds")]
    NonFiniteTimestamp,

    #[error("Non-finite coordinate in {set} landmark {index}")]
    NonFiniteCoordinate { set: &'static str, index: usize },
}
