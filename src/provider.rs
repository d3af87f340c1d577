//! External model interfaces
//!
//! Landmark extraction and emotion classification run outside this crate.
//! They are injected as stateless providers so model lifetime stays separate
//! from session lifetime.

use crate::emotion::EmotionReading;
use crate::types::{LandmarkPayload, LandmarkSet};

/// Pose, face and hand keypoint extraction from one encoded image
pub trait LandmarkProvider: Send + Sync {
    /// 33-point body pose, or `None` if no body was detected
    fn pose(&self, image: &[u8]) -> Option<LandmarkSet>;

    /// 468-point face mesh, or `None` if no face was detected
    fn face(&self, image: &[u8]) -> Option<LandmarkSet>;

    /// One 21-point set per detected hand
    fn hands(&self, image: &[u8]) -> Vec<LandmarkSet>;
}

/// Facial emotion classification from one encoded image
pub trait EmotionClassifier: Send + Sync {
    /// Label-to-score mapping, or `None` when classification failed
    fn classify(&self, image: &[u8]) -> Option<EmotionReading>;
}

impl LandmarkPayload {
    /// Run every landmark model of `provider` on one image
    pub fn extract<P: LandmarkProvider + ?Sized>(provider: &P, image: &[u8]) -> Self {
        Self {
            pose: provider.pose(image),
            face: provider.face(image),
            hands: provider.hands(image),
        }
    }
}
