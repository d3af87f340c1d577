//! Anatomical landmark index schemas
//!
//! Index constants for the three keypoint layouts the detectors consume:
//! the 33-point body pose, the 21-point hand and the 468-point face mesh.

/// Body pose keypoints (33 total)
pub mod pose {
    pub const NOSE: usize = 0;
    pub const MOUTH_LEFT: usize = 9;
    pub const MOUTH_RIGHT: usize = 10;
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_ELBOW: usize = 13;
    pub const RIGHT_ELBOW: usize = 14;
    pub const LEFT_WRIST: usize = 15;
    pub const RIGHT_WRIST: usize = 16;

    /// Number of points in a complete pose set
    pub const POINT_COUNT: usize = 33;
}

/// Hand keypoints (21 total)
pub mod hand {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_TIP: usize = 16;
    pub const PINKY_TIP: usize = 20;

    /// The three middle fingertips whose centroid approximates the touching point
    pub const MIDDLE_FINGERTIPS: [usize; 3] = [INDEX_TIP, MIDDLE_TIP, RING_TIP];

    /// Number of points in a complete hand set
    pub const POINT_COUNT: usize = 21;
}

/// Face mesh keypoints (468 total)
pub mod face {
    pub const LEFT_EYE_OUTER: usize = 33;
    pub const LEFT_EYE_INNER: usize = 133;
    pub const RIGHT_EYE_INNER: usize = 362;
    pub const RIGHT_EYE_OUTER: usize = 263;

    /// Corner landmarks of each eye
    pub const LEFT_EYE_CORNERS: [usize; 2] = [LEFT_EYE_OUTER, LEFT_EYE_INNER];
    pub const RIGHT_EYE_CORNERS: [usize; 2] = [RIGHT_EYE_INNER, RIGHT_EYE_OUTER];

    /// Number of points in a complete face mesh
    pub const POINT_COUNT: usize = 468;
}
