//! Recency buffer
//!
//! Bounded, timestamp-ordered holding area for the most recent frames of one
//! session and behavior kind. It provides admission control: a frame is only
//! taken if it is strictly newer than everything admitted before it, so late
//! or duplicated deliveries are dropped without touching any state.

use crate::types::{Admission, Frame};
use std::collections::VecDeque;

/// Recency buffer for one (session, behavior kind) pair
#[derive(Debug, Clone)]
pub struct RecencyBuffer {
    /// Admitted frames, ascending by timestamp
    frames: VecDeque<Frame>,
    /// Maximum number of retained frames (K)
    capacity: usize,
    /// Highest timestamp ever admitted. Survives `clear` so that frames older
    /// than a cleared run are still rejected.
    high_water: Option<f64>,
}

impl RecencyBuffer {
    /// Create an empty buffer holding at most `capacity` frames
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            high_water: None,
        }
    }

    /// Admit a frame if its timestamp is strictly greater than the last
    /// admitted one. On overflow the oldest frame is evicted.
    pub fn admit(&mut self, frame: Frame) -> Admission {
        if !frame.timestamp.is_finite() {
            return Admission::Rejected;
        }
        if let Some(last) = self.high_water {
            if frame.timestamp <= last {
                return Admission::Rejected;
            }
        }

        self.high_water = Some(frame.timestamp);
        self.frames.push_back(frame);
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
        Admission::Accepted
    }

    /// Frame with the greatest timestamp
    pub fn latest(&self) -> Option<&Frame> {
        self.frames.back()
    }

    /// Last admitted timestamp, including frames that were since cleared
    pub fn last_admitted(&self) -> Option<f64> {
        self.high_water
    }

    pub fn size(&self) -> usize {
        self.frames.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Retained timestamps, oldest first
    pub fn timestamps(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.timestamp).collect()
    }

    /// Drop every retained frame. The admission high-water mark is kept.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
