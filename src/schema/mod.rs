//! gesture.frame.v1 input schema
//!
//! One record per video frame: who it belongs to, when it was captured, which
//! behaviors to evaluate and the landmarks the upstream models detected.

mod adapter;
mod frame_record;

pub use adapter::*;
pub use frame_record::*;
