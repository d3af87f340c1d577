//! Gesture Flux - Per-session temporal engine for landmark-based behavior feedback
//!
//! Flux turns a stream of per-frame body, hand and face landmarks into
//! debounced behavioral events through a deterministic pipeline per session:
//! recency buffer → detector (with sway baseline) → debounce counter.
//!
//! ## Modules
//!
//! - **Core pipeline**: [`FrameAnalyzer`] and the session registry behind it
//! - **Schema / encoder**: `gesture.frame.v1` input records and versioned reports
//! - **FFI / CLI**: C ABI and the `flux` command-line tool (`cli` feature)

pub mod baseline;
pub mod buffer;
pub mod config;
pub mod debounce;
pub mod detectors;
pub mod emotion;
pub mod encoder;
pub mod error;
pub mod landmarks;
pub mod pipeline;
pub mod provider;
pub mod schema;
pub mod session;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::FluxConfig;
pub use error::FluxError;
pub use pipeline::{evaluate_once, FrameAnalyzer};
pub use provider::{EmotionClassifier, LandmarkProvider};

// Schema exports
pub use schema::{FrameRecord, FrameRecordAdapter, SCHEMA_VERSION};

pub use types::{
    BehaviorKind, FrameEvaluation, FrameReport, LandmarkPayload, LandmarkSet, Point3,
    SessionKey, SessionSummary, Signal,
};

/// Flux version embedded in all reports
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "gesture-flux";
