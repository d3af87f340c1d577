//! Error types for Gesture Flux
//!
//! Only configuration, input parsing and encoding can fail. Per-frame anomalies
//! (missing landmarks, stale timestamps) are absorbed by the pipeline and
//! surface as "no signal" instead of an error.

use thiserror::Error;

/// Errors that can occur while configuring or driving the analyzer
#[derive(Debug, Error)]
pub enum FluxError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid frame record: {0}")]
    Validation(#[from] crate::schema::ValidationError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
