//! Adapter for turning gesture.frame.v1 records into analyzer input
//!
//! Parses NDJSON streams and JSON arrays of [`FrameRecord`]s and converts
//! validated records into the session key, payload and behavior list the
//! [`FrameAnalyzer`](crate::pipeline::FrameAnalyzer) consumes.

use crate::emotion::EmotionReading;
use crate::error::FluxError;
use crate::schema::frame_record::*;
use crate::types::{BehaviorKind, LandmarkPayload, SessionKey};

/// Adapter for converting frame records to analyzer input
pub struct FrameRecordAdapter;

/// Analyzer input extracted from one validated record
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInput {
    pub session_key: SessionKey,
    pub timestamp: f64,
    /// Empty means every behavior kind
    pub kinds: Vec<BehaviorKind>,
    pub payload: LandmarkPayload,
    pub emotion: Option<EmotionReading>,
}

impl FrameRecordAdapter {
    /// Parse a JSON string containing an array of FrameRecords
    pub fn parse_array(json: &str) -> Result<Vec<FrameRecord>, FluxError> {
        let records: Vec<FrameRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) containing FrameRecords
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<FrameRecord>, FluxError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            if let Some(record) = Self::parse_line(line)
                .map_err(|e| FluxError::ParseError(format!("line {}: {}", line_num + 1, e)))?
            {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Parse one NDJSON line; blank lines yield `None`
    pub fn parse_line(line: &str) -> Result<Option<FrameRecord>, serde_json::Error> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(trimmed).map(Some)
    }

    /// Validate a record and split it into analyzer input
    pub fn to_frame(record: FrameRecord) -> Result<FrameInput, FluxError> {
        record.validate()?;
        Ok(FrameInput {
            session_key: record.session_key(),
            timestamp: record.timestamp,
            kinds: record.behaviors,
            payload: record.landmarks,
            emotion: record.emotion,
        })
    }

    /// Validate a batch of records, returning only the failures
    pub fn validate_records(records: &[FrameRecord]) -> Vec<ValidationResult> {
        records
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| {
                record.validate().err().map(|error| ValidationResult {
                    index: idx,
                    session_key: record.session_key(),
                    error,
                })
            })
            .collect()
    }
}

/// A record that failed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub index: usize,
    pub session_key: SessionKey,
    pub error: ValidationError,
}
