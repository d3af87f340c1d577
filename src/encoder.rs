//! Report encoding
//!
//! Wraps frame reports and session summaries in a versioned envelope carrying
//! producer metadata, so downstream consumers can tell which analyzer instance
//! computed a result and when.

use crate::debounce::CounterState;
use crate::error::FluxError;
use crate::types::{BehaviorKind, FrameReport, SessionKey, SessionSummary};
use crate::{FLUX_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Versioned envelope around any report body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope<T> {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: DateTime<Utc>,
    #[serde(flatten)]
    pub body: T,
}

/// Counters of one session at query time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterReport {
    pub session_key: SessionKey,
    pub counters: BTreeMap<BehaviorKind, CounterState>,
}

impl CounterReport {
    pub fn new(session_key: &SessionKey, counters: BTreeMap<BehaviorKind, CounterState>) -> Self {
        Self {
            session_key: session_key.clone(),
            counters,
        }
    }
}

/// Encoder for producing report payloads
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn wrap<T>(&self, body: T) -> ReportEnvelope<T> {
        ReportEnvelope {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: FLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now(),
            body,
        }
    }

    pub fn encode_frame(&self, report: &FrameReport) -> ReportEnvelope<FrameReport> {
        self.wrap(report.clone())
    }

    pub fn encode_summary(&self, summary: &SessionSummary) -> ReportEnvelope<SessionSummary> {
        self.wrap(summary.clone())
    }

    pub fn encode_counters(
        &self,
        session_key: &SessionKey,
        counters: BTreeMap<BehaviorKind, CounterState>,
    ) -> ReportEnvelope<CounterReport> {
        self.wrap(CounterReport::new(session_key, counters))
    }

    /// Encode any report body to compact JSON (one line, NDJSON-friendly)
    pub fn encode_to_json<T: Serialize>(&self, body: T) -> Result<String, FluxError> {
        serde_json::to_string(&self.wrap(body))
            .map_err(|e| FluxError::EncodingError(e.to_string()))
    }

    /// Encode any report body to indented JSON
    pub fn encode_to_json_pretty<T: Serialize>(&self, body: T) -> Result<String, FluxError> {
        serde_json::to_string_pretty(&self.wrap(body))
            .map_err(|e| FluxError::EncodingError(e.to_string()))
    }
}
