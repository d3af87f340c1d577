//! Frame analysis orchestration
//!
//! This module provides the public API for Gesture Flux. A [`FrameAnalyzer`]
//! owns the validated configuration and the session registry; callers hand it
//! one frame of landmarks at a time and get back the raw detection, whether a
//! debounced event fired and the updated counters.
//!
//! Pipeline per behavior kind:
//! 1. SessionRegistry - find or lazily create the session
//! 2. RecencyBuffer - admit or reject by timestamp ordering
//! 3. BehaviorDetector - evaluate the newest admitted frame (side-sway via BaselineTracker)
//! 4. DebounceCounter - update counters, fire and clear the buffer on threshold

use crate::config::FluxConfig;
use crate::debounce::CounterState;
use crate::emotion::{EmotionReading, EmotionSummary};
use crate::error::FluxError;
use crate::provider::{EmotionClassifier, LandmarkProvider};
use crate::schema::{FrameRecord, FrameRecordAdapter};
use crate::session::{Session, SessionRegistry};
use crate::types::{
    BehaviorKind, DominantEmotion, FrameEvaluation, FrameReport, LandmarkPayload, SessionKey,
    SessionSummary,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Evaluate one frame for one behavior kind against a fresh, single-use
/// session (stateless, one-shot).
///
/// Useful for checking a detector on a still image; debouncing and drift
/// tracking only make sense with a long-lived [`FrameAnalyzer`].
pub fn evaluate_once(
    config: FluxConfig,
    kind: BehaviorKind,
    payload: LandmarkPayload,
) -> Result<FrameEvaluation, FluxError> {
    let analyzer = FrameAnalyzer::new(config)?;
    Ok(analyzer.evaluate_frame(&SessionKey::from("one-shot"), kind, 0.0, payload))
}

/// Stateful analyzer shared by every caller of a process.
///
/// All methods take `&self`; the analyzer can be wrapped in an `Arc` and used
/// from many threads at once.
#[derive(Debug)]
pub struct FrameAnalyzer {
    config: Arc<FluxConfig>,
    registry: SessionRegistry,
}

impl Default for FrameAnalyzer {
    fn default() -> Self {
        let config = Arc::new(FluxConfig::default());
        Self {
            registry: SessionRegistry::new(Arc::clone(&config)),
            config,
        }
    }
}

impl FrameAnalyzer {
    /// Create an analyzer, failing fast on an invalid configuration
    pub fn new(config: FluxConfig) -> Result<Self, FluxError> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            registry: SessionRegistry::new(Arc::clone(&config)),
            config,
        })
    }

    pub fn config(&self) -> &FluxConfig {
        &self.config
    }

    /// `EvaluateFrame`: evaluate one behavior kind on one frame
    pub fn evaluate_frame(
        &self,
        key: &SessionKey,
        kind: BehaviorKind,
        timestamp: f64,
        payload: LandmarkPayload,
    ) -> FrameEvaluation {
        let payload = Arc::new(payload);
        self.registry.with_session(key, |session| {
            session.evaluate(kind, timestamp, payload, Utc::now())
        })
    }

    /// Evaluate several behavior kinds on the same frame under one session lock
    pub fn evaluate_frame_all(
        &self,
        key: &SessionKey,
        timestamp: f64,
        payload: LandmarkPayload,
        kinds: &[BehaviorKind],
    ) -> FrameReport {
        self.evaluate_with_emotion(key, timestamp, payload, kinds, None)
    }

    /// Evaluate a frame and fold an optional emotion reading into the session
    pub fn evaluate_with_emotion(
        &self,
        key: &SessionKey,
        timestamp: f64,
        payload: LandmarkPayload,
        kinds: &[BehaviorKind],
        emotion: Option<&EmotionReading>,
    ) -> FrameReport {
        let payload = Arc::new(payload);
        let now = Utc::now();
        let kinds = dedup_kinds(kinds);

        self.registry.with_session(key, |session| {
            let evaluations: Vec<FrameEvaluation> = kinds
                .into_iter()
                .map(|kind| session.evaluate(kind, timestamp, Arc::clone(&payload), now))
                .collect();

            if let Some(reading) = emotion {
                session.record_emotion(reading, now);
            }

            FrameReport {
                session_key: key.clone(),
                timestamp,
                actions: evaluations
                    .iter()
                    .map(|e| (e.kind, u8::from(e.event_fired)))
                    .collect(),
                counters: session.counters(),
                evaluations,
                emotion: emotion.and_then(DominantEmotion::from_reading),
            }
        })
    }

    /// Validate a gesture.frame.v1 record and evaluate it
    pub fn evaluate_record(&self, record: FrameRecord) -> Result<FrameReport, FluxError> {
        let input = FrameRecordAdapter::to_frame(record)?;
        Ok(self.evaluate_with_emotion(
            &input.session_key,
            input.timestamp,
            input.payload,
            &input.kinds,
            input.emotion.as_ref(),
        ))
    }

    /// Parse one NDJSON line and evaluate it.
    ///
    /// Blank lines yield `Ok(None)`. A malformed or invalid line is an error
    /// and leaves every session untouched, so a stream reader can skip it.
    pub fn evaluate_line(&self, line: &str) -> Result<Option<FrameReport>, FluxError> {
        match FrameRecordAdapter::parse_line(line)? {
            Some(record) => self.evaluate_record(record).map(Some),
            None => Ok(None),
        }
    }

    /// Extract landmarks with `provider` and evaluate them
    pub fn evaluate_image<P: LandmarkProvider + ?Sized>(
        &self,
        provider: &P,
        key: &SessionKey,
        timestamp: f64,
        image: &[u8],
        kinds: &[BehaviorKind],
    ) -> FrameReport {
        let payload = LandmarkPayload::extract(provider, image);
        if payload.is_empty() {
            log::debug!("[{key}] no landmarks detected at t={timestamp}");
        }
        self.evaluate_frame_all(key, timestamp, payload, kinds)
    }

    /// Classify an image with `classifier` and add the reading to the session tally
    pub fn classify_image<C: EmotionClassifier + ?Sized>(
        &self,
        classifier: &C,
        key: &SessionKey,
        image: &[u8],
    ) -> Option<DominantEmotion> {
        let reading = classifier.classify(image)?;
        self.record_emotion(key, &reading);
        DominantEmotion::from_reading(&reading)
    }

    pub fn record_emotion(&self, key: &SessionKey, reading: &EmotionReading) {
        self.registry
            .with_session(key, |session| session.record_emotion(reading, Utc::now()));
    }

    /// Latest counters of a session. Unknown sessions are not created.
    pub fn counters(&self, key: &SessionKey) -> Option<BTreeMap<BehaviorKind, CounterState>> {
        self.registry.get(key).map(|handle| handle.lock().counters())
    }

    pub fn emotion_summary(&self, key: &SessionKey) -> Option<EmotionSummary> {
        self.registry
            .get(key)
            .map(|handle| handle.lock().emotions().summary())
    }

    pub fn summary(&self, key: &SessionKey) -> Option<SessionSummary> {
        self.registry
            .get(key)
            .map(|handle| summarize(&handle.lock()))
    }

    /// End a session explicitly and return its final state
    pub fn end_session(&self, key: &SessionKey) -> Option<SessionSummary> {
        self.registry
            .remove(key)
            .map(|handle| summarize(&handle.lock()))
    }

    /// Reclaim sessions idle longer than the configured timeout
    pub fn sweep_idle(&self, now: DateTime<Utc>) -> Vec<SessionKey> {
        self.registry.sweep_idle(now)
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn session_keys(&self) -> Vec<SessionKey> {
        self.registry.keys()
    }
}

fn summarize(session: &Session) -> SessionSummary {
    SessionSummary {
        session_key: session.key().clone(),
        counters: session.counters(),
        emotions: session.emotions().summary(),
        created_at_utc: session.created_at(),
        last_seen_utc: session.last_seen(),
    }
}

/// Keep the first occurrence of each kind; an empty list means every kind
fn dedup_kinds(kinds: &[BehaviorKind]) -> Vec<BehaviorKind> {
    if kinds.is_empty() {
        return BehaviorKind::ALL.to_vec();
    }
    let mut unique = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        if !unique.contains(&kind) {
            unique.push(kind);
        }
    }
    unique
}
