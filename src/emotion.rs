//! Emotion score aggregation
//!
//! Classification itself happens upstream; this module only interprets the
//! label-to-score maps an external classifier returns and keeps a running
//! per-session tally for end-of-call feedback.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of labels reported in a session summary
pub const SUMMARY_TOP_N: usize = 3;

/// Label-to-score mapping for one frame (scores are percentages)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmotionReading {
    pub scores: BTreeMap<String, f64>,
}

impl EmotionReading {
    pub fn new(scores: BTreeMap<String, f64>) -> Self {
        Self { scores }
    }

    /// Highest-scoring label and its score rounded to a whole percentage
    pub fn dominant(&self) -> Option<(&str, f64)> {
        self.scores
            .iter()
            .filter(|(_, score)| score.is_finite())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(label, score)| (label.as_str(), score.round()))
    }
}

/// Running sum of emotion scores across a session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmotionTally {
    totals: BTreeMap<String, f64>,
    readings: u64,
}

impl EmotionTally {
    pub fn record(&mut self, reading: &EmotionReading) {
        for (label, score) in &reading.scores {
            if score.is_finite() {
                *self.totals.entry(label.clone()).or_insert(0.0) += score;
            }
        }
        self.readings += 1;
    }

    /// Labels by descending total score; ties are ordered by label
    pub fn ranked(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> =
            self.totals.iter().map(|(l, s)| (l.clone(), *s)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    pub fn top(&self, n: usize) -> Vec<(String, f64)> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }

    pub fn readings(&self) -> u64 {
        self.readings
    }

    pub fn is_empty(&self) -> bool {
        self.readings == 0
    }

    pub fn summary(&self) -> EmotionSummary {
        EmotionSummary {
            readings: self.readings,
            ranked: self.ranked(),
            top: self.top(SUMMARY_TOP_N),
        }
    }
}

/// Serializable view of an [`EmotionTally`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSummary {
    pub readings: u64,
    pub ranked: Vec<(String, f64)>,
    pub top: Vec<(String, f64)>,
}

/// Korean display word for one of the seven standard emotion labels
pub fn korean_label(label: &str) -> &'static str {
    match label {
        "angry" => "긴장",
        "disgust" => "불편함",
        "fear" => "두려움",
        "happy" => "기쁨",
        "sad" => "슬픔",
        "surprise" => "놀람",
        "neutral" => "평온함",
        _ => "알 수 없음",
    }
}
