//! Debounce / counter engine
//!
//! Turns a noisy stream of per-frame detections into rate-limited events.
//! Every positive detection bumps `raw_count`; once it reaches the behavior's
//! trigger threshold an event fires, `event_count` is incremented and
//! `raw_count` starts over. Negative and declined frames change nothing.

use serde::{Deserialize, Serialize};

/// Counters for one (session, behavior kind) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CounterState {
    /// Positive detections since the last event
    pub raw_count: u32,
    /// Events emitted over the session lifetime, never reset
    pub event_count: u64,
}

/// Outcome of feeding one signal into the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessResult {
    pub event_fired: bool,
    pub raw_count: u32,
    pub event_count: u64,
}

impl ProcessResult {
    pub fn counters(&self) -> CounterState {
        CounterState {
            raw_count: self.raw_count,
            event_count: self.event_count,
        }
    }
}

/// Debounce state machine for one (session, behavior kind) pair.
///
/// Idle and Accumulating are folded into `raw_count` (Idle == 0).
#[derive(Debug, Clone)]
pub struct DebounceCounter {
    state: CounterState,
    trigger_threshold: u32,
}

impl DebounceCounter {
    pub fn new(trigger_threshold: u32) -> Self {
        Self {
            state: CounterState::default(),
            trigger_threshold: trigger_threshold.max(1),
        }
    }

    /// Feed one detector outcome. When `event_fired` is set the caller must
    /// clear the matching recency buffer.
    pub fn process(&mut self, signal: bool) -> ProcessResult {
        let mut event_fired = false;
        if signal {
            self.state.raw_count += 1;
            if self.state.raw_count >= self.trigger_threshold {
                event_fired = true;
                self.state.event_count += 1;
                self.state.raw_count = 0;
            }
        }

        ProcessResult {
            event_fired,
            raw_count: self.state.raw_count,
            event_count: self.state.event_count,
        }
    }

    pub fn state(&self) -> CounterState {
        self.state
    }

    pub fn trigger_threshold(&self) -> u32 {
        self.trigger_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fires_on_threshold() {
        let mut counter = DebounceCounter::new(3);

        let r1 = counter.process(true);
        assert!(!r1.event_fired);
        assert_eq!(r1.raw_count, 1);

        let r2 = counter.process(true);
        assert!(!r2.event_fired);
        assert_eq!(r2.raw_count, 2);

        let r3 = counter.process(true);
        assert_eq!(
            r3,
            ProcessResult {
                event_fired: true,
                raw_count: 0,
                event_count: 1
            }
        );
    }

    #[test]
    fn test_negative_signal_changes_nothing() {
        let mut counter = DebounceCounter::new(2);
        counter.process(true);
        let before = counter.state();

        let result = counter.process(false);
        assert!(!result.event_fired);
        assert_eq!(counter.state(), before);
    }

    #[test]
    fn test_negatives_do_not_reset_accumulation() {
        let mut counter = DebounceCounter::new(2);
        counter.process(true);
        counter.process(false);
        counter.process(false);
        assert!(counter.process(true).event_fired);
    }

    #[test]
    fn test_event_count_is_monotonic() {
        let mut counter = DebounceCounter::new(2);
        let mut fired = 0;
        for _ in 0..10 {
            if counter.process(true).event_fired {
                fired += 1;
            }
        }
        assert_eq!(fired, 5);
        assert_eq!(
            counter.state(),
            CounterState {
                raw_count: 0,
                event_count: 5
            }
        );
    }

    #[test]
    fn test_threshold_of_one_fires_every_positive() {
        let mut counter = DebounceCounter::new(1);
        for n in 1..=4 {
            let r = counter.process(true);
            assert!(r.event_fired);
            assert_eq!(r.raw_count, 0);
            assert_eq!(r.event_count, n);
        }
    }
}
