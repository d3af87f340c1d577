//! Per-session temporal state and the session registry
//!
//! A [`Session`] owns everything that is remembered between frames for one
//! user: a recency buffer and debounce counter per behavior kind, the sway
//! baseline and the emotion tally. Sessions never share state.
//!
//! The [`SessionRegistry`] is the only structure touched by many callers at
//! once. Map access goes through an `RwLock`; each session sits behind its own
//! `Mutex`, so frames for different sessions proceed in parallel while two
//! frames for the same session are serialized. Lock order is always map first,
//! then session.

use crate::baseline::{BaselineState, BaselineTracker};
use crate::buffer::RecencyBuffer;
use crate::config::{BehaviorConfig, FluxConfig};
use crate::debounce::{CounterState, DebounceCounter};
use crate::detectors::BehaviorDetector;
use crate::emotion::{EmotionReading, EmotionTally};
use crate::types::{
    Admission, BehaviorKind, Frame, FrameEvaluation, LandmarkPayload, SessionKey, Signal,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Shared handle to one session's state
pub type SessionHandle = Arc<Mutex<Session>>;

/// Buffer and counter for one behavior kind within a session
#[derive(Debug, Clone)]
struct BehaviorLane {
    buffer: RecencyBuffer,
    counter: DebounceCounter,
    clear_on_trigger: bool,
}

impl BehaviorLane {
    fn new(config: &BehaviorConfig) -> Self {
        Self {
            buffer: RecencyBuffer::new(config.buffer_capacity),
            counter: DebounceCounter::new(config.trigger_threshold),
            clear_on_trigger: config.clear_on_trigger,
        }
    }
}

/// All temporal state for one user's stream
#[derive(Debug)]
pub struct Session {
    key: SessionKey,
    config: Arc<FluxConfig>,
    /// Created lazily on the first frame of each kind
    lanes: BTreeMap<BehaviorKind, BehaviorLane>,
    baseline: BaselineTracker,
    emotions: EmotionTally,
    created_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    /// Set once the registry drops the session
    closed: bool,
}

impl Session {
    pub fn new(key: SessionKey, config: Arc<FluxConfig>, now: DateTime<Utc>) -> Self {
        let baseline = BaselineTracker::from_config(&config);
        Self {
            key,
            config,
            lanes: BTreeMap::new(),
            baseline,
            emotions: EmotionTally::default(),
            created_at: now,
            last_seen: now,
            closed: false,
        }
    }

    /// Admit a frame for `kind`, run its detector on the newest sample and
    /// update the debounce counter.
    ///
    /// Stale or duplicate frames are rejected without touching the buffer,
    /// counters or baseline.
    pub fn evaluate(
        &mut self,
        kind: BehaviorKind,
        timestamp: f64,
        payload: Arc<LandmarkPayload>,
        now: DateTime<Utc>,
    ) -> FrameEvaluation {
        self.last_seen = now;

        let config = &self.config;
        let lane = self
            .lanes
            .entry(kind)
            .or_insert_with(|| BehaviorLane::new(config.behavior(kind)));

        let frame = Frame {
            session_key: self.key.clone(),
            kind,
            timestamp,
            payload,
        };
        if lane.buffer.admit(frame) == Admission::Rejected {
            log::debug!(
                "[{}] {kind}: rejected frame t={timestamp} (last admitted {:?})",
                self.key,
                lane.buffer.last_admitted()
            );
            return FrameEvaluation::new(
                kind,
                Admission::Rejected,
                Signal::Declined,
                false,
                lane.counter.state(),
            );
        }

        let signal = match lane.buffer.latest() {
            Some(latest) => BehaviorDetector::detect(
                kind,
                &latest.payload,
                config,
                &mut self.baseline,
                latest.timestamp,
            ),
            None => Signal::Declined,
        };
        if signal == Signal::Declined {
            log::debug!("[{}] {kind}: detector declined t={timestamp}", self.key);
        }

        let result = lane.counter.process(signal.is_positive());
        if result.event_fired {
            log::info!(
                "[{}] {kind}: event #{} fired at t={timestamp}",
                self.key,
                result.event_count
            );
            if lane.clear_on_trigger {
                lane.buffer.clear();
            }
        }

        FrameEvaluation::new(
            kind,
            Admission::Accepted,
            signal,
            result.event_fired,
            result.counters(),
        )
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Counters for one kind (zero if no frame of that kind arrived yet)
    pub fn counter(&self, kind: BehaviorKind) -> CounterState {
        self.lanes
            .get(&kind)
            .map(|lane| lane.counter.state())
            .unwrap_or_default()
    }

    /// Counters for every behavior kind
    pub fn counters(&self) -> BTreeMap<BehaviorKind, CounterState> {
        BehaviorKind::ALL
            .iter()
            .map(|&kind| (kind, self.counter(kind)))
            .collect()
    }

    pub fn buffer(&self, kind: BehaviorKind) -> Option<&RecencyBuffer> {
        self.lanes.get(&kind).map(|lane| &lane.buffer)
    }

    pub fn baseline_state(&self) -> BaselineState {
        self.baseline.state()
    }

    pub fn record_emotion(&mut self, reading: &EmotionReading, now: DateTime<Utc>) {
        self.last_seen = now;
        self.emotions.record(reading);
    }

    pub fn emotions(&self) -> &EmotionTally {
        &self.emotions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    /// True once the session was removed from its registry. Frames applied
    /// to a closed session are lost.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Concurrency-safe store of one [`Session`] per key
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionKey, SessionHandle>>,
    config: Arc<FluxConfig>,
}

impl SessionRegistry {
    pub fn new(config: Arc<FluxConfig>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Return the session for `key`, creating it on first use.
    ///
    /// Concurrent first calls for the same key all receive the same session.
    pub fn get_or_create(&self, key: &SessionKey) -> SessionHandle {
        if let Some(handle) = self.sessions.read().get(key) {
            return Arc::clone(handle);
        }

        let mut sessions = self.sessions.write();
        let handle = sessions.entry(key.clone()).or_insert_with(|| {
            log::info!("[{key}] session created");
            Arc::new(Mutex::new(Session::new(
                key.clone(),
                Arc::clone(&self.config),
                Utc::now(),
            )))
        });
        Arc::clone(handle)
    }

    /// Run `f` on the live session for `key` while holding its lock.
    ///
    /// A handle taken just before `remove` or `sweep_idle` may point at a
    /// session that is already closed; in that case the lookup is repeated so
    /// the frame lands in the session now registered for `key`.
    pub fn with_session<R>(&self, key: &SessionKey, f: impl FnOnce(&mut Session) -> R) -> R {
        loop {
            let handle = self.get_or_create(key);
            let mut session = handle.lock();
            if !session.is_closed() {
                return f(&mut *session);
            }
            log::debug!("[{key}] handle outlived its session, retrying");
        }
    }

    /// Look up a session without creating it
    pub fn get(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.read().get(key).cloned()
    }

    /// Explicit teardown, e.g. when a call ends
    pub fn remove(&self, key: &SessionKey) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write();
        let removed = sessions.remove(key)?;
        removed.lock().closed = true;
        drop(sessions);

        log::info!("[{key}] session removed");
        Some(removed)
    }

    /// Remove every session idle for at least the configured timeout.
    /// Returns the removed keys.
    pub fn sweep_idle(&self, now: DateTime<Utc>) -> Vec<SessionKey> {
        // Out-of-range timeouts never expire anything
        let timeout =
            Duration::try_seconds(self.config.session_idle_timeout_secs).unwrap_or(Duration::MAX);
        let mut removed = Vec::new();

        self.sessions.write().retain(|key, handle| {
            let mut session = handle.lock();
            if now - session.last_seen() >= timeout {
                session.closed = true;
                removed.push(key.clone());
                false
            } else {
                true
            }
        });

        if !removed.is_empty() {
            log::info!("swept {} idle session(s)", removed.len());
        }
        removed.sort();
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Keys of all live sessions, sorted
    pub fn keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self.sessions.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn config(&self) -> &FluxConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::fixtures::{neutral_pose, raised_hand_pose, shifted_pose};
    use crate::types::Point3;
    use pretty_assertions::assert_eq;

    fn registry_with(config: FluxConfig) -> SessionRegistry {
        SessionRegistry::new(Arc::new(config))
    }

    fn pose_payload(pose: crate::types::LandmarkSet) -> Arc<LandmarkPayload> {
        Arc::new(LandmarkPayload::with_pose(pose))
    }

    #[test]
    fn test_hand_raise_threshold_scenario() {
        let mut config = FluxConfig::default();
        config.behaviors.hand_raise.trigger_threshold = 3;
        let registry = registry_with(config);
        let handle = registry.get_or_create(&SessionKey::from("s1"));
        let mut session = handle.lock();

        let raised = pose_payload(raised_hand_pose());
        let now = Utc::now();

        let e1 = session.evaluate(BehaviorKind::HandRaise, 1.0, raised.clone(), now);
        assert!(e1.raw_signal);
        assert!(!e1.event_fired);
        assert_eq!(e1.raw_count, 1);

        let e2 = session.evaluate(BehaviorKind::HandRaise, 2.0, raised.clone(), now);
        assert!(!e2.event_fired);
        assert_eq!(e2.raw_count, 2);

        let e3 = session.evaluate(BehaviorKind::HandRaise, 3.0, raised, now);
        assert!(e3.event_fired);
        assert_eq!(e3.raw_count, 0);
        assert_eq!(e3.event_count, 1);

        // Firing empties the buffer
        assert_eq!(session.buffer(BehaviorKind::HandRaise).unwrap().size(), 0);
    }

    #[test]
    fn test_no_clear_when_disabled() {
        let mut config = FluxConfig::default();
        config.behaviors.hand_raise.clear_on_trigger = false;
        let registry = registry_with(config);
        let handle = registry.get_or_create(&SessionKey::from("s1"));
        let mut session = handle.lock();

        let e = session.evaluate(
            BehaviorKind::HandRaise,
            1.0,
            pose_payload(raised_hand_pose()),
            Utc::now(),
        );
        assert!(e.event_fired);
        assert_eq!(session.buffer(BehaviorKind::HandRaise).unwrap().size(), 1);
    }

    #[test]
    fn test_stale_frame_is_idempotent() {
        let mut config = FluxConfig::default();
        config.behaviors.hand_raise.trigger_threshold = 3;
        let registry = registry_with(config);
        let handle = registry.get_or_create(&SessionKey::from("s1"));
        let mut session = handle.lock();
        let raised = pose_payload(raised_hand_pose());

        session.evaluate(BehaviorKind::HandRaise, 5.0, raised.clone(), Utc::now());
        let counters = session.counter(BehaviorKind::HandRaise);
        let size = session.buffer(BehaviorKind::HandRaise).unwrap().size();

        let again = session.evaluate(BehaviorKind::HandRaise, 5.0, raised, Utc::now());
        assert_eq!(again.admission, Admission::Rejected);
        assert!(!again.raw_signal);
        assert!(!again.event_fired);
        assert_eq!(session.counter(BehaviorKind::HandRaise), counters);
        assert_eq!(session.buffer(BehaviorKind::HandRaise).unwrap().size(), size);
    }

    #[test]
    fn test_stale_sway_frame_does_not_touch_baseline() {
        let registry = registry_with(FluxConfig::default());
        let handle = registry.get_or_create(&SessionKey::from("s1"));
        let mut session = handle.lock();

        session.evaluate(BehaviorKind::SideSway, 2.0, pose_payload(neutral_pose()), Utc::now());
        let before = session.baseline_state();
        session.evaluate(BehaviorKind::SideSway, 1.0, pose_payload(shifted_pose(0.3)), Utc::now());
        assert_eq!(session.baseline_state(), before);
    }

    #[test]
    fn test_side_sway_baseline_scenario() {
        let registry = registry_with(FluxConfig::default());
        let handle = registry.get_or_create(&SessionKey::from("s1"));
        let mut session = handle.lock();
        let now = Utc::now();

        let first = session.evaluate(BehaviorKind::SideSway, 1.0, pose_payload(neutral_pose()), now);
        assert_eq!(first.signal, Signal::Negative);
        assert_eq!(
            session.baseline_state().reference_point,
            Some(Point3::new(0.5, 0.5, 0.0))
        );

        let still = session.evaluate(BehaviorKind::SideSway, 2.0, pose_payload(neutral_pose()), now);
        assert!(!still.raw_signal);

        let moved = session.evaluate(BehaviorKind::SideSway, 3.0, pose_payload(shifted_pose(0.2)), now);
        assert!(moved.raw_signal);
        assert_eq!(moved.raw_count, 1);
    }

    #[test]
    fn test_kinds_are_independent() {
        let registry = registry_with(FluxConfig::default());
        let handle = registry.get_or_create(&SessionKey::from("s1"));
        let mut session = handle.lock();
        let raised = pose_payload(raised_hand_pose());

        session.evaluate(BehaviorKind::HandRaise, 10.0, raised.clone(), Utc::now());
        // Same timestamp is fresh for a different kind
        let other = session.evaluate(BehaviorKind::FoldedArm, 10.0, raised, Utc::now());
        assert_eq!(other.admission, Admission::Accepted);
        assert_eq!(session.counter(BehaviorKind::HandRaise).event_count, 1);
        assert_eq!(session.counter(BehaviorKind::FoldedArm), CounterState::default());
    }

    #[test]
    fn test_session_isolation() {
        let registry = registry_with(FluxConfig::default());
        let a = registry.get_or_create(&SessionKey::from("a"));
        let b = registry.get_or_create(&SessionKey::from("b"));

        {
            let mut session = a.lock();
            session.evaluate(BehaviorKind::HandRaise, 1.0, pose_payload(raised_hand_pose()), Utc::now());
            session.evaluate(BehaviorKind::SideSway, 1.0, pose_payload(neutral_pose()), Utc::now());
        }

        let session_b = b.lock();
        assert!(session_b
            .counters()
            .values()
            .all(|c| *c == CounterState::default()));
        assert!(session_b.buffer(BehaviorKind::HandRaise).is_none());
        assert!(session_b.baseline_state().reference_point.is_none());
    }

    #[test]
    fn test_get_or_create_returns_same_session() {
        let registry = registry_with(FluxConfig::default());
        let key = SessionKey::from("room:user");
        let h1 = registry.get_or_create(&key);
        let h2 = registry.get_or_create(&key);
        assert!(Arc::ptr_eq(&h1, &h2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_creation_yields_one_session() {
        let registry = registry_with(FluxConfig::default());
        let key = SessionKey::from("shared");

        let handles: Vec<SessionHandle> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| registry.get_or_create(&key)))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(registry.len(), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    }

    #[test]
    fn test_concurrent_frames_keep_counters_consistent() {
        let registry = registry_with(FluxConfig::default());
        let key = SessionKey::from("busy");
        let raised = pose_payload(raised_hand_pose());

        let accepted: u64 = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|worker| {
                    let registry = &registry;
                    let key = &key;
                    let raised = raised.clone();
                    scope.spawn(move || {
                        let mut accepted = 0u64;
                        for i in 0..100 {
                            let ts = (i * 8 + worker) as f64;
                            let handle = registry.get_or_create(key);
                            let eval = handle.lock().evaluate(
                                BehaviorKind::HandRaise,
                                ts,
                                raised.clone(),
                                Utc::now(),
                            );
                            if eval.admission == Admission::Accepted {
                                accepted += 1;
                            }
                        }
                        accepted
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).sum()
        });

        // Hand raise fires on every positive frame by default
        let handle = registry.get(&key).unwrap();
        let session = handle.lock();
        assert_eq!(session.counter(BehaviorKind::HandRaise).event_count, accepted);
        assert!(accepted > 0);
    }

    #[test]
    fn test_remove_and_get() {
        let registry = registry_with(FluxConfig::default());
        let key = SessionKey::from("gone");
        registry.get_or_create(&key);
        assert!(registry.get(&key).is_some());
        assert!(registry.remove(&key).is_some());
        assert!(registry.get(&key).is_none());
        assert!(registry.remove(&key).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_idle() {
        let config = FluxConfig {
            session_idle_timeout_secs: 60,
            ..Default::default()
        };
        let registry = registry_with(config);
        let stale = SessionKey::from("stale");
        let fresh = SessionKey::from("fresh");
        let start = Utc::now();

        registry
            .get_or_create(&stale)
            .lock()
            .evaluate(BehaviorKind::HandRaise, 1.0, pose_payload(neutral_pose()), start);
        registry.get_or_create(&fresh).lock().evaluate(
            BehaviorKind::HandRaise,
            1.0,
            pose_payload(neutral_pose()),
            start + Duration::seconds(50),
        );

        let stale_handle = registry.get(&stale).unwrap();
        let removed = registry.sweep_idle(start + Duration::seconds(70));
        assert_eq!(removed, vec![stale]);
        assert_eq!(registry.keys(), vec![fresh]);
        assert!(stale_handle.lock().is_closed());
    }

    #[test]
    fn test_sweep_with_unrepresentable_timeout_keeps_sessions() {
        let config = FluxConfig {
            session_idle_timeout_secs: i64::MAX / 10,
            ..Default::default()
        };
        let registry = registry_with(config);
        registry.get_or_create(&SessionKey::from("kept"));

        let removed = registry.sweep_idle(Utc::now() + Duration::days(365));
        assert!(removed.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_removed_handle_is_closed() {
        let registry = registry_with(FluxConfig::default());
        let key = SessionKey::from("call");
        let handle = registry.get_or_create(&key);
        assert!(!handle.lock().is_closed());

        registry.remove(&key);
        assert!(handle.lock().is_closed());
    }

    #[test]
    fn test_with_session_skips_removed_session() {
        let registry = registry_with(FluxConfig::default());
        let key = SessionKey::from("racy");

        // A caller grabs the handle, then the session is torn down before it
        // takes the lock.
        let stale = registry.get_or_create(&key);
        registry.remove(&key);

        let eval = registry.with_session(&key, |session| {
            session.evaluate(
                BehaviorKind::HandRaise,
                1.0,
                pose_payload(raised_hand_pose()),
                Utc::now(),
            )
        });
        assert!(eval.event_fired);

        let live = registry.get(&key).unwrap();
        assert!(!Arc::ptr_eq(&live, &stale));
        assert_eq!(live.lock().counter(BehaviorKind::HandRaise).event_count, 1);
        assert_eq!(stale.lock().counter(BehaviorKind::HandRaise), CounterState::default());
    }

    #[test]
    fn test_with_session_races_sweep() {
        let config = FluxConfig {
            session_idle_timeout_secs: 1,
            ..Default::default()
        };
        let registry = registry_with(config);
        let key = SessionKey::from("swept");
        let raised = pose_payload(raised_hand_pose());

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..200 {
                    registry.sweep_idle(Utc::now() + Duration::seconds(5));
                }
            });
            for i in 0..200 {
                let eval = registry.with_session(&key, |session| {
                    assert!(!session.is_closed());
                    session.evaluate(BehaviorKind::HandRaise, i as f64, raised.clone(), Utc::now())
                });
                assert_eq!(eval.admission, Admission::Accepted);
            }
        });
    }
}
