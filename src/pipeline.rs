//! Lock-screen orchestration
//!
//! [`LockEngine`] wires the recorder, feature extractor, decision policy and
//! motion authenticator into one stateful object driven by host UI callbacks.
//! [`replay_attempt`] runs a captured event log through a fresh engine in one
//! shot.

use crate::clock::{Clock, ManualClock, Millis};
use crate::config::EngineConfig;
use crate::enrollment::{MotionAuthenticator, MotionCheck};
use crate::error::AuthError;
use crate::export::ExportTable;
use crate::features::{FeatureExtractor, FeatureSet};
use crate::keypad::Keypad;
use crate::motion::{MotionPattern, MotionRecorder, RecordingPurpose, SampleDisposition};
use crate::policy::{DecisionPolicy, LockSession, SessionState};
use crate::recorder::{Attempt, EventRecorder};
use crate::store::{EnrolledPattern, MemoryPatternStore, PatternStore};
use crate::types::{InputEvent, KeySymbol, MotionReading, MotionSample, Verdict};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Everything known about a concluded attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub attempt_id: Uuid,
    pub verdict: Verdict,
    pub timed_out: bool,
    pub features: FeatureSet,
    /// Motion check, when motion verification is enabled
    pub motion: Option<MotionCheck>,
    pub export: ExportTable,
}

impl AttemptOutcome {
    fn new(
        attempt: &Attempt,
        verdict: Verdict,
        motion: Option<MotionCheck>,
        extractor: &FeatureExtractor,
    ) -> Self {
        let features = extractor.extract(attempt);
        let export = ExportTable::from_features(&features);
        Self {
            attempt_id: attempt.id(),
            verdict,
            timed_out: attempt.timed_out(),
            features,
            motion,
            export,
        }
    }

    pub fn to_json(&self) -> Result<String, AuthError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Attempt opened by [`LockEngine::begin_attempt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptStart {
    pub id: Uuid,
    /// Attempt that was still open and got discarded
    pub replaced: Option<Uuid>,
}

/// Result of closing a motion recording window
#[derive(Debug, Clone, PartialEq)]
pub enum MotionRecordingOutcome {
    /// The trace became the new enrolled pattern
    Enrolled(EnrolledPattern),
    /// The trace is held for the next code evaluation
    Captured { samples: usize },
}

/// Stateful lock-screen engine.
///
/// Input callbacks are stamped with the injected clock. Completing the code
/// evaluates the attempt immediately. A rejected attempt is replaced by a fresh
/// one so the user can try again; an accepted attempt refuses further input
/// until [`begin_attempt`](Self::begin_attempt) is called.
#[derive(Debug)]
pub struct LockEngine<C: Clock, S: PatternStore> {
    config: EngineConfig,
    clock: C,
    recorder: EventRecorder,
    session: LockSession,
    extractor: FeatureExtractor,
    motion_recorder: MotionRecorder,
    authenticator: MotionAuthenticator<S>,
    live_motion: Option<MotionPattern>,
    keypad: Keypad,
}

impl<C: Clock, S: PatternStore> LockEngine<C, S> {
    /// Build an engine and run startup housekeeping on the store
    pub fn new(config: EngineConfig, clock: C, store: S) -> Result<Self, AuthError> {
        config.validate()?;

        let policy = DecisionPolicy::new(config.pin.clone(), config.motion.enabled);
        let mut authenticator = MotionAuthenticator::new(config.motion.clone(), store);
        authenticator.initialize()?;

        Ok(Self {
            recorder: EventRecorder::new(),
            session: LockSession::new(policy),
            extractor: FeatureExtractor::new(config.touch.clone()),
            motion_recorder: MotionRecorder::from_config(&config.motion),
            authenticator,
            live_motion: None,
            keypad: Keypad::default(),
            clock,
            config,
        })
    }

    /// Open a fresh attempt with a newly shuffled keypad.
    ///
    /// An attempt that is still open is discarded unevaluated, together with
    /// the digits entered so far and any held motion trace. Its id is returned
    /// alongside the new one.
    pub fn begin_attempt(&mut self) -> AttemptStart {
        let now = self.clock.now_ms();
        self.session.reset();
        self.live_motion = None;
        let replaced = self.open_attempt(now);
        AttemptStart {
            id: self.current_attempt_id().unwrap_or_default(),
            replaced,
        }
    }

    fn open_attempt(&mut self, now: Millis) -> Option<Uuid> {
        self.keypad = Keypad::shuffled(&mut rand::thread_rng());
        self.recorder.begin_attempt(now).map(|old| old.id())
    }

    pub fn key_press(&mut self, symbol: KeySymbol) -> Result<Option<AttemptOutcome>, AuthError> {
        let t = self.clock.now_ms();
        self.handle(InputEvent::KeyPress { symbol, t })
    }

    /// Key lifted; this is when the digit enters the code
    pub fn key_release(&mut self, symbol: KeySymbol) -> Result<Option<AttemptOutcome>, AuthError> {
        let t = self.clock.now_ms();
        self.handle(InputEvent::KeyRelease { symbol, t })
    }

    pub fn touch(&mut self, x: f64, y: f64) -> Result<Option<AttemptOutcome>, AuthError> {
        let t = self.clock.now_ms();
        self.handle(InputEvent::Touch { x, y, t })
    }

    pub fn hover(&mut self, x: f64, y: f64) -> Result<Option<AttemptOutcome>, AuthError> {
        let t = self.clock.now_ms();
        self.handle(InputEvent::Hover { x, y, t })
    }

    pub fn backspace(&mut self) -> Result<Option<AttemptOutcome>, AuthError> {
        let t = self.clock.now_ms();
        self.handle(InputEvent::Backspace { t })
    }

    pub fn honeypot(&mut self) -> Result<Option<AttemptOutcome>, AuthError> {
        let t = self.clock.now_ms();
        self.handle(InputEvent::Honeypot { t })
    }

    /// Record an already stamped event and apply it to the code buffer.
    ///
    /// Returns the outcome when the event completes the code. An event that
    /// arrives after the open attempt ran out of time is not recorded; the
    /// attempt is rejected with a timeout instead.
    pub fn handle(&mut self, event: InputEvent) -> Result<Option<AttemptOutcome>, AuthError> {
        if self.session.state() == SessionState::Accepted {
            return Err(AuthError::AttemptSealed);
        }
        if let Some(outcome) = self.expire_stale(event.timestamp()) {
            debug!(kind = event.kind(), "event arrived after the attempt timed out");
            return Ok(Some(outcome));
        }
        self.recorder.record(event.clone())?;
        debug!(kind = event.kind(), t = event.timestamp(), "event captured");

        match event {
            InputEvent::KeyRelease { symbol, .. } => {
                if self.session.enter(symbol) == SessionState::Evaluating {
                    return self.conclude().map(Some);
                }
            }
            InputEvent::Backspace { .. } => self.session.backspace(),
            InputEvent::Honeypot { .. } => self.session.honeypot(),
            _ => {}
        }
        Ok(None)
    }

    /// Time out the open attempt once it exceeds the configured limit
    pub fn tick(&mut self) -> Option<AttemptOutcome> {
        let now = self.clock.now_ms();
        self.expire_stale(now)
    }

    fn expire_stale(&mut self, now: Millis) -> Option<AttemptOutcome> {
        self.expire_open(now, self.config.pin.attempt_timeout_ms)
    }

    fn expire_open(&mut self, now: Millis, timeout_ms: Millis) -> Option<AttemptOutcome> {
        let attempt = self.recorder.expire(now, timeout_ms)?;
        let verdict = self.session.time_out();
        self.live_motion = None;
        self.open_attempt(now);
        Some(AttemptOutcome::new(&attempt, verdict, None, &self.extractor))
    }

    fn conclude(&mut self) -> Result<AttemptOutcome, AuthError> {
        let live = self.live_motion.take();
        let motion = if self.config.motion.enabled {
            live.map(|pattern| self.authenticator.verify(&pattern))
        } else {
            None
        };

        let verdict = self
            .session
            .evaluate(motion)
            .ok_or(AuthError::NoActiveAttempt)?;

        let now = self.clock.now_ms();
        let attempt = self.recorder.seal_attempt(now)?;
        let outcome = AttemptOutcome::new(&attempt, verdict, motion, &self.extractor);

        if !verdict.accepted {
            self.open_attempt(now);
        }
        Ok(outcome)
    }

    /// Open a window that will become the new enrolled pattern
    pub fn start_enrollment(&mut self) -> Result<(), AuthError> {
        let now = self.clock.now_ms();
        self.motion_recorder.start(RecordingPurpose::Enrollment, now)
    }

    /// Open a window whose trace is checked at the next code evaluation
    pub fn start_verification(&mut self) -> Result<(), AuthError> {
        let now = self.clock.now_ms();
        self.motion_recorder.start(RecordingPurpose::Verification, now)
    }

    /// Feed one sensor tick into the open recording window
    pub fn push_motion(&mut self, reading: MotionReading) -> Result<SampleDisposition, AuthError> {
        let now = self.clock.now_ms();
        let disposition = self.motion_recorder.push(reading, now)?;
        if disposition == SampleDisposition::Recorded && self.recorder.is_open() {
            self.recorder
                .record(InputEvent::MotionSample(reading.into_sample(now)))?;
        }
        Ok(disposition)
    }

    /// Whether the open recording window has reached its deadline
    pub fn motion_window_elapsed(&self) -> bool {
        self.motion_recorder.is_expired(self.clock.now_ms())
    }

    /// Close the recording window and act on its purpose
    pub fn finish_motion(&mut self) -> Result<MotionRecordingOutcome, AuthError> {
        let recording = self.motion_recorder.finish()?;
        match recording.purpose {
            RecordingPurpose::Enrollment => self
                .authenticator
                .enroll(recording.pattern)
                .map(MotionRecordingOutcome::Enrolled),
            RecordingPurpose::Verification => Ok(self.submit_motion_trace(recording.pattern)),
        }
    }

    pub fn cancel_motion(&mut self) -> bool {
        self.motion_recorder.cancel()
    }

    /// Hold a trace captured outside the engine for the next evaluation
    pub fn submit_motion_trace(&mut self, pattern: MotionPattern) -> MotionRecordingOutcome {
        let samples = pattern.len();
        self.live_motion = Some(pattern);
        MotionRecordingOutcome::Captured { samples }
    }

    /// Enroll a trace captured outside the engine
    pub fn enroll(&mut self, pattern: MotionPattern) -> Result<EnrolledPattern, AuthError> {
        self.authenticator.enroll(pattern)
    }

    /// Remove the enrolled motion pattern
    pub fn clear_enrollment(&mut self) -> Result<bool, AuthError> {
        self.authenticator.clear()
    }

    pub fn is_enrolled(&self) -> bool {
        self.authenticator.is_enrolled()
    }

    pub fn enrolled_pattern(&self) -> Option<EnrolledPattern> {
        self.authenticator.enrolled()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn entered_len(&self) -> usize {
        self.session.entered_len()
    }

    pub fn current_attempt_id(&self) -> Option<Uuid> {
        self.recorder.current().map(Attempt::id)
    }

    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        self.authenticator.store()
    }

    pub fn into_store(self) -> S {
        self.authenticator.into_store()
    }
}

/// Replay a captured attempt through a fresh engine (stateless, one-shot).
///
/// Events are ordered by timestamp (ties keep their given order) and the attempt
/// opens at the first event. Motion samples in the log form the live trace. The
/// first event at or past `opened_at + attempt_timeout_ms` times the attempt
/// out, and so does a log that ends before the code is complete.
pub fn replay_attempt(
    mut events: Vec<InputEvent>,
    config: &EngineConfig,
    enrolled: Option<EnrolledPattern>,
) -> Result<AttemptOutcome, AuthError> {
    events.sort_by_key(InputEvent::timestamp);
    let opened_at: Millis = events.first().map(InputEvent::timestamp).unwrap_or(0);

    let mut config = config.clone();
    config.motion.clear_on_start = false;

    let mut store = MemoryPatternStore::new();
    if let Some(ref pattern) = enrolled {
        store.save(&config.motion.storage_key, pattern)?;
    }

    let clock = ManualClock::new(opened_at);
    let mut engine = LockEngine::new(config, &clock, store)?;
    engine.begin_attempt();

    let samples: Vec<MotionSample> = events
        .iter()
        .filter_map(|event| match event {
            InputEvent::MotionSample(sample) => Some(*sample),
            _ => None,
        })
        .collect();
    if !samples.is_empty() {
        engine.submit_motion_trace(MotionPattern::new(samples)?);
    }

    let total = events.len();
    for (index, event) in events.into_iter().enumerate() {
        clock.set(event.timestamp());
        if let Some(outcome) = engine.handle(event)? {
            if index + 1 < total {
                debug!(ignored = total - index - 1, "events after the decision ignored");
            }
            info!(accepted = outcome.verdict.accepted, "attempt replayed");
            return Ok(outcome);
        }
    }

    // the log ended before the code was complete
    clock.set(opened_at.saturating_add(engine.config().pin.attempt_timeout_ms));
    engine
        .expire_open(clock.now_ms(), 0)
        .ok_or(AuthError::NoActiveAttempt)
}

/// Request body accepted by [`replay_attempt_json`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayRequest {
    pub events: Vec<InputEvent>,
    #[serde(default)]
    pub config: Option<EngineConfig>,
    #[serde(default)]
    pub enrolled: Option<EnrolledPattern>,
}

/// JSON front end of [`replay_attempt`]: request JSON in, outcome JSON out
pub fn replay_attempt_json(request_json: &str) -> Result<String, AuthError> {
    let request: ReplayRequest = serde_json::from_str(request_json)
        .map_err(|e| AuthError::ParseError(e.to_string()))?;
    let config = match request.config {
        Some(config) => {
            config.validate()?;
            config
        }
        None => EngineConfig::default(),
    };
    replay_attempt(request.events, &config, request.enrolled)?.to_json()
}
