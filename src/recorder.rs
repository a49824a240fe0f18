//! Event recording
//!
//! The recorder owns at most one open [`Attempt`] and appends raw input events
//! to it in arrival order. It never looks inside an event: interpretation is the
//! job of the feature extractor and the decision policy.

use crate::clock::Millis;
use crate::error::AuthError;
use crate::types::InputEvent;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// One bounded authentication try
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    id: Uuid,
    opened_at: Millis,
    sealed_at: Option<Millis>,
    #[serde(default)]
    timed_out: bool,
    events: Vec<InputEvent>,
}

impl Attempt {
    fn open(opened_at: Millis) -> Self {
        Self {
            id: Uuid::new_v4(),
            opened_at,
            sealed_at: None,
            timed_out: false,
            events: Vec::new(),
        }
    }

    /// Build an already sealed attempt from a captured event log
    pub fn from_events(opened_at: Millis, sealed_at: Millis, events: Vec<InputEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            opened_at,
            sealed_at: Some(sealed_at.max(opened_at)),
            timed_out: false,
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn opened_at(&self) -> Millis {
        self.opened_at
    }

    pub fn sealed_at(&self) -> Option<Millis> {
        self.sealed_at
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed_at.is_some()
    }

    /// Whether the attempt was closed by its timeout rather than by the caller
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Events in arrival order
    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    /// Time between opening and sealing, zero while still open
    pub fn duration_ms(&self) -> Millis {
        self.sealed_at
            .map(|sealed| sealed.saturating_sub(self.opened_at))
            .unwrap_or(0)
    }

    fn seal(&mut self, at: Millis) {
        self.sealed_at = Some(at.max(self.opened_at));
    }
}

/// Append-only recorder for the current attempt
#[derive(Debug, Default)]
pub struct EventRecorder {
    current: Option<Attempt>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new attempt at `now`.
    ///
    /// Only one attempt may be open. If one already is, it is discarded (not
    /// merged) and handed back so the caller can see what was dropped.
    pub fn begin_attempt(&mut self, now: Millis) -> Option<Attempt> {
        let replaced = self.current.replace(Attempt::open(now));
        if let Some(ref old) = replaced {
            warn!(
                attempt_id = %old.id,
                discarded_events = old.events.len(),
                "open attempt replaced by a new one"
            );
        }
        if let Some(ref attempt) = self.current {
            debug!(attempt_id = %attempt.id, opened_at = now, "attempt opened");
        }
        replaced
    }

    /// Append an event to the open attempt.
    ///
    /// Fails with [`AuthError::NoActiveAttempt`] when nothing is open; the
    /// event is dropped in that case.
    pub fn record(&mut self, event: InputEvent) -> Result<(), AuthError> {
        match self.current.as_mut() {
            Some(attempt) => {
                attempt.events.push(event);
                Ok(())
            }
            None => {
                warn!(kind = event.kind(), "event recorded with no open attempt");
                Err(AuthError::NoActiveAttempt)
            }
        }
    }

    /// Close the open attempt and hand it over for evaluation
    pub fn seal_attempt(&mut self, now: Millis) -> Result<Attempt, AuthError> {
        let mut attempt = self.current.take().ok_or(AuthError::NoActiveAttempt)?;
        attempt.seal(now);
        debug!(
            attempt_id = %attempt.id,
            events = attempt.events.len(),
            duration_ms = attempt.duration_ms(),
            "attempt sealed"
        );
        Ok(attempt)
    }

    /// Seal the open attempt if it has been open for at least `timeout_ms`
    pub fn expire(&mut self, now: Millis, timeout_ms: Millis) -> Option<Attempt> {
        let expired = self
            .current
            .as_ref()
            .is_some_and(|attempt| now.saturating_sub(attempt.opened_at) >= timeout_ms);
        if !expired {
            return None;
        }

        let mut attempt = self.current.take()?;
        attempt.seal(now);
        attempt.timed_out = true;
        debug!(attempt_id = %attempt.id, "attempt timed out");
        Some(attempt)
    }

    /// Drop the open attempt without evaluating it
    pub fn abandon(&mut self) -> Option<Attempt> {
        self.current.take()
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&Attempt> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_without_attempt_fails() {
        let mut recorder = EventRecorder::new();
        let result = recorder.record(InputEvent::Backspace { t: 10 });
        assert!(matches!(result, Err(AuthError::NoActiveAttempt)));
        assert!(!recorder.is_open());
    }

    #[test]
    fn test_events_appended_in_arrival_order() {
        let mut recorder = EventRecorder::new();
        recorder.begin_attempt(0);
        recorder
            .record(InputEvent::KeyPress { symbol: '1', t: 20 })
            .unwrap();
        recorder
            .record(InputEvent::KeyRelease { symbol: '1', t: 10 })
            .unwrap();

        let attempt = recorder.seal_attempt(50).unwrap();
        assert_eq!(attempt.events().len(), 2);
        assert_eq!(attempt.events()[0].timestamp(), 20);
        assert_eq!(attempt.events()[1].timestamp(), 10);
        assert_eq!(attempt.duration_ms(), 50);
        assert!(attempt.is_sealed());
        assert!(!recorder.is_open());
    }

    #[test]
    fn test_begin_replaces_open_attempt() {
        let mut recorder = EventRecorder::new();
        assert!(recorder.begin_attempt(0).is_none());
        recorder.record(InputEvent::Honeypot { t: 5 }).unwrap();

        let replaced = recorder.begin_attempt(100).expect("previous attempt returned");
        assert_eq!(replaced.events().len(), 1);
        assert!(!replaced.is_sealed());

        let current = recorder.current().unwrap();
        assert!(current.events().is_empty());
        assert_eq!(current.opened_at(), 100);
    }

    #[test]
    fn test_seal_without_attempt_fails() {
        let mut recorder = EventRecorder::new();
        assert!(matches!(
            recorder.seal_attempt(0),
            Err(AuthError::NoActiveAttempt)
        ));
    }

    #[test]
    fn test_expire_only_after_timeout() {
        let mut recorder = EventRecorder::new();
        recorder.begin_attempt(1_000);

        assert!(recorder.expire(1_500, 1_000).is_none());
        assert!(recorder.is_open());

        let expired = recorder.expire(2_000, 1_000).unwrap();
        assert!(expired.timed_out());
        assert_eq!(expired.sealed_at(), Some(2_000));
        assert!(!recorder.is_open());
    }

    #[test]
    fn test_seal_never_precedes_open() {
        let attempt = Attempt::from_events(500, 100, Vec::new());
        assert_eq!(attempt.sealed_at(), Some(500));
        assert_eq!(attempt.duration_ms(), 0);
    }
}
