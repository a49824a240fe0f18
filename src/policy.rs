//! Decision policy
//!
//! Combines code correctness, honeypot detection, backspace corrections and the
//! optional motion check into a single verdict. [`LockSession`] carries the
//! per-attempt code buffer and counters through the
//! `Collecting → Evaluating → Accepted | Rejected` lifecycle.

use crate::config::PinConfig;
use crate::enrollment::MotionCheck;
use crate::types::{KeySymbol, ReasonCode, Verdict};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Everything the policy looks at for one attempt
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyInputs<'a> {
    pub entered_code: &'a str,
    pub honeypot_pressed: bool,
    pub backspace_count: u32,
    /// Result of the motion check, if one was performed
    pub motion: Option<MotionCheck>,
    pub timed_out: bool,
}

/// Stateless acceptance rule
#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    pin: PinConfig,
    motion_required: bool,
}

impl DecisionPolicy {
    pub fn new(pin: PinConfig, motion_required: bool) -> Self {
        Self {
            pin,
            motion_required,
        }
    }

    pub fn code_length(&self) -> usize {
        self.pin.code_length
    }

    pub fn motion_required(&self) -> bool {
        self.motion_required
    }

    /// Decide an attempt. Every check must pass; the first failing check, in
    /// the order timeout, honeypot, code, corrections, motion, names the reason.
    pub fn decide(&self, inputs: &PolicyInputs<'_>) -> Verdict {
        if inputs.timed_out {
            return Verdict::reject(ReasonCode::Timeout);
        }
        if inputs.honeypot_pressed {
            return Verdict::reject(ReasonCode::HoneypotTriggered);
        }
        if inputs.entered_code != self.pin.secret {
            return Verdict::reject(ReasonCode::WrongCode);
        }
        if let Some(required) = self.pin.required_backspaces {
            if inputs.backspace_count != required {
                return Verdict::reject(ReasonCode::CorrectionCountMismatch);
            }
        }
        if self.motion_required {
            match inputs.motion {
                Some(MotionCheck::Matched { .. }) => {}
                Some(MotionCheck::Mismatched { .. }) => {
                    return Verdict::reject(ReasonCode::MotionMismatch)
                }
                Some(MotionCheck::NotEnrolled) => {
                    return Verdict::reject(ReasonCode::MotionNotEnrolled)
                }
                Some(MotionCheck::InsufficientSamples { .. }) | None => {
                    return Verdict::reject(ReasonCode::MotionInsufficientSamples)
                }
            }
        }
        Verdict::accept()
    }
}

/// Lifecycle of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Collecting,
    Evaluating,
    Accepted,
    Rejected,
}

/// Per-attempt code buffer and anti-automation counters
#[derive(Debug, Clone)]
pub struct LockSession {
    policy: DecisionPolicy,
    state: SessionState,
    code: String,
    honeypot_pressed: bool,
    backspace_count: u32,
}

impl LockSession {
    pub fn new(policy: DecisionPolicy) -> Self {
        Self {
            policy,
            state: SessionState::Collecting,
            code: String::new(),
            honeypot_pressed: false,
            backspace_count: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Digits entered so far
    pub fn entered_len(&self) -> usize {
        self.code.chars().count()
    }

    pub fn backspace_count(&self) -> u32 {
        self.backspace_count
    }

    pub fn honeypot_pressed(&self) -> bool {
        self.honeypot_pressed
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Append a digit. Moves to `Evaluating` once the code is complete.
    pub fn enter(&mut self, symbol: KeySymbol) -> SessionState {
        if self.state != SessionState::Collecting {
            debug!(state = ?self.state, "digit ignored outside collection");
            return self.state;
        }
        self.code.push(symbol);
        if self.entered_len() >= self.policy.code_length() {
            self.state = SessionState::Evaluating;
        }
        self.state
    }

    /// Remove the last digit. Counted as a correction even on an empty buffer.
    pub fn backspace(&mut self) {
        if self.state != SessionState::Collecting {
            return;
        }
        self.code.pop();
        self.backspace_count += 1;
    }

    /// Record a decoy key press
    pub fn honeypot(&mut self) {
        if self.state != SessionState::Collecting {
            return;
        }
        self.honeypot_pressed = true;
    }

    /// Decide the completed code. Returns `None` unless the session is
    /// `Evaluating`.
    ///
    /// A rejection clears the buffer and counters and starts collecting again.
    /// An acceptance clears them and stays `Accepted` until [`reset`](Self::reset).
    pub fn evaluate(&mut self, motion: Option<MotionCheck>) -> Option<Verdict> {
        if self.state != SessionState::Evaluating {
            return None;
        }
        Some(self.conclude(motion, false))
    }

    /// Reject the in-progress attempt because its time ran out
    pub fn time_out(&mut self) -> Verdict {
        self.conclude(None, true)
    }

    fn conclude(&mut self, motion: Option<MotionCheck>, timed_out: bool) -> Verdict {
        let verdict = self.policy.decide(&PolicyInputs {
            entered_code: &self.code,
            honeypot_pressed: self.honeypot_pressed,
            backspace_count: self.backspace_count,
            motion,
            timed_out,
        });

        info!(
            accepted = verdict.accepted,
            reason = ?verdict.reason,
            backspaces = self.backspace_count,
            "attempt decided"
        );

        self.clear();
        self.state = if verdict.accepted {
            SessionState::Accepted
        } else {
            SessionState::Collecting
        };
        verdict
    }

    /// Start collecting a fresh code
    pub fn reset(&mut self) {
        self.clear();
        self.state = SessionState::Collecting;
    }

    fn clear(&mut self) {
        self.code.clear();
        self.honeypot_pressed = false;
        self.backspace_count = 0;
    }
}
