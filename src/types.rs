//! Core data types
//!
//! Raw input events, motion readings and the authentication verdict that flow
//! through the capture-and-verification pipeline.

use crate::clock::Millis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbol printed on a keypad key (digits on the lock screen)
pub type KeySymbol = char;

/// Device rotation in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Rotation {
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self { alpha, beta, gamma }
    }

    /// Sum of absolute per-axis differences
    pub fn l1_distance(&self, other: &Rotation) -> f64 {
        (self.alpha - other.alpha).abs()
            + (self.beta - other.beta).abs()
            + (self.gamma - other.gamma).abs()
    }
}

/// Device acceleration in m/s² (gravity excluded)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Sum of absolute per-axis differences
    pub fn l1_distance(&self, other: &Acceleration) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs() + (self.z - other.z).abs()
    }
}

/// One device-motion reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Capture time
    pub t: Millis,
    pub rotation: Rotation,
    pub acceleration: Acceleration,
}

impl MotionSample {
    pub fn new(t: Millis, rotation: Rotation, acceleration: Acceleration) -> Self {
        Self {
            t,
            rotation,
            acceleration,
        }
    }
}

/// Raw sensor delivery. Either half may be missing on devices or emulators
/// without the corresponding sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionReading {
    #[serde(default)]
    pub rotation: Option<Rotation>,
    #[serde(default)]
    pub acceleration: Option<Acceleration>,
}

impl MotionReading {
    /// Stamp the reading, substituting zeros for missing sensors
    pub fn into_sample(self, t: Millis) -> MotionSample {
        MotionSample {
            t,
            rotation: self.rotation.unwrap_or_default(),
            acceleration: self.acceleration.unwrap_or_default(),
        }
    }
}

/// A raw interaction event captured during an attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent {
    /// Finger down on a keypad key
    KeyPress { symbol: KeySymbol, t: Millis },
    /// Finger lifted from a keypad key
    KeyRelease { symbol: KeySymbol, t: Millis },
    /// Touch-down position relative to the touched key
    Touch { x: f64, y: f64, t: Millis },
    /// Pointer movement across the lock screen
    Hover { x: f64, y: f64, t: Millis },
    /// Backspace key pressed
    Backspace { t: Millis },
    /// Decoy key pressed
    Honeypot { t: Millis },
    /// Periodic device-motion tick
    MotionSample(MotionSample),
}

impl InputEvent {
    /// Capture time of the event
    pub fn timestamp(&self) -> Millis {
        match self {
            InputEvent::KeyPress { t, .. }
            | InputEvent::KeyRelease { t, .. }
            | InputEvent::Touch { t, .. }
            | InputEvent::Hover { t, .. }
            | InputEvent::Backspace { t }
            | InputEvent::Honeypot { t } => *t,
            InputEvent::MotionSample(sample) => sample.t,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InputEvent::KeyPress { .. } => "key_press",
            InputEvent::KeyRelease { .. } => "key_release",
            InputEvent::Touch { .. } => "touch",
            InputEvent::Hover { .. } => "hover",
            InputEvent::Backspace { .. } => "backspace",
            InputEvent::Honeypot { .. } => "honeypot",
            InputEvent::MotionSample(_) => "motion_sample",
        }
    }
}

/// A point on screen in key-local coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub x: f64,
    pub y: f64,
}

/// Which part of a key a touch landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchSide {
    Center,
    Left,
    Right,
    Top,
    Bottom,
}

impl TouchSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TouchSide::Center => "center",
            TouchSide::Left => "left",
            TouchSide::Right => "right",
            TouchSide::Top => "top",
            TouchSide::Bottom => "bottom",
        }
    }
}

impl fmt::Display for TouchSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an attempt was accepted or rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// All checks passed
    Accepted,
    /// The attempt timed out before the code was complete
    Timeout,
    /// A decoy key was pressed during the attempt
    HoneypotTriggered,
    /// Entered digits differ from the enrolled secret
    WrongCode,
    /// The number of backspace corrections differs from the required count
    CorrectionCountMismatch,
    /// The live motion trace did not match the enrolled pattern
    MotionMismatch,
    /// Motion verification is enabled but no pattern is enrolled
    MotionNotEnrolled,
    /// The live motion trace was too short to compare
    MotionInsufficientSamples,
}

/// Terminal outcome of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub accepted: bool,
    pub reason: ReasonCode,
}

impl Verdict {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            reason: ReasonCode::Accepted,
        }
    }

    pub fn reject(reason: ReasonCode) -> Self {
        Self {
            accepted: false,
            reason,
        }
    }
}
