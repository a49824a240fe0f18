//! Motion patterns
//!
//! A [`MotionPattern`] is an ordered trace of device-motion samples. Traces of
//! different lengths are brought to a common length by nearest-by-floor
//! resampling before they are compared. The [`MotionRecorder`] owns the single
//! timer-bounded recording window that produces a trace.

use crate::clock::Millis;
use crate::config::MotionConfig;
use crate::error::AuthError;
use crate::types::{MotionReading, MotionSample};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Ordered motion trace with non-decreasing timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MotionSample>", into = "Vec<MotionSample>")]
pub struct MotionPattern {
    samples: Vec<MotionSample>,
}

impl MotionPattern {
    /// Build a pattern, rejecting samples that go back in time
    pub fn new(samples: Vec<MotionSample>) -> Result<Self, AuthError> {
        if let Some(index) = samples
            .windows(2)
            .position(|pair| pair[1].t < pair[0].t)
        {
            return Err(AuthError::NonMonotonicTimestamps { index: index + 1 });
        }
        Ok(Self { samples })
    }

    pub fn empty() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    pub fn samples(&self) -> &[MotionSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time covered by the trace
    pub fn span_ms(&self) -> Millis {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.t - first.t,
            _ => 0,
        }
    }

    pub fn into_samples(self) -> Vec<MotionSample> {
        self.samples
    }
}

impl TryFrom<Vec<MotionSample>> for MotionPattern {
    type Error = AuthError;

    fn try_from(samples: Vec<MotionSample>) -> Result<Self, Self::Error> {
        MotionPattern::new(samples)
    }
}

impl From<MotionPattern> for Vec<MotionSample> {
    fn from(pattern: MotionPattern) -> Self {
        pattern.samples
    }
}

/// Resample to exactly `target_length` samples.
///
/// Output index `i` takes source index `floor(i * len / target_length)`. No
/// averaging happens, so neighbouring outputs may repeat a source sample. An
/// empty pattern resamples to an empty pattern.
pub fn resample(pattern: &MotionPattern, target_length: usize) -> MotionPattern {
    let len = pattern.len();
    if len == 0 {
        return MotionPattern::empty();
    }

    let samples = (0..target_length)
        .map(|i| pattern.samples[i * len / target_length])
        .collect();

    // Floor indices are non-decreasing in i, so ordering is preserved.
    MotionPattern { samples }
}

/// Brings traces to the comparison length, refusing traces that are too short
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternNormalizer {
    target_length: usize,
    min_samples: usize,
}

impl Default for PatternNormalizer {
    fn default() -> Self {
        let defaults = MotionConfig::default();
        Self::new(defaults.target_length, defaults.min_samples)
    }
}

impl PatternNormalizer {
    pub fn new(target_length: usize, min_samples: usize) -> Self {
        Self {
            target_length,
            min_samples,
        }
    }

    pub fn from_config(config: &MotionConfig) -> Self {
        Self::new(config.target_length, config.min_samples)
    }

    pub fn target_length(&self) -> usize {
        self.target_length
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Resample `pattern` to the target length.
    ///
    /// Fails with [`AuthError::InsufficientSamples`] when the raw trace has
    /// fewer than `min_samples` samples.
    pub fn normalize(&self, pattern: &MotionPattern) -> Result<MotionPattern, AuthError> {
        self.check_length(pattern)?;
        Ok(resample(pattern, self.target_length))
    }

    pub fn check_length(&self, pattern: &MotionPattern) -> Result<(), AuthError> {
        if pattern.len() < self.min_samples {
            return Err(AuthError::InsufficientSamples {
                got: pattern.len(),
                required: self.min_samples,
            });
        }
        Ok(())
    }
}

/// What a recording window is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingPurpose {
    Enrollment,
    Verification,
}

#[derive(Debug)]
struct RecordingWindow {
    purpose: RecordingPurpose,
    opens_at: Millis,
    closes_at: Millis,
    samples: Vec<MotionSample>,
}

/// Outcome of pushing a sensor reading into the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDisposition {
    /// Appended to the window
    Recorded,
    /// Arrived during the countdown before the window opened
    BeforeWindow,
    /// Arrived after the window deadline
    AfterWindow,
    /// Went back in time relative to the previous sample
    OutOfOrder,
}

/// A finished recording window
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub purpose: RecordingPurpose,
    pub pattern: MotionPattern,
}

/// Single-window motion recorder.
///
/// Samples arrive from a periodic producer and are only readable after the
/// window is finished. At most one window is open at a time; a second request
/// is refused rather than queued.
#[derive(Debug)]
pub struct MotionRecorder {
    countdown_ms: Millis,
    window_ms: Millis,
    window: Option<RecordingWindow>,
}

impl Default for MotionRecorder {
    fn default() -> Self {
        Self::from_config(&MotionConfig::default())
    }
}

impl MotionRecorder {
    pub fn new(countdown_ms: Millis, window_ms: Millis) -> Self {
        Self {
            countdown_ms,
            window_ms,
            window: None,
        }
    }

    pub fn from_config(config: &MotionConfig) -> Self {
        Self::new(config.countdown_ms, config.window_ms)
    }

    /// Request a recording at `now`. The window opens after the countdown.
    pub fn start(&mut self, purpose: RecordingPurpose, now: Millis) -> Result<(), AuthError> {
        if let Some(ref active) = self.window {
            warn!(
                active = ?active.purpose,
                requested = ?purpose,
                "recording request rejected, window already open"
            );
            return Err(AuthError::RecordingInProgress);
        }

        let opens_at = now.saturating_add(self.countdown_ms);
        self.window = Some(RecordingWindow {
            purpose,
            opens_at,
            closes_at: opens_at.saturating_add(self.window_ms),
            samples: Vec::new(),
        });
        debug!(?purpose, opens_at, "motion recording scheduled");
        Ok(())
    }

    /// Feed one sensor tick
    pub fn push(
        &mut self,
        reading: MotionReading,
        now: Millis,
    ) -> Result<SampleDisposition, AuthError> {
        let window = self.window.as_mut().ok_or(AuthError::NoActiveRecording)?;

        if now < window.opens_at {
            return Ok(SampleDisposition::BeforeWindow);
        }
        if now >= window.closes_at {
            return Ok(SampleDisposition::AfterWindow);
        }
        if window.samples.last().is_some_and(|last| now < last.t) {
            return Ok(SampleDisposition::OutOfOrder);
        }

        window.samples.push(reading.into_sample(now));
        Ok(SampleDisposition::Recorded)
    }

    /// Whether the open window has passed its deadline
    pub fn is_expired(&self, now: Millis) -> bool {
        self.window
            .as_ref()
            .is_some_and(|window| now >= window.closes_at)
    }

    pub fn is_recording(&self) -> bool {
        self.window.is_some()
    }

    pub fn purpose(&self) -> Option<RecordingPurpose> {
        self.window.as_ref().map(|window| window.purpose)
    }

    /// Close the window and hand over the trace
    pub fn finish(&mut self) -> Result<Recording, AuthError> {
        let window = self.window.take().ok_or(AuthError::NoActiveRecording)?;
        info!(
            purpose = ?window.purpose,
            samples = window.samples.len(),
            "motion recording finished"
        );
        Ok(Recording {
            purpose: window.purpose,
            pattern: MotionPattern {
                samples: window.samples,
            },
        })
    }

    /// Abort the open window, discarding partial samples
    pub fn cancel(&mut self) -> bool {
        match self.window.take() {
            Some(window) => {
                info!(
                    purpose = ?window.purpose,
                    discarded = window.samples.len(),
                    "motion recording cancelled"
                );
                true
            }
            None => false,
        }
    }
}
