//! Motion similarity scoring
//!
//! Compares a live trace with an enrolled trace sample by sample. Each sample
//! pair is a hit when both the rotation and the acceleration L1 differences stay
//! under `tolerance * axis_multiplier`; the traces match when the hit rate
//! strictly exceeds the configured threshold.

use crate::config::MotionConfig;
use crate::error::AuthError;
use crate::motion::{MotionPattern, PatternNormalizer};
use serde::{Deserialize, Serialize};

/// Per-comparison diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Sample pairs within tolerance
    pub hits: usize,
    /// Sample pairs compared
    pub compared: usize,
    /// `hits / compared`
    pub hit_rate: f64,
    pub matched: bool,
}

/// L1-threshold motion matcher
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityScorer {
    normalizer: PatternNormalizer,
    tolerance: f64,
    axis_multiplier: f64,
    hit_rate_threshold: f64,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::from_config(&MotionConfig::default())
    }
}

impl SimilarityScorer {
    pub fn from_config(config: &MotionConfig) -> Self {
        Self {
            normalizer: PatternNormalizer::from_config(config),
            tolerance: config.tolerance,
            axis_multiplier: config.axis_multiplier,
            hit_rate_threshold: config.hit_rate_threshold,
        }
    }

    /// Per-axis-group bound a sample pair must stay under
    pub fn sample_bound(&self) -> f64 {
        self.tolerance * self.axis_multiplier
    }

    /// Whether `candidate` matches `reference`
    pub fn score(
        &self,
        candidate: &MotionPattern,
        reference: &MotionPattern,
    ) -> Result<bool, AuthError> {
        Ok(self.compare(candidate, reference)?.matched)
    }

    /// Compare two traces and report the hit count.
    ///
    /// Both traces are normalized first; traces that already have the target
    /// length pass through unchanged. Fails with
    /// [`AuthError::InsufficientSamples`] if either raw trace is too short.
    pub fn compare(
        &self,
        candidate: &MotionPattern,
        reference: &MotionPattern,
    ) -> Result<MatchReport, AuthError> {
        let candidate = self.normalizer.normalize(candidate)?;
        let reference = self.normalizer.normalize(reference)?;

        let bound = self.sample_bound();
        let compared = candidate.len();
        let hits = candidate
            .samples()
            .iter()
            .zip(reference.samples())
            .filter(|(a, b)| {
                a.rotation.l1_distance(&b.rotation) < bound
                    && a.acceleration.l1_distance(&b.acceleration) < bound
            })
            .count();

        let hit_rate = if compared == 0 {
            0.0
        } else {
            hits as f64 / compared as f64
        };

        Ok(MatchReport {
            hits,
            compared,
            hit_rate,
            matched: hit_rate > self.hit_rate_threshold,
        })
    }
}
