//! Motion enrollment and verification
//!
//! [`MotionAuthenticator`] ties the scorer to the pattern store: it enrolls a
//! reference trace, verifies live traces against it and degrades gracefully
//! when the store cannot be reached.

use crate::config::MotionConfig;
use crate::error::AuthError;
use crate::motion::{MotionPattern, PatternNormalizer};
use crate::scorer::{MatchReport, SimilarityScorer};
use crate::store::{EnrolledPattern, PatternStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Result of checking a live trace against the enrolled pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MotionCheck {
    Matched { report: MatchReport },
    Mismatched { report: MatchReport },
    /// No pattern is enrolled, or the store could not be read
    NotEnrolled,
    /// One of the traces is too short to compare
    InsufficientSamples { got: usize, required: usize },
}

impl MotionCheck {
    pub fn is_match(&self) -> bool {
        matches!(self, MotionCheck::Matched { .. })
    }
}

/// Enrolls and verifies motion gestures against a [`PatternStore`]
#[derive(Debug)]
pub struct MotionAuthenticator<S: PatternStore> {
    config: MotionConfig,
    scorer: SimilarityScorer,
    normalizer: PatternNormalizer,
    store: S,
}

impl<S: PatternStore> MotionAuthenticator<S> {
    pub fn new(config: MotionConfig, store: S) -> Self {
        Self {
            scorer: SimilarityScorer::from_config(&config),
            normalizer: PatternNormalizer::from_config(&config),
            config,
            store,
        }
    }

    /// Startup housekeeping: drops a stale enrolled pattern when configured to
    pub fn initialize(&mut self) -> Result<(), AuthError> {
        if self.config.clear_on_start {
            let removed = self.store.delete(&self.config.storage_key)?;
            if removed {
                info!("stored motion pattern cleared on start");
            }
        }
        Ok(())
    }

    /// Store `pattern` as the new ground truth, replacing any previous one.
    ///
    /// Traces too short to ever match are refused. A store failure blocks
    /// enrollment and is returned to the caller.
    pub fn enroll(&mut self, pattern: MotionPattern) -> Result<EnrolledPattern, AuthError> {
        self.normalizer.check_length(&pattern)?;

        let enrolled = EnrolledPattern::new(pattern);
        self.store.save(&self.config.storage_key, &enrolled)?;
        info!(
            pattern_id = %enrolled.id,
            samples = enrolled.pattern.len(),
            "motion pattern enrolled"
        );
        Ok(enrolled)
    }

    /// The active enrolled pattern.
    ///
    /// An unreachable store reads as "nothing enrolled".
    pub fn enrolled(&self) -> Option<EnrolledPattern> {
        match self.store.load(&self.config.storage_key) {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!(error = %e, "pattern store unavailable, treating as not enrolled");
                None
            }
        }
    }

    pub fn is_enrolled(&self) -> bool {
        self.enrolled().is_some()
    }

    /// Compare a live trace with the enrolled pattern
    pub fn verify(&self, live: &MotionPattern) -> MotionCheck {
        let Some(enrolled) = self.enrolled() else {
            return MotionCheck::NotEnrolled;
        };

        let check = match self.scorer.compare(live, &enrolled.pattern) {
            Ok(report) if report.matched => MotionCheck::Matched { report },
            Ok(report) => MotionCheck::Mismatched { report },
            Err(AuthError::InsufficientSamples { got, required }) => {
                MotionCheck::InsufficientSamples { got, required }
            }
            Err(e) => {
                warn!(error = %e, "motion comparison failed");
                MotionCheck::InsufficientSamples {
                    got: live.len(),
                    required: self.normalizer.min_samples(),
                }
            }
        };

        info!(
            matched = check.is_match(),
            live_samples = live.len(),
            "motion pattern verified"
        );
        check
    }

    /// Remove the enrolled pattern
    pub fn clear(&mut self) -> Result<bool, AuthError> {
        self.store.delete(&self.config.storage_key)
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Millis;
    use crate::store::MemoryPatternStore;
    use crate::types::{Acceleration, MotionSample, Rotation};
    use pretty_assertions::assert_eq;

    /// Store whose backend is never reachable
    struct OfflineStore;

    impl PatternStore for OfflineStore {
        fn load(&self, _key: &str) -> Result<Option<EnrolledPattern>, AuthError> {
            Err(AuthError::PersistenceUnavailable("offline".to_string()))
        }

        fn save(&mut self, _key: &str, _pattern: &EnrolledPattern) -> Result<(), AuthError> {
            Err(AuthError::PersistenceUnavailable("offline".to_string()))
        }

        fn delete(&mut self, _key: &str) -> Result<bool, AuthError> {
            Err(AuthError::PersistenceUnavailable("offline".to_string()))
        }
    }

    fn gesture(len: usize, amplitude: f64) -> MotionPattern {
        MotionPattern::new(
            (0..len)
                .map(|i| {
                    let x = (i as f64 / 4.0).sin() * amplitude;
                    MotionSample::new(
                        i as Millis * 100,
                        Rotation::new(x, 0.0, x / 2.0),
                        Acceleration::new(0.0, x, 0.0),
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    fn authenticator() -> MotionAuthenticator<MemoryPatternStore> {
        MotionAuthenticator::new(MotionConfig::default(), MemoryPatternStore::new())
    }

    #[test]
    fn test_verify_without_enrollment() {
        let auth = authenticator();
        assert!(!auth.is_enrolled());
        assert_eq!(auth.verify(&gesture(30, 1.0)), MotionCheck::NotEnrolled);
    }

    #[test]
    fn test_enroll_then_verify_same_gesture() {
        let mut auth = authenticator();
        auth.enroll(gesture(30, 1.0)).unwrap();

        let check = auth.verify(&gesture(28, 1.0));
        assert!(check.is_match(), "{check:?}");
    }

    #[test]
    fn test_verify_different_gesture() {
        let mut auth = authenticator();
        auth.enroll(gesture(30, 1.0)).unwrap();

        let check = auth.verify(&gesture(30, 4.0));
        assert!(matches!(check, MotionCheck::Mismatched { .. }));
    }

    #[test]
    fn test_short_live_trace_is_non_match() {
        let mut auth = authenticator();
        auth.enroll(gesture(30, 1.0)).unwrap();

        assert_eq!(
            auth.verify(&gesture(3, 1.0)),
            MotionCheck::InsufficientSamples { got: 3, required: 5 }
        );
    }

    #[test]
    fn test_short_enrollment_refused() {
        let mut auth = authenticator();
        let result = auth.enroll(gesture(2, 1.0));
        assert!(matches!(
            result,
            Err(AuthError::InsufficientSamples { got: 2, required: 5 })
        ));
        assert!(!auth.is_enrolled());
    }

    #[test]
    fn test_reenrollment_replaces_pattern() {
        let mut auth = authenticator();
        let first = auth.enroll(gesture(30, 1.0)).unwrap();
        let second = auth.enroll(gesture(30, 4.0)).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(auth.enrolled().unwrap().id, second.id);
        assert_eq!(auth.store().len(), 1);
        assert!(auth.verify(&gesture(30, 4.0)).is_match());
    }

    #[test]
    fn test_initialize_clears_when_configured() {
        let mut auth = authenticator();
        auth.enroll(gesture(10, 1.0)).unwrap();
        auth.initialize().unwrap();
        assert!(!auth.is_enrolled());

        let config = MotionConfig {
            clear_on_start: false,
            ..MotionConfig::default()
        };
        let mut auth = MotionAuthenticator::new(config, MemoryPatternStore::new());
        auth.enroll(gesture(10, 1.0)).unwrap();
        auth.initialize().unwrap();
        assert!(auth.is_enrolled());
    }

    #[test]
    fn test_offline_store_degrades_verification_and_blocks_enrollment() {
        let mut auth = MotionAuthenticator::new(MotionConfig::default(), OfflineStore);
        assert_eq!(auth.verify(&gesture(30, 1.0)), MotionCheck::NotEnrolled);
        assert!(matches!(
            auth.enroll(gesture(30, 1.0)),
            Err(AuthError::PersistenceUnavailable(_))
        ));
    }
}
