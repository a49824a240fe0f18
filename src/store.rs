//! Enrolled-pattern persistence
//!
//! The engine keeps exactly one enrolled motion pattern per logical key. The
//! storage medium belongs to the host; the engine only talks to it through
//! [`PatternStore`].

use crate::error::AuthError;
use crate::motion::MotionPattern;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A motion pattern designated as ground truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolledPattern {
    pub id: Uuid,
    pub enrolled_at: DateTime<Utc>,
    pub pattern: MotionPattern,
}

impl EnrolledPattern {
    pub fn new(pattern: MotionPattern) -> Self {
        Self {
            id: Uuid::new_v4(),
            enrolled_at: Utc::now(),
            pattern,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, AuthError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Persistence collaborator for enrolled patterns.
///
/// A missing key is `Ok(None)`, never an error. Implementations report an
/// unreachable backend as [`AuthError::PersistenceUnavailable`].
pub trait PatternStore {
    fn load(&self, key: &str) -> Result<Option<EnrolledPattern>, AuthError>;

    /// Store `pattern` under `key`, replacing any previous one
    fn save(&mut self, key: &str, pattern: &EnrolledPattern) -> Result<(), AuthError>;

    /// Remove the pattern under `key`. Returns whether one existed.
    fn delete(&mut self, key: &str) -> Result<bool, AuthError>;
}

/// In-memory store, serializable for hand-off to the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryPatternStore {
    patterns: HashMap<String, EnrolledPattern>,
}

impl MemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load store contents from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize store contents to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl PatternStore for MemoryPatternStore {
    fn load(&self, key: &str) -> Result<Option<EnrolledPattern>, AuthError> {
        Ok(self.patterns.get(key).cloned())
    }

    fn save(&mut self, key: &str, pattern: &EnrolledPattern) -> Result<(), AuthError> {
        self.patterns.insert(key.to_string(), pattern.clone());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, AuthError> {
        Ok(self.patterns.remove(key).is_some())
    }
}

impl<S: PatternStore + ?Sized> PatternStore for Box<S> {
    fn load(&self, key: &str) -> Result<Option<EnrolledPattern>, AuthError> {
        (**self).load(key)
    }

    fn save(&mut self, key: &str, pattern: &EnrolledPattern) -> Result<(), AuthError> {
        (**self).save(key, pattern)
    }

    fn delete(&mut self, key: &str) -> Result<bool, AuthError> {
        (**self).delete(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Acceleration, MotionSample, Rotation};
    use pretty_assertions::assert_eq;

    fn enrolled(len: usize) -> EnrolledPattern {
        let samples = (0..len)
            .map(|i| {
                MotionSample::new(
                    i as u64 * 100,
                    Rotation::new(0.1, 0.2, 0.3),
                    Acceleration::default(),
                )
            })
            .collect();
        EnrolledPattern::new(MotionPattern::new(samples).unwrap())
    }

    #[test]
    fn test_missing_key_is_none() {
        let store = MemoryPatternStore::new();
        assert!(store.load("enrolledMotionPattern").unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites() {
        let mut store = MemoryPatternStore::new();
        store.save("k", &enrolled(5)).unwrap();
        let second = enrolled(8);
        store.save("k", &second).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.load("k").unwrap(), Some(second));
    }

    #[test]
    fn test_delete_reports_existence() {
        let mut store = MemoryPatternStore::new();
        store.save("k", &enrolled(5)).unwrap();
        assert!(store.delete("k").unwrap());
        assert!(!store.delete("k").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_serialization() {
        let mut store = MemoryPatternStore::new();
        let pattern = enrolled(6);
        store.save("k", &pattern).unwrap();

        let json = store.to_json().unwrap();
        let restored = MemoryPatternStore::from_json(&json).unwrap();
        assert_eq!(restored.load("k").unwrap(), Some(pattern));
    }
}
