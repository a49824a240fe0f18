//! Error types for Biolock

use thiserror::Error;

/// Errors that can occur while capturing or verifying behavioral signals
#[derive(Debug, Error)]
pub enum AuthError {
    /// The recorder was used while no attempt was open. This is an
    /// integration bug; the offending event has been discarded.
    #[error("No active attempt: event discarded")]
    NoActiveAttempt,

    /// The attempt has already been sealed and accepts no further input
    #[error("Attempt already sealed")]
    AttemptSealed,

    /// Motion trace is too short to be compared
    #[error("Insufficient motion samples: got {got}, need at least {required}")]
    InsufficientSamples { got: usize, required: usize },

    /// A motion recording window is already open
    #[error("A motion recording is already in progress")]
    RecordingInProgress,

    /// Motion samples were delivered with no recording window open
    #[error("No motion recording in progress")]
    NoActiveRecording,

    /// The enrolled-pattern store could not be reached
    #[error("Pattern store unavailable: {0}")]
    PersistenceUnavailable(String),

    /// Motion samples were not ordered by capture time
    #[error("Motion sample {index} has a timestamp earlier than its predecessor")]
    NonMonotonicTimestamps { index: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Export error: {0}")]
    ExportError(String),
}

impl AuthError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::NoActiveAttempt => "NO_ACTIVE_ATTEMPT",
            AuthError::AttemptSealed => "ATTEMPT_SEALED",
            AuthError::InsufficientSamples { .. } => "INSUFFICIENT_SAMPLES",
            AuthError::RecordingInProgress => "RECORDING_IN_PROGRESS",
            AuthError::NoActiveRecording => "NO_ACTIVE_RECORDING",
            AuthError::PersistenceUnavailable(_) => "PERSISTENCE_UNAVAILABLE",
            AuthError::NonMonotonicTimestamps { .. } => "NON_MONOTONIC_TIMESTAMPS",
            AuthError::InvalidConfig(_) => "INVALID_CONFIG",
            AuthError::ParseError(_) => "PARSE_ERROR",
            AuthError::JsonError(_) => "JSON_ERROR",
            AuthError::ExportError(_) => "EXPORT_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_samples_message() {
        let err = AuthError::InsufficientSamples { got: 3, required: 5 };
        assert_eq!(
            err.to_string(),
            "Insufficient motion samples: got 3, need at least 5"
        );
        assert_eq!(err.code(), "INSUFFICIENT_SAMPLES");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{oops");
        let err: AuthError = parse.unwrap_err().into();
        assert_eq!(err.code(), "JSON_ERROR");
    }
}
