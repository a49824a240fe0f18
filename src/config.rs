//! Engine configuration
//!
//! Every threshold used by the extractor, scorer and decision policy lives here.
//! Defaults reproduce the reference lock screen: a six digit code, 60×60 keys
//! with a 20 px center tolerance, and motion traces resampled to 30 points
//! compared with a 0.3 tolerance and a 70% hit-rate cutoff.

use crate::clock::Millis;
use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// PIN entry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    /// Number of digits that completes an attempt
    pub code_length: usize,
    /// Enrolled secret digit sequence
    pub secret: String,
    /// Exact number of backspace corrections required, if any
    pub required_backspaces: Option<u32>,
    /// An attempt left open longer than this is sealed and rejected
    pub attempt_timeout_ms: Millis,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            secret: "111111".to_string(),
            required_backspaces: None,
            attempt_timeout_ms: 60_000,
        }
    }
}

/// Key geometry used for touch-side classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchConfig {
    pub button_width: f64,
    pub button_height: f64,
    /// Half-width of the center band on each axis
    pub tolerance: f64,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            button_width: 60.0,
            button_height: 60.0,
            tolerance: 20.0,
        }
    }
}

/// Motion-gesture capture and matching settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Require a motion match for acceptance
    pub enabled: bool,
    /// Samples per pattern after resampling
    pub target_length: usize,
    /// Per-axis tolerance
    pub tolerance: f64,
    /// Per-sample bound is `tolerance * axis_multiplier` for each axis group
    pub axis_multiplier: f64,
    /// Fraction of hits that must be strictly exceeded for a match
    pub hit_rate_threshold: f64,
    /// Traces shorter than this never match
    pub min_samples: usize,
    /// Sensor update interval
    pub sample_interval_ms: Millis,
    /// Length of a recording window
    pub window_ms: Millis,
    /// Delay between a recording request and the window opening
    pub countdown_ms: Millis,
    /// Logical key of the enrolled pattern in the store
    pub storage_key: String,
    /// Drop any stored pattern when the authenticator starts
    pub clear_on_start: bool,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_length: 30,
            tolerance: 0.3,
            axis_multiplier: 3.0,
            hit_rate_threshold: 0.7,
            min_samples: 5,
            sample_interval_ms: 100,
            window_ms: 3_000,
            countdown_ms: 3_000,
            storage_key: "enrolledMotionPattern".to_string(),
            clear_on_start: true,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pin: PinConfig,
    pub touch: TouchConfig,
    pub motion: MotionConfig,
}

impl EngineConfig {
    /// Parse a TOML document. Missing sections fall back to defaults.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, AuthError> {
        let config: EngineConfig = toml::from_str(toml_str)
            .map_err(|e| AuthError::InvalidConfig(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document. Missing sections fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self, AuthError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, choosing the format by extension (`.json`, otherwise TOML)
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AuthError::InvalidConfig(format!("Cannot read {}: {}", path.display(), e))
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_toml_str(&contents),
        }
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, AuthError> {
        toml::to_string_pretty(self)
            .map_err(|e| AuthError::InvalidConfig(format!("Failed to render TOML: {}", e)))
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), AuthError> {
        let pin = &self.pin;
        if pin.code_length == 0 {
            return Err(invalid("pin.code_length must be at least 1"));
        }
        if pin.secret.is_empty() || !pin.secret.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("pin.secret must be a non-empty string of digits"));
        }
        if pin.secret.chars().count() != pin.code_length {
            return Err(invalid(&format!(
                "pin.secret has {} digits but pin.code_length is {}",
                pin.secret.chars().count(),
                pin.code_length
            )));
        }
        if pin.attempt_timeout_ms == 0 {
            return Err(invalid("pin.attempt_timeout_ms must be positive"));
        }

        let touch = &self.touch;
        if !(touch.button_width > 0.0 && touch.button_height > 0.0) {
            return Err(invalid("touch button dimensions must be positive"));
        }
        if !(touch.tolerance >= 0.0 && touch.tolerance.is_finite()) {
            return Err(invalid("touch.tolerance must be a finite non-negative number"));
        }

        let motion = &self.motion;
        if motion.target_length == 0 {
            return Err(invalid("motion.target_length must be at least 1"));
        }
        if motion.min_samples == 0 {
            return Err(invalid("motion.min_samples must be at least 1"));
        }
        if !(motion.tolerance > 0.0 && motion.tolerance.is_finite()) {
            return Err(invalid("motion.tolerance must be a finite positive number"));
        }
        if !(motion.axis_multiplier > 0.0 && motion.axis_multiplier.is_finite()) {
            return Err(invalid("motion.axis_multiplier must be a finite positive number"));
        }
        if !(0.0..1.0).contains(&motion.hit_rate_threshold) {
            return Err(invalid("motion.hit_rate_threshold must be in [0, 1)"));
        }
        if motion.sample_interval_ms == 0 || motion.window_ms == 0 {
            return Err(invalid("motion sample interval and window must be positive"));
        }
        if motion.storage_key.is_empty() {
            return Err(invalid("motion.storage_key must not be empty"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> AuthError {
    AuthError::InvalidConfig(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pin.code_length, 6);
        assert_eq!(config.motion.target_length, 30);
        assert_eq!(config.motion.tolerance, 0.3);
        assert_eq!(config.motion.hit_rate_threshold, 0.7);
        assert_eq!(config.touch.tolerance, 20.0);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [pin]
            secret = "1234"
            code_length = 4
            required_backspaces = 3

            [motion]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.pin.secret, "1234");
        assert_eq!(config.pin.required_backspaces, Some(3));
        assert!(config.motion.enabled);
        assert_eq!(config.motion.min_samples, 5);
        assert_eq!(config.touch, TouchConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::default();
        let rendered = config.to_toml_string().unwrap();
        let parsed = EngineConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_json_config() {
        let config =
            EngineConfig::from_json_str(r#"{"motion": {"tolerance": 0.5, "enabled": true}}"#)
                .unwrap();
        assert_eq!(config.motion.tolerance, 0.5);
        assert_eq!(config.pin.secret, "111111");
    }

    #[test]
    fn test_secret_length_mismatch_rejected() {
        let mut config = EngineConfig::default();
        config.pin.secret = "1234".to_string();
        assert!(matches!(
            config.validate(),
            Err(AuthError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_non_digit_secret_rejected() {
        let mut config = EngineConfig::default();
        config.pin.secret = "12a456".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_motion_thresholds_rejected() {
        let mut config = EngineConfig::default();
        config.motion.hit_rate_threshold = 1.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.motion.tolerance = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.motion.target_length = 0;
        assert!(config.validate().is_err());
    }
}
