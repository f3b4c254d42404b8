//! Session configuration.

use crate::geometry::Calibration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Conversion factor must be finite and positive, got {0}")]
    InvalidConversionFactor(f64),
    #[error("Measurement color must not be empty")]
    EmptyColor,
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What `reset` purges from the durable store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetScope {
    /// Only rows of the image currently loaded.
    #[default]
    CurrentImage,
    /// Every stored row, for every image.
    AllImages,
}

/// Session-wide settings, supplied by the embedding viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pixels * factor = displayed distance.
    pub conversion_factor: f64,
    /// Unit label attached to distances.
    pub units: String,
    /// Initial measurement color; replaced by the stored color on load.
    pub measurement_color: String,
    /// Prefix for generated names ("M" gives M1, M2, ...).
    pub name_prefix: String,
    pub reset_scope: ResetScope,
    /// Image-space padding around each measurement's hit box.
    pub hit_tolerance: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            conversion_factor: 1.0,
            units: "px".to_string(),
            measurement_color: "#000000".to_string(),
            name_prefix: "M".to_string(),
            reset_scope: ResetScope::CurrentImage,
            hit_tolerance: 0.0,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.conversion_factor.is_finite() || self.conversion_factor <= 0.0 {
            return Err(ConfigError::InvalidConversionFactor(self.conversion_factor));
        }
        if self.measurement_color.trim().is_empty() {
            return Err(ConfigError::EmptyColor);
        }
        Ok(())
    }

    pub fn calibration(&self) -> Calibration {
        Calibration {
            conversion_factor: self.conversion_factor,
            units: self.units.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.units, "px");
        assert_eq!(config.measurement_color, "#000000");
        assert_eq!(config.reset_scope, ResetScope::CurrentImage);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = SessionConfig::from_json(r#"{"conversion_factor": 0.25, "units": "um"}"#).unwrap();
        assert!((config.conversion_factor - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.units, "um");
        assert_eq!(config.name_prefix, "M");
    }

    #[test]
    fn test_reset_scope_snake_case() {
        let config = SessionConfig::from_json(r#"{"reset_scope": "all_images"}"#).unwrap();
        assert_eq!(config.reset_scope, ResetScope::AllImages);
    }

    #[test]
    fn test_rejects_bad_factor() {
        let result = SessionConfig::from_json(r#"{"conversion_factor": 0}"#);
        assert!(matches!(result, Err(ConfigError::InvalidConversionFactor(_))));
    }

    #[test]
    fn test_rejects_empty_color() {
        let result = SessionConfig::from_json(r#"{"measurement_color": "  "}"#);
        assert!(matches!(result, Err(ConfigError::EmptyColor)));
    }
}
