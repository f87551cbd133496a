//! Runtime configuration for pose application.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{json_kind, PoseError};

/// Timing and tolerance settings for a [`crate::RigController`].
/// Every field has a default, so partial JSON objects are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Duration for bones named in the incoming pose.
    pub transition_duration_ms: f64,
    /// Duration for bones absent from the pose relaxing back to rest.
    pub reset_duration_ms: f64,
    /// Tolerance (radians / rig units) under which an exported bone counts as rest.
    pub rest_epsilon: f32,
    /// Morph weights at or below this are omitted on export.
    pub morph_epsilon: f32,
    /// Maximum events retained per tick; extra events are dropped.
    pub max_events_per_tick: usize,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            transition_duration_ms: 1000.0,
            reset_duration_ms: 300.0,
            rest_epsilon: 1.0e-4,
            morph_epsilon: 1.0e-6,
            max_events_per_tick: 1024,
        }
    }
}

impl PoseConfig {
    pub fn validate(&self) -> Result<(), PoseError> {
        for (name, v) in [
            ("transition_duration_ms", self.transition_duration_ms),
            ("reset_duration_ms", self.reset_duration_ms),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(PoseError::InvalidConfig(format!(
                    "{name} must be finite and >= 0, got {v}"
                )));
            }
        }
        for (name, v) in [
            ("rest_epsilon", self.rest_epsilon),
            ("morph_epsilon", self.morph_epsilon),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(PoseError::InvalidConfig(format!(
                    "{name} must be finite and >= 0, got {v}"
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON config object.
    pub fn from_json_str(s: &str) -> Result<Self, PoseError> {
        let value: JsonValue =
            serde_json::from_str(s).map_err(|e| PoseError::InvalidConfig(e.to_string()))?;
        Self::from_json_value(&value)
    }

    /// Only objects are accepted; serde's positional form for arrays is refused.
    pub fn from_json_value(value: &JsonValue) -> Result<Self, PoseError> {
        if !value.is_object() {
            return Err(PoseError::InvalidConfig(format!(
                "expected an object, got {}",
                json_kind(value)
            )));
        }
        let cfg =
            PoseConfig::deserialize(value).map_err(|e| PoseError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[inline]
    pub fn with_transition_ms(mut self, ms: f64) -> Self {
        self.transition_duration_ms = ms;
        self
    }

    #[inline]
    pub fn with_reset_ms(mut self, ms: f64) -> Self {
        self.reset_duration_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = PoseConfig::from_json_str(r#"{ "transition_duration_ms": 500 }"#).unwrap();
        assert_eq!(cfg.transition_duration_ms, 500.0);
        assert_eq!(cfg.reset_duration_ms, 300.0);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let err = PoseConfig::default().with_reset_ms(-1.0).validate();
        assert!(matches!(err, Err(PoseError::InvalidConfig(_))));
        assert!(PoseConfig::from_json_str("[1]").is_err());
    }

    #[test]
    fn only_objects_are_accepted() {
        for raw in ["[1]", "[1000, 300, 0.0001, 0.000001, 8]", "5", "\"fast\"", "null"] {
            let err = PoseConfig::from_json_str(raw);
            assert!(matches!(err, Err(PoseError::InvalidConfig(_))), "{raw}");
        }
        let cfg = PoseConfig::from_json_value(&serde_json::json!({})).unwrap();
        assert_eq!(cfg, PoseConfig::default());
        let err = PoseConfig::from_json_value(&serde_json::json!({ "reset_duration_ms": "x" }));
        assert!(err.is_err());
    }
}
