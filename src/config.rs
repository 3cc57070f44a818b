//! Engine configuration
//!
//! Every struct here is `#[serde(default)]`, so a partial JSON object merges
//! over the defaults field by field.

use serde::{Deserialize, Serialize};

use crate::error::AffectError;

/// Upper bound on every millisecond setting (one week)
pub const MAX_DURATION_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Upper bound on confirmation counts
pub const MAX_CONSECUTIVE_COUNT: u32 = 1_000;

/// Top-level configuration for a [`FusionCombiner`](crate::fusion::FusionCombiner)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub behavior: BehaviorConfig,
    pub lexical: LexicalConfig,
    pub hysteresis: HysteresisConfig,
    pub fusion: FusionConfig,
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON config and validate it
    pub fn from_json(json: &str) -> Result<Self, AffectError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AffectError> {
        let behavior = &self.behavior;
        for (name, value) in [
            ("behavior.sample_interval_ms", behavior.sample_interval_ms),
            ("behavior.cleanup_interval_ms", behavior.cleanup_interval_ms),
            ("behavior.feature_window_ms", behavior.feature_window_ms),
            ("fusion.auto_analyze_interval_ms", self.fusion.auto_analyze_interval_ms),
        ] {
            if value == 0 {
                return Err(AffectError::InvalidConfig(format!("{name} must be > 0")));
            }
        }

        let hysteresis = &self.hysteresis;
        for (name, value) in [
            ("behavior.sample_interval_ms", behavior.sample_interval_ms),
            ("behavior.cleanup_interval_ms", behavior.cleanup_interval_ms),
            ("behavior.history_retention_ms", behavior.history_retention_ms),
            ("behavior.feature_window_ms", behavior.feature_window_ms),
            ("lexical.remote_timeout_ms", self.lexical.remote_timeout_ms),
            ("lexical.debounce_ms", self.lexical.debounce_ms),
            (
                "hysteresis.max_time_between_judgments_ms",
                hysteresis.max_time_between_judgments_ms,
            ),
            ("hysteresis.minimum_switch_interval_ms", hysteresis.minimum_switch_interval_ms),
            ("hysteresis.history_retention_ms", hysteresis.history_retention_ms),
            ("fusion.auto_analyze_interval_ms", self.fusion.auto_analyze_interval_ms),
        ] {
            if value > MAX_DURATION_MS {
                return Err(AffectError::InvalidConfig(format!(
                    "{name} must be <= {MAX_DURATION_MS}, got {value}"
                )));
            }
        }

        if behavior.max_history_len == 0 {
            return Err(AffectError::InvalidConfig(
                "behavior.max_history_len must be > 0".to_string(),
            ));
        }

        let min_confidence = hysteresis.min_confidence;
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(AffectError::InvalidConfig(format!(
                "hysteresis.min_confidence must be within [0, 1], got {min_confidence}"
            )));
        }

        if hysteresis.required_consecutive_count == 0 {
            return Err(AffectError::InvalidConfig(
                "hysteresis.required_consecutive_count must be > 0".to_string(),
            ));
        }
        for (name, value) in [
            ("hysteresis.required_consecutive_count", hysteresis.required_consecutive_count),
            ("hysteresis.opposite_extra_count", hysteresis.opposite_extra_count),
        ] {
            if value > MAX_CONSECUTIVE_COUNT {
                return Err(AffectError::InvalidConfig(format!(
                    "{name} must be <= {MAX_CONSECUTIVE_COUNT}, got {value}"
                )));
            }
        }

        let (bw, tw) = (self.fusion.behavior_weight, self.fusion.text_weight);
        if bw < 0.0 || tw < 0.0 || bw + tw <= 0.0 {
            return Err(AffectError::InvalidConfig(format!(
                "fusion weights must be non-negative with a positive sum, got {bw}/{tw}"
            )));
        }

        Ok(())
    }
}

/// Behavior capture and feature-window settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub track_pointer: bool,
    pub track_scroll: bool,
    pub track_clicks: bool,
    /// Keystroke capture is opt-in
    pub track_keyboard: bool,
    pub sample_interval_ms: u64,
    pub cleanup_interval_ms: u64,
    pub history_retention_ms: u64,
    /// Trailing window used by feature sampling
    pub feature_window_ms: u64,
    /// Upper bound on each event history; the oldest entries are dropped first
    pub max_history_len: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            track_pointer: true,
            track_scroll: true,
            track_clicks: true,
            track_keyboard: false,
            sample_interval_ms: 100,
            cleanup_interval_ms: 10_000,
            history_retention_ms: 60_000,
            feature_window_ms: 10_000,
            max_history_len: 10_000,
        }
    }
}

/// Language selection for lexical analysis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageSetting {
    #[default]
    Auto,
    Ko,
    En,
}

/// Lexical scorer and remote classifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalConfig {
    /// Remote classifier endpoint; remote classification is attempted only when set
    pub endpoint: Option<String>,
    /// Bearer credential for the remote classifier
    pub api_key: Option<String>,
    pub language: LanguageSetting,
    pub use_local_analysis: bool,
    pub remote_timeout_ms: u64,
    /// Quiet period of the streaming analyzer
    pub debounce_ms: u64,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            language: LanguageSetting::Auto,
            use_local_analysis: true,
            remote_timeout_ms: 3_000,
            debounce_ms: 500,
        }
    }
}

/// Hysteresis gate thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HysteresisConfig {
    pub required_consecutive_count: u32,
    pub max_time_between_judgments_ms: u64,
    pub min_confidence: f64,
    pub minimum_switch_interval_ms: u64,
    pub history_retention_ms: u64,
    /// Extra confirmations required to switch between opposite labels
    pub opposite_extra_count: u32,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            required_consecutive_count: 3,
            max_time_between_judgments_ms: 10_000,
            min_confidence: 0.7,
            minimum_switch_interval_ms: 5_000,
            history_retention_ms: 300_000,
            opposite_extra_count: 2,
        }
    }
}

/// Fusion weights and scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub behavior_weight: f64,
    pub text_weight: f64,
    pub use_hysteresis: bool,
    pub auto_analyze_interval_ms: u64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            behavior_weight: 0.4,
            text_weight: 0.6,
            use_hysteresis: true,
            auto_analyze_interval_ms: 5_000,
        }
    }
}

impl FusionConfig {
    /// Rescale the weights so they sum to 1 (no-op when the sum is 0 or already 1)
    pub fn normalize_weights(&mut self) {
        let total = self.behavior_weight + self.text_weight;
        if total > 0.0 && (total - 1.0).abs() > f64::EPSILON {
            self.behavior_weight /= total;
            self.text_weight /= total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_merges_over_defaults() {
        let config = EngineConfig::from_json(
            r#"{ "hysteresis": { "min_confidence": 0.6 }, "lexical": { "language": "ko" } }"#,
        )
        .unwrap();

        assert_eq!(config.hysteresis.min_confidence, 0.6);
        assert_eq!(config.hysteresis.required_consecutive_count, 3);
        assert_eq!(config.lexical.language, LanguageSetting::Ko);
        assert_eq!(config.lexical.debounce_ms, 500);
        assert_eq!(config.behavior, BehaviorConfig::default());
        assert_eq!(config.fusion, FusionConfig::default());
    }

    #[test]
    fn test_empty_object_is_default() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let result =
            EngineConfig::from_json(r#"{ "fusion": { "behavior_weight": 0, "text_weight": 0 } }"#);
        assert!(matches!(result, Err(AffectError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_min_confidence_rejected() {
        let result = EngineConfig::from_json(r#"{ "hysteresis": { "min_confidence": 1.5 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_oversized_durations_rejected() {
        for json in [
            r#"{ "behavior": { "history_retention_ms": 9000000000000000000 } }"#,
            r#"{ "behavior": { "feature_window_ms": 18446744073709551615 } }"#,
            r#"{ "hysteresis": { "max_time_between_judgments_ms": 18446744073709551615 } }"#,
            r#"{ "hysteresis": { "history_retention_ms": 604800001 } }"#,
            r#"{ "lexical": { "debounce_ms": 18446744073709551615 } }"#,
        ] {
            let result = EngineConfig::from_json(json);
            assert!(matches!(result, Err(AffectError::InvalidConfig(_))), "{json}");
        }

        let at_limit =
            format!(r#"{{ "behavior": {{ "history_retention_ms": {MAX_DURATION_MS} }} }}"#);
        assert!(EngineConfig::from_json(&at_limit).is_ok());
    }

    #[test]
    fn test_oversized_counts_rejected() {
        let json = r#"{ "hysteresis": { "required_consecutive_count": 4294967295 } }"#;
        let result = EngineConfig::from_json(json);
        assert!(matches!(result, Err(AffectError::InvalidConfig(_))));

        let json = r#"{ "hysteresis": { "opposite_extra_count": 1001 } }"#;
        let result = EngineConfig::from_json(json);
        assert!(matches!(result, Err(AffectError::InvalidConfig(_))));
    }

    #[test]
    fn test_normalize_weights() {
        let mut fusion = FusionConfig {
            behavior_weight: 1.0,
            text_weight: 3.0,
            ..FusionConfig::default()
        };
        fusion.normalize_weights();
        assert!((fusion.behavior_weight - 0.25).abs() < 1e-9);
        assert!((fusion.text_weight - 0.75).abs() < 1e-9);
    }
}
