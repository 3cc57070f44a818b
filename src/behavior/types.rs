//! Behavioral data types
//!
//! This module defines the interaction events captured from the pointer,
//! scroll, click and keyboard sources, and the features and inference derived
//! from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::EmotionLabel;

/// A raw interaction event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BehaviorEvent {
    PointerMove {
        x: f64,
        y: f64,
        timestamp: DateTime<Utc>,
    },
    Scroll {
        /// Vertical scroll offset in pixels
        y: f64,
        timestamp: DateTime<Utc>,
    },
    Click {
        x: f64,
        y: f64,
        timestamp: DateTime<Utc>,
        /// Kind of element clicked (e.g. "BUTTON"), if known
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Keystroke {
        /// Masked key; single-character keys are stored as `*`
        key: String,
        timestamp: DateTime<Utc>,
    },
}

impl BehaviorEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            BehaviorEvent::PointerMove { timestamp, .. }
            | BehaviorEvent::Scroll { timestamp, .. }
            | BehaviorEvent::Click { timestamp, .. }
            | BehaviorEvent::Keystroke { timestamp, .. } => *timestamp,
        }
    }
}

/// Anything stored in a time-ordered history
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Pointer position sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerSample {
    pub x: f64,
    pub y: f64,
    pub timestamp: DateTime<Utc>,
}

/// Scroll offset sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollSample {
    pub y: f64,
    pub timestamp: DateTime<Utc>,
}

/// Click sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickSample {
    pub x: f64,
    pub y: f64,
    pub timestamp: DateTime<Utc>,
    pub target: String,
}

/// Masked keystroke sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeystrokeSample {
    pub key: String,
    pub timestamp: DateTime<Utc>,
}

macro_rules! impl_timestamped {
    ($($ty:ty),*) => {
        $(impl Timestamped for $ty {
            fn timestamp(&self) -> DateTime<Utc> {
                self.timestamp
            }
        })*
    };
}

impl_timestamped!(PointerSample, ScrollSample, ClickSample, KeystrokeSample);

/// Description of the input field that received a keystroke
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputField {
    /// Field type, e.g. "password" or "text"
    #[serde(default)]
    pub field_type: Option<String>,
    /// Field name attribute
    #[serde(default)]
    pub name: Option<String>,
}

/// Substrings that mark a field as sensitive
const SENSITIVE_FIELD_MARKERS: [&str; 4] = ["password", "credit", "card", "cvv"];

impl InputField {
    /// True for password and payment-card style fields, whose keystrokes are never captured
    pub fn is_sensitive(&self) -> bool {
        [&self.field_type, &self.name]
            .into_iter()
            .flatten()
            .map(|value| value.to_lowercase())
            .any(|value| SENSITIVE_FIELD_MARKERS.iter().any(|m| value.contains(m)))
    }
}

/// Rolling behavioral features, recomputed on each sampling tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorFeatures {
    /// Pointer speed in px/s over the trailing window
    pub pointer_speed: f64,
    /// Scroll speed in px/s over the trailing window
    pub scroll_speed: f64,
    /// Clicks per minute over the trailing window
    pub click_frequency: f64,
    /// Milliseconds since the earliest retained event of any kind
    pub dwell_time_ms: f64,
    /// Milliseconds since the most recent click
    pub hesitation_time_ms: f64,
}

/// Behavior-only emotion estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorInference {
    pub label: EmotionLabel,
    pub confidence: f64,
    /// Human-readable explanation of each triggered rule
    pub reasons: Vec<String>,
}

impl BehaviorInference {
    pub fn neutral() -> Self {
        Self {
            label: EmotionLabel::Neutral,
            confidence: 0.5,
            reasons: Vec::new(),
        }
    }
}

/// Copy of the four event histories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSnapshot {
    pub pointer: Vec<PointerSample>,
    pub scroll: Vec<ScrollSample>,
    pub clicks: Vec<ClickSample>,
    pub keystrokes: Vec<KeystrokeSample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_behavior_event_deserialization() {
        let json = r#"{
            "type": "click",
            "x": 10.0,
            "y": 20.5,
            "timestamp": "2024-01-15T14:05:00Z",
            "target": "BUTTON"
        }"#;

        let event: BehaviorEvent = serde_json::from_str(json).unwrap();
        match event {
            BehaviorEvent::Click { x, target, .. } => {
                assert_eq!(x, 10.0);
                assert_eq!(target.as_deref(), Some("BUTTON"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_pointer_move_tag() {
        let json =
            r#"{ "type": "pointer_move", "x": 1, "y": 2, "timestamp": "2024-01-15T14:05:00Z" }"#;
        let event: BehaviorEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, BehaviorEvent::PointerMove { .. }));
    }

    #[test]
    fn test_sensitive_fields() {
        let password = InputField {
            field_type: Some("password".to_string()),
            name: None,
        };
        let card = InputField {
            field_type: Some("text".to_string()),
            name: Some("Credit-Card-Number".to_string()),
        };
        let cvv = InputField {
            field_type: None,
            name: Some("cvv2".to_string()),
        };
        let search = InputField {
            field_type: Some("search".to_string()),
            name: Some("q".to_string()),
        };

        assert!(password.is_sensitive());
        assert!(card.is_sensitive());
        assert!(cvv.is_sensitive());
        assert!(!search.is_sensitive());
        assert!(!InputField::default().is_sensitive());
    }
}
