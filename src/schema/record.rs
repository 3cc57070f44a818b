//! affect.input.v1 record definition
//!
//! One record per line. Every record carries an RFC3339 `timestamp` and a
//! `type` tag; the remaining fields depend on the type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::behavior::{BehaviorEvent, InputField};
use crate::types::EmotionLabel;

/// Current schema version
pub const SCHEMA_VERSION: &str = "affect.input.v1";

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// A single input record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Defaults to the current version when omitted
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: InputPayload,
}

/// Record payload, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputPayload {
    PointerMove {
        x: f64,
        y: f64,
    },
    Scroll {
        y: f64,
    },
    Click {
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Keystroke {
        key: String,
        /// Field that received the key; sensitive fields are never captured
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<InputField>,
    },
    /// Free text fed to the lexical extractor
    Text {
        text: String,
    },
    Manual {
        label: EmotionLabel,
    },
    ClearManual,
    /// Advances the clock without any other input
    Tick,
}

impl InputRecord {
    pub fn new(timestamp: DateTime<Utc>, payload: InputPayload) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp,
            payload,
        }
    }

    /// The behavior event carried by this record, if any.
    ///
    /// Keystrokes are excluded; they go through field-aware capture.
    pub fn behavior_event(&self) -> Option<BehaviorEvent> {
        let timestamp = self.timestamp;
        match &self.payload {
            InputPayload::PointerMove { x, y } => Some(BehaviorEvent::PointerMove {
                x: *x,
                y: *y,
                timestamp,
            }),
            InputPayload::Scroll { y } => Some(BehaviorEvent::Scroll { y: *y, timestamp }),
            InputPayload::Click { x, y, target } => Some(BehaviorEvent::Click {
                x: *x,
                y: *y,
                timestamp,
                target: target.clone(),
            }),
            _ => None,
        }
    }

    /// Validate the record
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        match &self.payload {
            InputPayload::PointerMove { x, y } | InputPayload::Click { x, y, .. } => {
                check_finite("x", *x)?;
                check_finite("y", *y)
            }
            InputPayload::Scroll { y } => check_finite("y", *y),
            InputPayload::Keystroke { key, .. } if key.is_empty() => Err(ValidationError::EmptyKey),
            _ => Ok(()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.payload {
            InputPayload::PointerMove { .. } => "pointer_move",
            InputPayload::Scroll { .. } => "scroll",
            InputPayload::Click { .. } => "click",
            InputPayload::Keystroke { .. } => "keystroke",
            InputPayload::Text { .. } => "text",
            InputPayload::Manual { .. } => "manual",
            InputPayload::ClearManual => "clear_manual",
            InputPayload::Tick => "tick",
        }
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFiniteCoordinate { field })
    }
}

/// Validation errors for input records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Coordinate {field} is not a finite number")]
    NonFiniteCoordinate { field: &'static str },

    #[error("Keystroke record has an empty key")]
    EmptyKey,
}
