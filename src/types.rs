//! Core data types
//!
//! This module defines the closed emotion label set and the estimate types that
//! flow between the extractors, the fusion combiner and the hysteresis gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AffectError;

/// The closed set of emotion tags.
///
/// Declaration order is the tie-break priority used by every argmax in the
/// crate: when two labels score equally, the one declared first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Neutral,
    Happy,
    Excited,
    Stressed,
    Anxious,
    Sad,
    Anger,
    Fear,
    Surprise,
    Meditation,
    Fatigue,
    Depression,
}

impl EmotionLabel {
    /// All labels in priority order
    pub const ALL: [EmotionLabel; 12] = [
        EmotionLabel::Neutral,
        EmotionLabel::Happy,
        EmotionLabel::Excited,
        EmotionLabel::Stressed,
        EmotionLabel::Anxious,
        EmotionLabel::Sad,
        EmotionLabel::Anger,
        EmotionLabel::Fear,
        EmotionLabel::Surprise,
        EmotionLabel::Meditation,
        EmotionLabel::Fatigue,
        EmotionLabel::Depression,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Neutral => "neutral",
            EmotionLabel::Happy => "happy",
            EmotionLabel::Excited => "excited",
            EmotionLabel::Stressed => "stressed",
            EmotionLabel::Anxious => "anxious",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Anger => "anger",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Meditation => "meditation",
            EmotionLabel::Fatigue => "fatigue",
            EmotionLabel::Depression => "depression",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = AffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        EmotionLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == needle)
            .ok_or_else(|| AffectError::UnknownLabel(s.to_string()))
    }
}

/// Per-label evidence in [0, 1].
///
/// Only labels with nonzero evidence are stored; a missing key reads as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreMap(BTreeMap<EmotionLabel, f64>);

impl ScoreMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// A map holding a single label
    pub fn single(label: EmotionLabel, score: f64) -> Self {
        let mut map = Self::new();
        map.set(label, score);
        map
    }

    /// Set a label's score, clamped to [0, 1]. Zero (or NaN) removes the key.
    pub fn set(&mut self, label: EmotionLabel, score: f64) {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        if score > 0.0 {
            self.0.insert(label, score);
        } else {
            self.0.remove(&label);
        }
    }

    pub fn get(&self, label: EmotionLabel) -> f64 {
        self.0.get(&label).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, label: EmotionLabel) -> bool {
        self.0.contains_key(&label)
    }

    /// Iterate in label priority order
    pub fn iter(&self) -> impl Iterator<Item = (EmotionLabel, f64)> + '_ {
        self.0.iter().map(|(label, score)| (*label, *score))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest-scoring label; ties go to the label declared first.
    pub fn argmax(&self) -> Option<(EmotionLabel, f64)> {
        self.iter().fold(None, |best, (label, score)| match best {
            Some((_, best_score)) if score <= best_score => best,
            _ => Some((label, score)),
        })
    }
}

/// Language of a text input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "en")]
    English,
    #[serde(rename = "unknown")]
    Unknown,
    /// Language codes reported by a remote classifier that the local
    /// dictionaries do not cover
    #[serde(untagged)]
    Other(String),
}

impl Language {
    pub fn as_str(&self) -> &str {
        match self {
            Language::Korean => "ko",
            Language::English => "en",
            Language::Unknown => "unknown",
            Language::Other(code) => code.as_str(),
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "ko" => Language::Korean,
            "en" => Language::English,
            "unknown" | "" => Language::Unknown,
            other => Language::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which source produced a published estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Behavior,
    Text,
    Multimodal,
    Manual,
}

/// How the published confidence was derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FusionMethod {
    /// Initial or reset state
    Default,
    BehaviorOnly,
    TextOnly,
    WeightedAverage { behavior_weight: f64, text_weight: f64 },
    ManualOverride,
}

/// Explanatory detail attached to a fusion result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionDetail {
    pub method: FusionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior_label: Option<EmotionLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub behavior_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_label: Option<EmotionLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_keywords: Vec<String>,
}

impl FusionDetail {
    pub fn method(method: FusionMethod) -> Self {
        Self {
            method,
            behavior_label: None,
            behavior_confidence: None,
            behavior_reasons: Vec::new(),
            text_label: None,
            text_confidence: None,
            text_keywords: Vec::new(),
        }
    }
}

/// The estimate published by the fusion combiner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub label: EmotionLabel,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub scores: ScoreMap,
    pub source: SourceKind,
    pub detail: FusionDetail,
    pub timestamp: DateTime<Utc>,
}

impl FusionResult {
    /// The neutral estimate published before any analysis and after a reset
    pub fn neutral(timestamp: DateTime<Utc>) -> Self {
        Self {
            label: EmotionLabel::Neutral,
            confidence: 0.5,
            scores: ScoreMap::single(EmotionLabel::Neutral, 1.0),
            source: SourceKind::Behavior,
            detail: FusionDetail::method(FusionMethod::Default),
            timestamp,
        }
    }

    /// A synthetic full-confidence result for a manual override
    pub fn manual(label: EmotionLabel, timestamp: DateTime<Utc>) -> Self {
        Self {
            label,
            confidence: 1.0,
            scores: ScoreMap::single(label, 1.0),
            source: SourceKind::Manual,
            detail: FusionDetail::method(FusionMethod::ManualOverride),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_serialization() {
        let json = serde_json::to_string(&EmotionLabel::Meditation).unwrap();
        assert_eq!(json, "\"meditation\"");

        let parsed: EmotionLabel = serde_json::from_str("\"depression\"").unwrap();
        assert_eq!(parsed, EmotionLabel::Depression);
    }

    #[test]
    fn test_label_from_str() {
        assert_eq!("Happy".parse::<EmotionLabel>().unwrap(), EmotionLabel::Happy);
        assert!("joyful".parse::<EmotionLabel>().is_err());
    }

    #[test]
    fn test_score_map_drops_zero_and_clamps() {
        let mut scores = ScoreMap::new();
        scores.set(EmotionLabel::Sad, 0.0);
        scores.set(EmotionLabel::Happy, 1.7);
        assert!(!scores.contains(EmotionLabel::Sad));
        assert_eq!(scores.get(EmotionLabel::Sad), 0.0);
        assert_eq!(scores.get(EmotionLabel::Happy), 1.0);
        assert_eq!(scores.len(), 1);
    }

    #[test]
    fn test_score_map_argmax_tie_prefers_declaration_order() {
        let mut scores = ScoreMap::new();
        scores.set(EmotionLabel::Fear, 0.4);
        scores.set(EmotionLabel::Anxious, 0.4);
        scores.set(EmotionLabel::Sad, 0.2);
        assert_eq!(scores.argmax(), Some((EmotionLabel::Anxious, 0.4)));
        assert_eq!(ScoreMap::new().argmax(), None);
    }

    #[test]
    fn test_score_map_serializes_as_object() {
        let scores = ScoreMap::single(EmotionLabel::Stressed, 0.62);
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"stressed":0.62}"#);
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::from_code("KO"), Language::Korean);
        assert_eq!(Language::from_code("ja"), Language::Other("ja".to_string()));

        let parsed: Language = serde_json::from_str("\"ja\"").unwrap();
        assert_eq!(parsed, Language::Other("ja".to_string()));
        let parsed: Language = serde_json::from_str("\"en\"").unwrap();
        assert_eq!(parsed, Language::English);
    }

    #[test]
    fn test_fusion_method_tagging() {
        let method = FusionMethod::WeightedAverage {
            behavior_weight: 0.4,
            text_weight: 0.6,
        };
        let value = serde_json::to_value(&method).unwrap();
        assert_eq!(value["kind"], "weighted_average");
        assert_eq!(value["text_weight"], 0.6);
    }
}
