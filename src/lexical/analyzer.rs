//! Lexical signal extraction
//!
//! Pipeline: Text → Normalize → Detect language → Remote classifier (optional)
//! → Local keyword scoring → Judgment

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LexicalConfig;
use crate::lexical::dictionary::{
    keywords_for, INTENSIFIERS, INTENSIFIER_FACTOR, SOFTENERS, SOFTENER_FACTOR,
};
use crate::lexical::normalize::{detect_language, normalize};
use crate::lexical::remote::RemoteClassifier;
use crate::types::{EmotionLabel, Language, ScoreMap};

/// Score added per matched keyword
const KEYWORD_WEIGHT: f64 = 0.2;

/// Result of analyzing one text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalJudgment {
    pub label: EmotionLabel,
    pub confidence: f64,
    pub scores: ScoreMap,
    /// Matched dictionary keywords, one entry per (label, keyword) hit
    pub keywords: Vec<String>,
    pub language: Language,
}

impl LexicalJudgment {
    /// Returned for empty input and when no analysis path is available
    pub fn neutral() -> Self {
        Self {
            label: EmotionLabel::Neutral,
            confidence: 0.5,
            scores: ScoreMap::single(EmotionLabel::Neutral, 1.0),
            keywords: Vec::new(),
            language: Language::Unknown,
        }
    }
}

/// Scores free text against per-language keyword dictionaries, consulting a
/// remote classifier first when one is attached.
pub struct LexicalSignalExtractor {
    config: LexicalConfig,
    remote: Option<Box<dyn RemoteClassifier>>,
}

impl Default for LexicalSignalExtractor {
    fn default() -> Self {
        Self::new(LexicalConfig::default())
    }
}

impl LexicalSignalExtractor {
    /// Create an extractor. With the `remote` feature, an HTTP classifier is
    /// attached when the config names an endpoint.
    pub fn new(config: LexicalConfig) -> Self {
        Self {
            remote: configured_remote(&config),
            config,
        }
    }

    /// Attach a specific remote classifier
    pub fn with_remote(mut self, remote: Box<dyn RemoteClassifier>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn set_remote(&mut self, remote: Option<Box<dyn RemoteClassifier>>) {
        self.remote = remote;
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn config(&self) -> &LexicalConfig {
        &self.config
    }

    /// Replace the settings; the HTTP classifier is rebuilt when its settings change
    pub fn update_config(&mut self, config: LexicalConfig) {
        let remote_changed = config.endpoint != self.config.endpoint
            || config.api_key != self.config.api_key
            || config.remote_timeout_ms != self.config.remote_timeout_ms;
        if remote_changed {
            self.remote = configured_remote(&config);
        }
        self.config = config;
    }

    /// Analyze `text`.
    ///
    /// Never fails: remote errors fall back to local scoring, and blank input
    /// yields [`LexicalJudgment::neutral`].
    pub fn analyze(&self, text: &str) -> LexicalJudgment {
        if text.trim().is_empty() {
            return LexicalJudgment::neutral();
        }

        let clean = normalize(text);
        let language = detect_language(&clean, self.config.language);

        if let Some(remote) = &self.remote {
            match remote.classify(&clean, &language) {
                Ok(judgment) => {
                    debug!(
                        label = %judgment.label,
                        confidence = judgment.confidence,
                        "remote classification"
                    );
                    return judgment;
                }
                Err(e) => {
                    warn!(error = %e, "remote classifier failed, falling back to local analysis")
                }
            }
        }

        if !self.config.use_local_analysis {
            return LexicalJudgment::neutral();
        }

        let judgment = score_locally(&clean, language);
        debug!(
            label = %judgment.label,
            confidence = judgment.confidence,
            keywords = judgment.keywords.len(),
            "local lexical analysis"
        );
        judgment
    }
}

#[cfg(feature = "remote")]
fn configured_remote(config: &LexicalConfig) -> Option<Box<dyn RemoteClassifier>> {
    crate::lexical::remote::HttpClassifier::from_config(config)
        .map(|classifier| Box::new(classifier) as Box<dyn RemoteClassifier>)
}

#[cfg(not(feature = "remote"))]
fn configured_remote(_config: &LexicalConfig) -> Option<Box<dyn RemoteClassifier>> {
    None
}

/// Keyword scoring over normalized text.
///
/// Each dictionary keyword present in the text adds 0.2 to its label. The
/// per-text intensity multiplier is applied before capping at 1. Ties between
/// labels go to the one declared first.
pub fn score_locally(text: &str, language: Language) -> LexicalJudgment {
    let lower = text.to_lowercase();
    let multiplier = intensity_multiplier(&lower);

    let mut scores = ScoreMap::new();
    let mut keywords = Vec::new();

    for (label, label_keywords) in keywords_for(&language) {
        let mut raw = 0.0;
        for keyword in label_keywords.iter() {
            if contains_term(&lower, keyword) {
                raw += KEYWORD_WEIGHT;
                keywords.push(keyword.to_string());
            }
        }
        scores.set(*label, f64::min(1.0, raw * multiplier));
    }

    let (label, max_score) = scores.argmax().unwrap_or((EmotionLabel::Neutral, 0.0));
    let confidence = local_confidence(max_score, keywords.len(), text.chars().count());

    LexicalJudgment {
        label,
        confidence,
        scores,
        keywords,
        language,
    }
}

/// Product of 1.3 per intensifier present and 0.7 per softener present
pub fn intensity_multiplier(lower: &str) -> f64 {
    let boost = INTENSIFIERS
        .iter()
        .filter(|m| contains_term(lower, m))
        .fold(1.0, |acc, _| acc * INTENSIFIER_FACTOR);
    SOFTENERS
        .iter()
        .filter(|m| contains_term(lower, m))
        .fold(boost, |acc, _| acc * SOFTENER_FACTOR)
}

/// Substring test against a dictionary term normalized the same way as the text
fn contains_term(lower: &str, term: &str) -> bool {
    let needle = normalize(term).to_lowercase();
    !needle.is_empty() && lower.contains(&needle)
}

/// Confidence for a local judgment, in [0.3, 0.95].
///
/// Formula: `0.3 + 0.3 * max_score + min(0.2, 0.05 * keyword_count)`, then
/// `* 0.7` for texts under 10 characters or `+ 0.1` for texts over 50.
pub fn local_confidence(max_score: f64, keyword_count: usize, text_len: usize) -> f64 {
    let mut confidence = 0.3 + 0.3 * max_score + f64::min(0.2, 0.05 * keyword_count as f64);
    if text_len < 10 {
        confidence *= 0.7;
    } else if text_len > 50 {
        confidence += 0.1;
    }
    confidence.clamp(0.3, 0.95)
}
