//! Remote text classifier
//!
//! The lexical extractor may consult a remote classifier before scoring
//! locally. Any error from this module is caught by the caller and turned into
//! local scoring, so implementations only need to report failures honestly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AffectError;
use crate::lexical::analyzer::LexicalJudgment;
use crate::types::{EmotionLabel, Language, ScoreMap};

/// A classifier consulted before local keyword scoring
pub trait RemoteClassifier {
    /// Classify normalized text in the detected language
    fn classify(&self, text: &str, language: &Language) -> Result<LexicalJudgment, AffectError>;
}

/// Request body posted to the classifier endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierRequest {
    pub text: String,
    /// Routing mode understood by the endpoint
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ClassifierRequest {
    pub fn new(text: &str, language: &Language) -> Self {
        Self {
            text: text.to_string(),
            mode: "smart".to_string(),
            language: match language {
                Language::Unknown => None,
                other => Some(other.as_str().to_string()),
            },
        }
    }
}

/// Response envelope returned by the classifier endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result: Option<ClassifierResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierResult {
    #[serde(default)]
    pub dominant_emotion: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub scores: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Confidence assumed when the classifier omits one
const DEFAULT_REMOTE_CONFIDENCE: f64 = 0.5;

/// Turn a classifier response body into a judgment.
///
/// Missing fields fall back to: neutral label, confidence 0.5, scores holding
/// only the dominant label, no keywords, and the locally detected language.
/// Unknown label names and non-finite numbers are rejected.
pub fn parse_classifier_response(
    body: &str,
    detected: &Language,
) -> Result<LexicalJudgment, AffectError> {
    let response: ClassifierResponse =
        serde_json::from_str(body).map_err(|e| AffectError::MalformedResponse(e.to_string()))?;

    if !response.success {
        return Err(AffectError::RemoteRejected(
            response
                .error
                .unwrap_or_else(|| "classifier reported failure".to_string()),
        ));
    }

    let result = response
        .result
        .ok_or_else(|| AffectError::MalformedResponse("missing 'result'".to_string()))?;

    let label = match result.dominant_emotion.as_deref() {
        Some(name) if !name.is_empty() => parse_remote_label(name)?,
        _ => EmotionLabel::Neutral,
    };

    let confidence = finite(result.confidence.unwrap_or(DEFAULT_REMOTE_CONFIDENCE), "confidence")?
        .clamp(0.0, 1.0);

    let scores = match result.scores {
        Some(raw) => {
            let mut scores = ScoreMap::new();
            for (name, score) in raw {
                scores.set(parse_remote_label(&name)?, finite(score, "scores")?);
            }
            scores
        }
        None => ScoreMap::single(label, confidence),
    };

    let language = result
        .language
        .filter(|code| !code.is_empty())
        .map(|code| Language::from_code(&code))
        .unwrap_or_else(|| detected.clone());

    Ok(LexicalJudgment {
        label,
        confidence,
        scores,
        keywords: result.keywords.unwrap_or_default(),
        language,
    })
}

fn parse_remote_label(name: &str) -> Result<EmotionLabel, AffectError> {
    name.parse()
        .map_err(|_| AffectError::MalformedResponse(format!("unknown emotion '{name}'")))
}

fn finite(value: f64, field: &str) -> Result<f64, AffectError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AffectError::MalformedResponse(format!("non-finite {field}")))
    }
}

/// HTTP classifier posting JSON with an optional bearer credential.
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    endpoint: String,
    api_key: Option<String>,
    timeout: std::time::Duration,
}

#[cfg(feature = "remote")]
impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            timeout: std::time::Duration::from_millis(3_000),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = std::time::Duration::from_millis(timeout_ms);
        self
    }

    /// Build a classifier from lexical settings; `None` when no endpoint is configured
    pub fn from_config(config: &crate::config::LexicalConfig) -> Option<Self> {
        let endpoint = config.endpoint.as_ref()?;
        let mut classifier = Self::new(endpoint.clone()).with_timeout_ms(config.remote_timeout_ms);
        classifier.api_key = config.api_key.clone();
        Some(classifier)
    }
}

#[cfg(feature = "remote")]
impl RemoteClassifier for HttpClassifier {
    fn classify(&self, text: &str, language: &Language) -> Result<LexicalJudgment, AffectError> {
        let mut request = ureq::post(&self.endpoint).timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.set("Authorization", &format!("Bearer {key}"));
        }

        let response = request
            .send_json(ClassifierRequest::new(text, language))
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => AffectError::RemoteStatus(code),
                ureq::Error::Transport(t) => AffectError::RemoteTransport(t.to_string()),
            })?;

        let body = response
            .into_string()
            .map_err(|e| AffectError::MalformedResponse(e.to_string()))?;

        parse_classifier_response(&body, language)
    }
}
