//! Debounced analysis for text that arrives keystroke by keystroke

use chrono::{DateTime, Utc};

use crate::config::LexicalConfig;
use crate::lexical::analyzer::{LexicalJudgment, LexicalSignalExtractor};
use crate::schedule;

#[derive(Debug, Clone)]
struct PendingAnalysis {
    text: String,
    due: DateTime<Utc>,
}

/// Coalesces rapid `feed` calls into one analysis after a quiet period.
///
/// The quiet period restarts on every distinct input. A text identical to the
/// previous one is ignored, even after a cancel.
#[derive(Debug, Clone)]
pub struct DebouncedAnalyzer {
    quiet_ms: u64,
    last_text: Option<String>,
    pending: Option<PendingAnalysis>,
}

impl DebouncedAnalyzer {
    pub fn new(quiet_ms: u64) -> Self {
        Self {
            quiet_ms,
            last_text: None,
            pending: None,
        }
    }

    /// Use the configured `debounce_ms` as the quiet period
    pub fn from_config(config: &LexicalConfig) -> Self {
        Self::new(config.debounce_ms)
    }

    /// Queue `text`; returns false when it repeats the last fed text
    pub fn feed(&mut self, text: &str, now: DateTime<Utc>) -> bool {
        if self.last_text.as_deref() == Some(text) {
            return false;
        }
        self.last_text = Some(text.to_string());
        self.pending = Some(PendingAnalysis {
            text: text.to_string(),
            due: schedule::deadline(now, self.quiet_ms),
        });
        true
    }

    /// Run the pending analysis if its quiet period has elapsed
    pub fn poll(
        &mut self,
        extractor: &LexicalSignalExtractor,
        now: DateTime<Utc>,
    ) -> Option<LexicalJudgment> {
        let due = self.pending.as_ref()?.due;
        if now < due {
            return None;
        }
        let pending = self.pending.take()?;
        Some(extractor.analyze(&pending.text))
    }

    /// Drop the pending analysis; returns whether one was pending
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// When the pending analysis becomes due
    pub fn pending_deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.as_ref().map(|p| p.due)
    }
}
