//! Behavior signal extraction
//!
//! The extractor owns the four event histories, recomputes features on the
//! sampling tick, prunes expired events on the cleanup tick, and turns the
//! latest features into a behavior-only estimate.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::behavior::detectors;
use crate::behavior::features::BehaviorFeatureDeriver;
use crate::behavior::history::BehaviorHistories;
use crate::behavior::types::{
    BehaviorEvent, BehaviorFeatures, BehaviorInference, BehaviorSnapshot, ClickSample, InputField,
    KeystrokeSample, PointerSample, ScrollSample,
};
use crate::config::BehaviorConfig;
use crate::schedule::{self, IntervalTimer};

/// Placeholder stored for clicks with no known target
const UNKNOWN_TARGET: &str = "unknown";

/// Derives behavioral features and a behavior-only emotion estimate from
/// interaction events.
pub struct BehaviorSignalExtractor {
    config: BehaviorConfig,
    tracking: bool,
    histories: BehaviorHistories,
    features: BehaviorFeatures,
    sample_timer: IntervalTimer,
    cleanup_timer: IntervalTimer,
}

impl Default for BehaviorSignalExtractor {
    fn default() -> Self {
        Self::new(BehaviorConfig::default())
    }
}

impl BehaviorSignalExtractor {
    pub fn new(config: BehaviorConfig) -> Self {
        Self {
            histories: BehaviorHistories::new(config.max_history_len),
            sample_timer: IntervalTimer::new(config.sample_interval_ms),
            cleanup_timer: IntervalTimer::new(config.cleanup_interval_ms),
            features: BehaviorFeatures::default(),
            tracking: false,
            config,
        }
    }

    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// Begin capturing events and arm the sampling and cleanup timers
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.tracking {
            return;
        }
        self.tracking = true;
        self.sample_timer.arm(now);
        self.cleanup_timer.arm(now);
        info!(
            sample_interval_ms = self.config.sample_interval_ms,
            cleanup_interval_ms = self.config.cleanup_interval_ms,
            "behavior tracking started"
        );
    }

    /// Stop capturing events and disarm both timers
    pub fn stop(&mut self) {
        if !self.tracking {
            return;
        }
        self.tracking = false;
        self.sample_timer.disarm();
        self.cleanup_timer.disarm();
        info!("behavior tracking stopped");
    }

    pub fn is_active(&self) -> bool {
        self.tracking
    }

    /// Append an event to its history without any filtering
    pub fn ingest(&mut self, event: BehaviorEvent) {
        match event {
            BehaviorEvent::PointerMove { x, y, timestamp } => {
                self.histories.pointer.push(PointerSample { x, y, timestamp })
            }
            BehaviorEvent::Scroll { y, timestamp } => {
                self.histories.scroll.push(ScrollSample { y, timestamp })
            }
            BehaviorEvent::Click {
                x,
                y,
                timestamp,
                target,
            } => self.histories.clicks.push(ClickSample {
                x,
                y,
                timestamp,
                target: target.unwrap_or_else(|| UNKNOWN_TARGET.to_string()),
            }),
            BehaviorEvent::Keystroke { key, timestamp } => {
                self.histories.keystrokes.push(KeystrokeSample {
                    key: mask_key(&key),
                    timestamp,
                })
            }
        }
    }

    /// Event-source entry point.
    ///
    /// Drops the event when tracking is stopped or its kind is disabled, and
    /// returns whether it was stored.
    pub fn capture(&mut self, event: BehaviorEvent) -> bool {
        if !self.tracking || !self.accepts(&event) {
            return false;
        }
        self.ingest(event);
        true
    }

    /// Capture a keystroke typed into `field`.
    ///
    /// Keystrokes into password or payment-card fields are never stored.
    pub fn capture_key(&mut self, key: &str, field: &InputField, timestamp: DateTime<Utc>) -> bool {
        if field.is_sensitive() {
            return false;
        }
        self.capture(BehaviorEvent::Keystroke {
            key: key.to_string(),
            timestamp,
        })
    }

    fn accepts(&self, event: &BehaviorEvent) -> bool {
        match event {
            BehaviorEvent::PointerMove { .. } => self.config.track_pointer,
            BehaviorEvent::Scroll { .. } => self.config.track_scroll,
            BehaviorEvent::Click { .. } => self.config.track_clicks,
            BehaviorEvent::Keystroke { .. } => self.config.track_keyboard,
        }
    }

    /// Recompute features from the trailing window ending at `now`
    pub fn sample(&mut self, now: DateTime<Utc>) -> BehaviorFeatures {
        self.features =
            BehaviorFeatureDeriver::derive(&self.histories, now, self.config.feature_window_ms);
        self.features
    }

    /// Features from the most recent sample
    pub fn features(&self) -> BehaviorFeatures {
        self.features
    }

    /// Behavior-only estimate from the most recent sample
    pub fn infer(&self) -> BehaviorInference {
        let inference = detectors::infer(&self.features);
        debug!(
            label = %inference.label,
            confidence = inference.confidence,
            reasons = inference.reasons.len(),
            "behavior inference"
        );
        inference
    }

    /// Drop events older than the retention window; returns how many were removed
    pub fn cleanup(&mut self, now: DateTime<Utc>) -> usize {
        let removed = self
            .histories
            .prune_through(schedule::cutoff(now, self.config.history_retention_ms));
        if removed > 0 {
            debug!(removed, remaining = self.histories.total_len(), "pruned behavior history");
        }
        removed
    }

    /// Run whichever periodic jobs are due at `now`
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if self.sample_timer.poll(now) {
            self.sample(now);
        }
        if self.cleanup_timer.poll(now) {
            self.cleanup(now);
        }
    }

    /// Clear all histories and features; tracking state is left as is
    pub fn reset(&mut self) {
        self.histories.clear();
        self.features = BehaviorFeatures::default();
        debug!("behavior histories cleared");
    }

    /// Copy of the retained events
    pub fn raw_data(&self) -> BehaviorSnapshot {
        self.histories.snapshot()
    }

    pub fn event_count(&self) -> usize {
        self.histories.total_len()
    }
}

/// Single-character keys are stored as `*`; named keys (Enter, Backspace) pass through
fn mask_key(key: &str) -> String {
    if key.chars().count() == 1 {
        "*".to_string()
    } else {
        key.to_string()
    }
}
