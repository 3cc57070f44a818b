//! Hysteresis gate for emotion label transitions
//!
//! A label becomes the stable label only after enough consecutive confident
//! judgments, with a global cooldown between switches. Switching between
//! opposite labels takes extra confirmations; switching within a group of
//! similar labels takes fewer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use tracing::{debug, info};

use crate::config::HysteresisConfig;
use crate::schedule;
use crate::types::EmotionLabel;

/// Label pairs considered contradictory (unordered)
pub const OPPOSITE_PAIRS: [(EmotionLabel, EmotionLabel); 5] = [
    (EmotionLabel::Happy, EmotionLabel::Sad),
    (EmotionLabel::Excited, EmotionLabel::Depression),
    (EmotionLabel::Anger, EmotionLabel::Fear),
    (EmotionLabel::Stressed, EmotionLabel::Meditation),
    (EmotionLabel::Anxious, EmotionLabel::Meditation),
];

/// Groups of labels close enough to switch between quickly
pub const SIMILAR_GROUPS: [&[EmotionLabel]; 4] = [
    &[EmotionLabel::Happy, EmotionLabel::Excited],
    &[EmotionLabel::Sad, EmotionLabel::Depression],
    &[EmotionLabel::Stressed, EmotionLabel::Anxious],
    &[EmotionLabel::Anger, EmotionLabel::Stressed],
];

/// Confirmations required within a similar group
pub const SIMILAR_REQUIRED_COUNT: u32 = 2;

/// Window used by the stability index
const STABILITY_WINDOW_MS: i64 = 60_000;

pub fn is_opposite(a: EmotionLabel, b: EmotionLabel) -> bool {
    OPPOSITE_PAIRS
        .iter()
        .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
}

/// True when some group lists both labels. A grouped label is similar to itself.
pub fn is_similar(a: EmotionLabel, b: EmotionLabel) -> bool {
    SIMILAR_GROUPS
        .iter()
        .any(|group| group.contains(&a) && group.contains(&b))
}

/// Relation between the stable label and a judged label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionKind {
    Opposite,
    Similar,
    Normal,
}

impl TransitionKind {
    pub fn between(from: EmotionLabel, to: EmotionLabel) -> Self {
        if is_opposite(from, to) {
            TransitionKind::Opposite
        } else if is_similar(from, to) {
            TransitionKind::Similar
        } else {
            TransitionKind::Normal
        }
    }
}

/// Per-label confirmation state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelTracker {
    pub consecutive_count: u32,
    pub last_judgment: DateTime<Utc>,
    pub last_confidence: f64,
}

/// A committed transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: EmotionLabel,
    pub to: EmotionLabel,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub kind: TransitionKind,
}

/// Why a judgment did not commit a transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    LowConfidence { confidence: f64, min_confidence: f64 },
    TooSoon { elapsed_ms: i64, minimum_ms: u64 },
    NotEnoughConsecutive { count: u32, required: u32 },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::LowConfidence {
                confidence,
                min_confidence,
            } => write!(f, "low confidence: {confidence} < {min_confidence}"),
            BlockReason::TooSoon {
                elapsed_ms,
                minimum_ms,
            } => write!(f, "too soon: {elapsed_ms}ms < {minimum_ms}ms"),
            BlockReason::NotEnoughConsecutive { count, required } => {
                write!(f, "not enough consecutive: {count} < {required}")
            }
        }
    }
}

/// Result of feeding one judgment through the gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub transitioned: bool,
    /// Stable label after this judgment
    pub stable_label: EmotionLabel,
    /// Consecutive count of the stable label's tracker
    pub consecutive_count: u32,
    /// Set when a transition was committed
    pub kind: Option<TransitionKind>,
    /// Set when the judgment was blocked
    pub blocked: Option<BlockReason>,
    /// Consecutive count of every tracked label
    pub counts: BTreeMap<EmotionLabel, u32>,
}

/// Snapshot of the gate's publicly visible state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StableState {
    pub label: EmotionLabel,
    pub last_switch: Option<DateTime<Utc>>,
    pub transitions: Vec<TransitionRecord>,
    pub stability_index: f64,
}

/// Hysteresis state machine over emotion labels
#[derive(Debug, Clone)]
pub struct HysteresisGate {
    config: HysteresisConfig,
    trackers: BTreeMap<EmotionLabel, LabelTracker>,
    stable: EmotionLabel,
    /// None until the first committed transition, so the cooldown does not apply to it
    last_switch: Option<DateTime<Utc>>,
    history: VecDeque<TransitionRecord>,
}

impl Default for HysteresisGate {
    fn default() -> Self {
        Self::new(HysteresisConfig::default())
    }
}

impl HysteresisGate {
    pub fn new(config: HysteresisConfig) -> Self {
        info!(
            required_consecutive_count = config.required_consecutive_count,
            minimum_switch_interval_ms = config.minimum_switch_interval_ms,
            min_confidence = config.min_confidence,
            "hysteresis gate initialized"
        );
        Self {
            config,
            trackers: BTreeMap::new(),
            stable: EmotionLabel::Neutral,
            last_switch: None,
            history: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &HysteresisConfig {
        &self.config
    }

    pub fn update_config(&mut self, config: HysteresisConfig) {
        self.config = config;
    }

    /// Feed one judgment and decide whether to switch the stable label
    pub fn process(
        &mut self,
        label: EmotionLabel,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> GateOutcome {
        if confidence < self.config.min_confidence {
            return self.blocked(BlockReason::LowConfidence {
                confidence,
                min_confidence: self.config.min_confidence,
            });
        }

        if let Some(last_switch) = self.last_switch {
            let elapsed_ms = (timestamp - last_switch).num_milliseconds();
            let minimum_ms = self.config.minimum_switch_interval_ms;
            if u64::try_from(elapsed_ms).map_or(true, |elapsed| elapsed < minimum_ms) {
                return self.blocked(BlockReason::TooSoon {
                    elapsed_ms,
                    minimum_ms: self.config.minimum_switch_interval_ms,
                });
            }
        }

        self.record_judgment(label, confidence, timestamp);
        self.expire_stale_counts(timestamp);

        if label == self.stable {
            return self.outcome();
        }

        let kind = TransitionKind::between(self.stable, label);
        let required = self.required_count(kind);
        let count = self.count_of(label);

        if count < required {
            return self.blocked(BlockReason::NotEnoughConsecutive { count, required });
        }

        self.commit(label, confidence, timestamp, kind);
        GateOutcome {
            transitioned: true,
            kind: Some(kind),
            blocked: None,
            ..self.outcome()
        }
    }

    /// Confirmations needed to move from the stable label under `kind`
    pub fn required_count(&self, kind: TransitionKind) -> u32 {
        match kind {
            TransitionKind::Opposite => self
                .config
                .required_consecutive_count
                .saturating_add(self.config.opposite_extra_count),
            TransitionKind::Similar => SIMILAR_REQUIRED_COUNT,
            TransitionKind::Normal => self.config.required_consecutive_count,
        }
    }

    fn record_judgment(&mut self, label: EmotionLabel, confidence: f64, timestamp: DateTime<Utc>) {
        let max_gap = self.config.max_time_between_judgments_ms;
        self.trackers
            .entry(label)
            .and_modify(|tracker| {
                tracker.consecutive_count =
                    if schedule::exceeds(tracker.last_judgment, timestamp, max_gap) {
                        1
                    } else {
                        tracker.consecutive_count.saturating_add(1)
                    };
                tracker.last_judgment = timestamp;
                tracker.last_confidence = confidence;
            })
            .or_insert(LabelTracker {
                consecutive_count: 1,
                last_judgment: timestamp,
                last_confidence: confidence,
            });
    }

    /// Zero the count of every label not judged within the allowed gap
    fn expire_stale_counts(&mut self, now: DateTime<Utc>) {
        let max_gap = self.config.max_time_between_judgments_ms;
        for tracker in self.trackers.values_mut() {
            if schedule::exceeds(tracker.last_judgment, now, max_gap) {
                tracker.consecutive_count = 0;
            }
        }
    }

    fn commit(
        &mut self,
        label: EmotionLabel,
        confidence: f64,
        timestamp: DateTime<Utc>,
        kind: TransitionKind,
    ) {
        let from = self.stable;
        self.stable = label;
        self.last_switch = Some(timestamp);

        self.history.push_back(TransitionRecord {
            from,
            to: label,
            timestamp,
            confidence,
            kind,
        });
        let cutoff = schedule::cutoff(timestamp, self.config.history_retention_ms);
        self.history.retain(|record| record.timestamp > cutoff);

        if let Some(tracker) = self.trackers.get_mut(&label) {
            tracker.consecutive_count = 0;
        }

        info!(%from, to = %label, ?kind, confidence, "stable emotion transition");
    }

    fn count_of(&self, label: EmotionLabel) -> u32 {
        self.trackers
            .get(&label)
            .map(|tracker| tracker.consecutive_count)
            .unwrap_or(0)
    }

    fn blocked(&self, reason: BlockReason) -> GateOutcome {
        debug!(stable = %self.stable, %reason, "transition blocked");
        GateOutcome {
            blocked: Some(reason),
            ..self.outcome()
        }
    }

    fn outcome(&self) -> GateOutcome {
        GateOutcome {
            transitioned: false,
            stable_label: self.stable,
            consecutive_count: self.count_of(self.stable),
            kind: None,
            blocked: None,
            counts: self
                .trackers
                .iter()
                .map(|(label, tracker)| (*label, tracker.consecutive_count))
                .collect(),
        }
    }

    pub fn stable_label(&self) -> EmotionLabel {
        self.stable
    }

    pub fn last_switch(&self) -> Option<DateTime<Utc>> {
        self.last_switch
    }

    pub fn tracker(&self, label: EmotionLabel) -> Option<&LabelTracker> {
        self.trackers.get(&label)
    }

    pub fn transition_history(&self) -> Vec<TransitionRecord> {
        self.history.iter().cloned().collect()
    }

    /// Smoothness metric in [0, 1]: `max(0, 1 - transitions_last_60s / (2 * base))`
    pub fn stability_index(&self, now: DateTime<Utc>) -> f64 {
        let recent = self
            .history
            .iter()
            .filter(|record| (now - record.timestamp).num_milliseconds() < STABILITY_WINDOW_MS)
            .count();
        let base = self.config.required_consecutive_count;
        let max_transitions = base.saturating_mul(2).max(1) as f64;
        f64::max(0.0, 1.0 - recent as f64 / max_transitions)
    }

    pub fn state(&self, now: DateTime<Utc>) -> StableState {
        StableState {
            label: self.stable,
            last_switch: self.last_switch,
            transitions: self.transition_history(),
            stability_index: self.stability_index(now),
        }
    }

    /// Clear every tracker and the history, and return to neutral
    pub fn reset(&mut self) {
        self.trackers.clear();
        self.stable = EmotionLabel::Neutral;
        self.last_switch = None;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(secs)
    }

    /// Gate whose stable label is `label`, switched at `at(2)`
    fn gate_settled_on(label: EmotionLabel) -> HysteresisGate {
        let mut gate = HysteresisGate::default();
        for i in 0..3 {
            gate.process(label, 0.8, at(i));
        }
        assert_eq!(gate.stable_label(), label);
        gate
    }

    #[test]
    fn test_fresh_gate_requires_three_confirmations() {
        let mut gate = HysteresisGate::default();

        let first = gate.process(EmotionLabel::Happy, 0.8, at(0));
        assert!(!first.transitioned);
        assert_eq!(
            first.blocked,
            Some(BlockReason::NotEnoughConsecutive { count: 1, required: 3 })
        );
        assert!(!gate.process(EmotionLabel::Happy, 0.8, at(1)).transitioned);

        let third = gate.process(EmotionLabel::Happy, 0.8, at(2));
        assert!(third.transitioned);
        assert_eq!(third.stable_label, EmotionLabel::Happy);
        assert_eq!(third.kind, Some(TransitionKind::Normal));
        assert_eq!(gate.tracker(EmotionLabel::Happy).unwrap().consecutive_count, 0);
        assert_eq!(gate.last_switch(), Some(at(2)));
    }

    #[test]
    fn test_opposite_label_requires_five_confirmations() {
        let mut gate = gate_settled_on(EmotionLabel::Happy);

        for (i, secs) in (10..14).enumerate() {
            let outcome = gate.process(EmotionLabel::Sad, 0.8, at(secs));
            assert!(!outcome.transitioned);
            assert_eq!(
                outcome.blocked,
                Some(BlockReason::NotEnoughConsecutive {
                    count: i as u32 + 1,
                    required: 5
                })
            );
        }

        let fifth = gate.process(EmotionLabel::Sad, 0.8, at(14));
        assert!(fifth.transitioned);
        assert_eq!(fifth.kind, Some(TransitionKind::Opposite));
        assert_eq!(gate.stable_label(), EmotionLabel::Sad);
    }

    #[test]
    fn test_similar_label_requires_two_confirmations() {
        let mut gate = gate_settled_on(EmotionLabel::Happy);

        assert!(!gate.process(EmotionLabel::Excited, 0.8, at(10)).transitioned);
        let second = gate.process(EmotionLabel::Excited, 0.8, at(11));
        assert!(second.transitioned);
        assert_eq!(second.kind, Some(TransitionKind::Similar));
    }

    #[test]
    fn test_repeating_stable_label_is_not_a_transition() {
        let mut gate = gate_settled_on(EmotionLabel::Happy);

        for secs in [8, 9] {
            let outcome = gate.process(EmotionLabel::Happy, 0.9, at(secs));
            assert!(!outcome.transitioned);
            assert_eq!(outcome.blocked, None);
            assert_eq!(outcome.kind, None);
        }
        assert_eq!(gate.transition_history().len(), 1);
        assert_eq!(gate.last_switch(), Some(at(2)));

        assert!(!gate.process(EmotionLabel::Excited, 0.8, at(10)).transitioned);
        assert!(gate.process(EmotionLabel::Excited, 0.8, at(11)).transitioned);
        assert_eq!(gate.stable_label(), EmotionLabel::Excited);
    }

    #[test]
    fn test_unbounded_durations_still_count() {
        let mut gate = HysteresisGate::new(HysteresisConfig {
            max_time_between_judgments_ms: u64::MAX,
            history_retention_ms: u64::MAX,
            ..HysteresisConfig::default()
        });
        for i in 0..3 {
            gate.process(EmotionLabel::Happy, 0.8, at(i));
        }
        assert_eq!(gate.stable_label(), EmotionLabel::Happy);
        assert_eq!(gate.transition_history().len(), 1);
    }

    #[test]
    fn test_huge_counts_saturate() {
        let mut gate = HysteresisGate::new(HysteresisConfig {
            required_consecutive_count: u32::MAX,
            opposite_extra_count: u32::MAX,
            ..HysteresisConfig::default()
        });
        assert_eq!(gate.required_count(TransitionKind::Opposite), u32::MAX);
        assert_eq!(gate.stability_index(at(0)), 1.0);

        let outcome = gate.process(EmotionLabel::Fear, 0.9, at(0));
        assert_eq!(
            outcome.blocked,
            Some(BlockReason::NotEnoughConsecutive {
                count: 1,
                required: u32::MAX
            })
        );
    }

    #[test]
    fn test_low_confidence_never_counts() {
        let mut gate = HysteresisGate::default();
        for i in 0..10 {
            let outcome = gate.process(EmotionLabel::Anger, 0.69, at(i));
            assert!(matches!(outcome.blocked, Some(BlockReason::LowConfidence { .. })));
        }
        assert_eq!(gate.stable_label(), EmotionLabel::Neutral);
        assert!(gate.tracker(EmotionLabel::Anger).is_none());
    }

    #[test]
    fn test_cooldown_blocks_without_counting() {
        let mut gate = gate_settled_on(EmotionLabel::Happy);

        let outcome = gate.process(EmotionLabel::Fear, 0.9, at(4));
        assert_eq!(
            outcome.blocked,
            Some(BlockReason::TooSoon {
                elapsed_ms: 2_000,
                minimum_ms: 5_000
            })
        );
        assert!(gate.tracker(EmotionLabel::Fear).is_none());
    }

    #[test]
    fn test_gap_restarts_count() {
        let mut gate = HysteresisGate::default();
        gate.process(EmotionLabel::Surprise, 0.8, at(0));
        gate.process(EmotionLabel::Surprise, 0.8, at(5));
        assert_eq!(gate.tracker(EmotionLabel::Surprise).unwrap().consecutive_count, 2);

        gate.process(EmotionLabel::Surprise, 0.8, at(16));
        assert_eq!(gate.tracker(EmotionLabel::Surprise).unwrap().consecutive_count, 1);
    }

    #[test]
    fn test_sweep_zeroes_other_labels() {
        let mut gate = HysteresisGate::default();
        gate.process(EmotionLabel::Fear, 0.8, at(0));
        gate.process(EmotionLabel::Fear, 0.8, at(1));

        let outcome = gate.process(EmotionLabel::Sad, 0.8, at(12));
        assert_eq!(gate.tracker(EmotionLabel::Fear).unwrap().consecutive_count, 0);
        assert_eq!(outcome.counts.get(&EmotionLabel::Fear), Some(&0));
        assert_eq!(outcome.counts.get(&EmotionLabel::Sad), Some(&1));
    }

    #[test]
    fn test_history_is_pruned_to_retention() {
        let mut gate = HysteresisGate::new(HysteresisConfig {
            history_retention_ms: 20_000,
            ..HysteresisConfig::default()
        });
        for i in 0..3 {
            gate.process(EmotionLabel::Happy, 0.8, at(i));
        }
        for i in 0..3 {
            gate.process(EmotionLabel::Fatigue, 0.8, at(30 + i));
        }

        let history = gate.transition_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from, EmotionLabel::Happy);
        assert_eq!(history[0].to, EmotionLabel::Fatigue);
    }

    #[test]
    fn test_stability_index() {
        let mut gate = HysteresisGate::default();
        assert_eq!(gate.stability_index(at(0)), 1.0);

        for i in 0..3 {
            gate.process(EmotionLabel::Happy, 0.8, at(i));
        }
        assert!((gate.stability_index(at(3)) - (1.0 - 1.0 / 6.0)).abs() < 1e-9);
        assert_eq!(gate.stability_index(at(120)), 1.0);
    }

    #[test]
    fn test_reset_returns_to_neutral() {
        let mut gate = gate_settled_on(EmotionLabel::Stressed);
        gate.reset();

        assert_eq!(gate.stable_label(), EmotionLabel::Neutral);
        assert_eq!(gate.last_switch(), None);
        assert!(gate.transition_history().is_empty());
        assert!(gate.tracker(EmotionLabel::Stressed).is_none());
    }

    #[test]
    fn test_relation_tables() {
        assert!(is_opposite(EmotionLabel::Meditation, EmotionLabel::Anxious));
        assert!(!is_opposite(EmotionLabel::Happy, EmotionLabel::Fear));
        assert!(is_similar(EmotionLabel::Anxious, EmotionLabel::Stressed));
        assert!(!is_similar(EmotionLabel::Anger, EmotionLabel::Anxious));
        assert_eq!(
            TransitionKind::between(EmotionLabel::Neutral, EmotionLabel::Happy),
            TransitionKind::Normal
        );
    }

    #[test]
    fn test_block_reason_serialization() {
        let reason = BlockReason::NotEnoughConsecutive { count: 1, required: 3 };
        let value = serde_json::to_value(reason).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "reason": "not_enough_consecutive", "count": 1, "required": 3 })
        );
        assert_eq!(serde_json::to_string(&TransitionKind::Opposite).unwrap(), "\"OPPOSITE\"");
    }
}
