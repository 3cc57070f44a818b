//! Multimodal fusion
//!
//! Combines the behavior and lexical estimates into one weighted estimate,
//! gates it through a private hysteresis instance, and publishes accepted
//! results to subscribers.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::behavior::{
    BehaviorEvent, BehaviorFeatures, BehaviorInference, BehaviorSignalExtractor, InputField,
};
use crate::config::{EngineConfig, FusionConfig, MAX_DURATION_MS};
use crate::error::AffectError;
use crate::fusion::subscribers::{SubscriberId, SubscriberList, Subscription};
use crate::hysteresis::{HysteresisGate, StableState};
use crate::lexical::{LexicalJudgment, LexicalSignalExtractor};
use crate::schedule::IntervalTimer;
use crate::types::{EmotionLabel, FusionDetail, FusionMethod, FusionResult, ScoreMap, SourceKind};

/// Penalty applied when only the behavior source is available
const SINGLE_SOURCE_PENALTY: f64 = 0.8;

/// Below this behavior confidence, text is used on its own
const MIN_BEHAVIOR_CONFIDENCE: f64 = 0.3;

/// Boost when both sources agree on the label
const AGREEMENT_BOOST: f64 = 1.2;

/// Ceiling for a boosted confidence
const MAX_AGREEMENT_CONFIDENCE: f64 = 0.95;

/// Relative weights of the two sources
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub behavior: f64,
    pub text: f64,
}

impl From<&FusionConfig> for FusionWeights {
    fn from(config: &FusionConfig) -> Self {
        Self {
            behavior: config.behavior_weight,
            text: config.text_weight,
        }
    }
}

/// Fuse a behavior inference and an optional text judgment.
///
/// Policy, in order:
/// - no text: behavior label at `behavior_confidence * 0.8`
/// - behavior confidence below 0.3: text label and confidence as is
/// - otherwise: per-label weighted sum over {behavior label, text label},
///   argmax with ties kept by the behavior label, boosted by 1.2 (capped at
///   0.95) when both sources agree
///
/// The returned confidence is always within [0, 1].
pub fn fuse(
    behavior: &BehaviorInference,
    text: Option<&LexicalJudgment>,
    weights: FusionWeights,
    timestamp: DateTime<Utc>,
) -> FusionResult {
    let Some(text) = text else {
        return FusionResult {
            label: behavior.label,
            confidence: clamp_unit(behavior.confidence * SINGLE_SOURCE_PENALTY),
            scores: ScoreMap::single(behavior.label, behavior.confidence),
            source: SourceKind::Behavior,
            detail: FusionDetail {
                behavior_label: Some(behavior.label),
                behavior_confidence: Some(behavior.confidence),
                behavior_reasons: behavior.reasons.clone(),
                ..FusionDetail::method(FusionMethod::BehaviorOnly)
            },
            timestamp,
        };
    };

    if behavior.confidence < MIN_BEHAVIOR_CONFIDENCE {
        return FusionResult {
            label: text.label,
            confidence: clamp_unit(text.confidence),
            scores: ScoreMap::single(text.label, text.confidence),
            source: SourceKind::Text,
            detail: FusionDetail {
                text_label: Some(text.label),
                text_confidence: Some(text.confidence),
                text_keywords: text.keywords.clone(),
                ..FusionDetail::method(FusionMethod::TextOnly)
            },
            timestamp,
        };
    }

    let weighted = |label: EmotionLabel| {
        let behavior_score = if behavior.label == label { behavior.confidence } else { 0.0 };
        let text_score = if text.label == label { text.confidence } else { 0.0 };
        behavior_score * weights.behavior + text_score * weights.text
    };

    let mut candidates = vec![behavior.label];
    if text.label != behavior.label {
        candidates.push(text.label);
    }

    let mut scores = ScoreMap::new();
    let mut best = (EmotionLabel::Neutral, 0.0);
    for label in candidates {
        let score = weighted(label);
        scores.set(label, score);
        if score > best.1 {
            best = (label, score);
        }
    }

    let (label, mut confidence) = best;
    if behavior.label == text.label {
        confidence = f64::min(MAX_AGREEMENT_CONFIDENCE, confidence * AGREEMENT_BOOST);
    }

    FusionResult {
        label,
        confidence: clamp_unit(confidence),
        scores,
        source: SourceKind::Multimodal,
        detail: FusionDetail {
            method: FusionMethod::WeightedAverage {
                behavior_weight: weights.behavior,
                text_weight: weights.text,
            },
            behavior_label: Some(behavior.label),
            behavior_confidence: Some(behavior.confidence),
            behavior_reasons: behavior.reasons.clone(),
            text_label: Some(text.label),
            text_confidence: Some(text.confidence),
            text_keywords: text.keywords.clone(),
        },
        timestamp,
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// The stabilization engine: owns both extractors and a private hysteresis gate.
pub struct FusionCombiner {
    config: FusionConfig,
    behavior: BehaviorSignalExtractor,
    lexical: LexicalSignalExtractor,
    gate: HysteresisGate,
    current: FusionResult,
    subscribers: SubscriberList,
    sticky_text: Option<String>,
    manual: Option<EmotionLabel>,
    auto_timer: IntervalTimer,
}

impl FusionCombiner {
    /// Build an engine; the published result starts as neutral at `now`
    pub fn new(config: EngineConfig, now: DateTime<Utc>) -> Self {
        let mut fusion = config.fusion;
        fusion.normalize_weights();
        Self {
            behavior: BehaviorSignalExtractor::new(config.behavior),
            lexical: LexicalSignalExtractor::new(config.lexical),
            gate: HysteresisGate::new(config.hysteresis),
            current: FusionResult::neutral(now),
            subscribers: SubscriberList::new(),
            sticky_text: None,
            manual: None,
            auto_timer: IntervalTimer::new(fusion.auto_analyze_interval_ms),
            config: fusion,
        }
    }

    /// Replace the lexical extractor (e.g. one with a custom remote classifier)
    pub fn with_lexical(mut self, lexical: LexicalSignalExtractor) -> Self {
        self.lexical = lexical;
        self
    }

    /// Start behavior capture and the auto-analysis timer
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.behavior.start(now);
        if !self.auto_timer.is_armed() {
            self.auto_timer.arm(now);
        }
        info!(
            auto_analyze_interval_ms = self.config.auto_analyze_interval_ms,
            "fusion engine started"
        );
    }

    pub fn stop(&mut self) {
        self.behavior.stop();
        self.auto_timer.disarm();
        info!("fusion engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.auto_timer.is_armed()
    }

    /// Drive the periodic jobs; returns the analysis result when auto-analysis ran
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<FusionResult> {
        self.behavior.tick(now);
        if self.auto_timer.poll(now) {
            Some(self.analyze(None, now))
        } else {
            None
        }
    }

    /// Event-source entry point, subject to the capture settings
    pub fn capture(&mut self, event: BehaviorEvent) -> bool {
        self.behavior.capture(event)
    }

    pub fn capture_key(&mut self, key: &str, field: &InputField, timestamp: DateTime<Utc>) -> bool {
        self.behavior.capture_key(key, field, timestamp)
    }

    /// Append an event regardless of capture settings
    pub fn ingest(&mut self, event: BehaviorEvent) {
        self.behavior.ingest(event);
    }

    /// Run one fusion pass.
    ///
    /// Non-empty `text` replaces the sticky text. Returns the published result,
    /// which is unchanged when the gate blocks the fused estimate.
    pub fn analyze(&mut self, text: Option<&str>, now: DateTime<Utc>) -> FusionResult {
        if let Some(label) = self.manual {
            return FusionResult::manual(label, now);
        }

        if let Some(text) = text.filter(|t| !t.is_empty()) {
            self.sticky_text = Some(text.to_string());
        }

        self.behavior.sample(now);
        let inference = self.behavior.infer();
        let judgment = self.sticky_text.as_deref().map(|t| self.lexical.analyze(t));

        let mut fused = fuse(&inference, judgment.as_ref(), FusionWeights::from(&self.config), now);

        if self.config.use_hysteresis {
            let outcome = self.gate.process(fused.label, fused.confidence, now);
            if !outcome.transitioned {
                debug!(
                    fused = %fused.label,
                    confidence = fused.confidence,
                    stable = %outcome.stable_label,
                    "fused estimate held back by hysteresis"
                );
                return self.current.clone();
            }
            fused.label = outcome.stable_label;
        }

        self.publish(fused);
        self.current.clone()
    }

    /// Store `text` as the sticky text and analyze
    pub fn feed_text(&mut self, text: &str, now: DateTime<Utc>) -> FusionResult {
        self.sticky_text = (!text.is_empty()).then(|| text.to_string());
        self.analyze(Some(text), now)
    }

    /// Pin the published label until cleared
    pub fn set_manual_emotion(&mut self, label: EmotionLabel, now: DateTime<Utc>) {
        self.manual = Some(label);
        info!(%label, "manual emotion set");
        self.publish(FusionResult::manual(label, now));
    }

    /// Drop the manual override and re-run analysis
    pub fn clear_manual_emotion(&mut self, now: DateTime<Utc>) -> FusionResult {
        self.manual = None;
        info!("manual emotion cleared");
        self.analyze(None, now)
    }

    /// Register a callback; it immediately receives the current result
    pub fn subscribe<F>(&mut self, callback: F) -> Subscription
    where
        F: FnMut(&FusionResult) + 'static,
    {
        let subscription = self.subscribers.add(callback);
        self.subscribers.notify_one(subscription.id(), &self.current);
        subscription
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.subscribers.remove(id)
    }

    /// Clear history, gate, sticky text and override, then republish neutral
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.behavior.reset();
        self.gate.reset();
        self.sticky_text = None;
        self.manual = None;
        info!("fusion engine reset");
        self.publish(FusionResult::neutral(now));
    }

    /// Update the source weights, renormalized to sum to 1
    pub fn set_weights(&mut self, behavior: f64, text: f64) -> Result<(), AffectError> {
        self.update_config(
            FusionConfig {
                behavior_weight: behavior,
                text_weight: text,
                ..self.config.clone()
            },
            None,
        )
    }

    /// Replace the fusion settings. A changed interval reschedules a running
    /// auto-analysis timer from `now`, or from its last firing when `now` is None.
    pub fn update_config(
        &mut self,
        mut config: FusionConfig,
        now: Option<DateTime<Utc>>,
    ) -> Result<(), AffectError> {
        let (bw, tw) = (config.behavior_weight, config.text_weight);
        if bw < 0.0 || tw < 0.0 || bw + tw <= 0.0 {
            return Err(AffectError::InvalidConfig(format!(
                "fusion weights must be non-negative with a positive sum, got {bw}/{tw}"
            )));
        }
        let interval_ms = config.auto_analyze_interval_ms;
        if interval_ms == 0 || interval_ms > MAX_DURATION_MS {
            return Err(AffectError::InvalidConfig(format!(
                "fusion.auto_analyze_interval_ms must be within [1, {MAX_DURATION_MS}], \
                 got {interval_ms}"
            )));
        }
        config.normalize_weights();

        if config.auto_analyze_interval_ms != self.config.auto_analyze_interval_ms {
            match now {
                Some(now) => self.auto_timer.set_period(config.auto_analyze_interval_ms, now),
                None => self.auto_timer.rebase_period(config.auto_analyze_interval_ms),
            }
        }
        self.config = config;
        Ok(())
    }

    fn publish(&mut self, result: FusionResult) {
        self.current = result;
        self.subscribers.notify(&self.current);
    }

    pub fn result(&self) -> &FusionResult {
        &self.current
    }

    pub fn label(&self) -> EmotionLabel {
        self.current.label
    }

    pub fn confidence(&self) -> f64 {
        self.current.confidence
    }

    pub fn behavior_features(&self) -> BehaviorFeatures {
        self.behavior.features()
    }

    pub fn stable_state(&self, now: DateTime<Utc>) -> StableState {
        self.gate.state(now)
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn sticky_text(&self) -> Option<&str> {
        self.sticky_text.as_deref()
    }

    pub fn manual_emotion(&self) -> Option<EmotionLabel> {
        self.manual
    }

    pub fn behavior(&self) -> &BehaviorSignalExtractor {
        &self.behavior
    }

    pub fn lexical(&self) -> &LexicalSignalExtractor {
        &self.lexical
    }

    pub fn lexical_mut(&mut self) -> &mut LexicalSignalExtractor {
        &mut self.lexical
    }

    pub fn gate(&self) -> &HysteresisGate {
        &self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn at(ms: i64) -> DateTime<Utc> {
        t0() + Duration::milliseconds(ms)
    }

    fn inference(label: EmotionLabel, confidence: f64) -> BehaviorInference {
        BehaviorInference {
            label,
            confidence,
            reasons: vec!["test".to_string()],
        }
    }

    fn judgment(label: EmotionLabel, confidence: f64) -> LexicalJudgment {
        LexicalJudgment {
            label,
            confidence,
            scores: ScoreMap::single(label, confidence),
            keywords: vec!["kw".to_string()],
            language: Language::English,
        }
    }

    fn default_weights() -> FusionWeights {
        FusionWeights::from(&FusionConfig::default())
    }

    /// Pointer and scroll bursts that read as stressed at confidence 0.9
    fn ingest_stress_burst(engine: &mut FusionCombiner) {
        for i in 0..10 {
            engine.ingest(BehaviorEvent::PointerMove {
                x: i as f64 * 100.0,
                y: 0.0,
                timestamp: at(i * 100),
            });
            engine.ingest(BehaviorEvent::Scroll {
                y: i as f64 * 300.0,
                timestamp: at(i * 100),
            });
        }
    }

    fn unhysteretic() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.fusion.use_hysteresis = false;
        config
    }

    #[test]
    fn test_behavior_only_penalty() {
        let result = fuse(&inference(EmotionLabel::Stressed, 0.6), None, default_weights(), t0());
        assert_eq!(result.label, EmotionLabel::Stressed);
        assert!((result.confidence - 0.48).abs() < 1e-9);
        assert_eq!(result.source, SourceKind::Behavior);
        assert_eq!(result.detail.method, FusionMethod::BehaviorOnly);
        assert_eq!(result.scores.get(EmotionLabel::Stressed), 0.6);
    }

    #[test]
    fn test_agreeing_sources_are_boosted() {
        let result = fuse(
            &inference(EmotionLabel::Stressed, 0.5),
            Some(&judgment(EmotionLabel::Stressed, 0.7)),
            default_weights(),
            t0(),
        );
        assert_eq!(result.label, EmotionLabel::Stressed);
        assert_eq!(result.source, SourceKind::Multimodal);
        assert!((result.scores.get(EmotionLabel::Stressed) - 0.62).abs() < 1e-9);
        assert!((result.confidence - 0.744).abs() < 1e-9);
    }

    #[test]
    fn test_weak_behavior_defers_to_text() {
        let result = fuse(
            &inference(EmotionLabel::Fatigue, 0.2),
            Some(&judgment(EmotionLabel::Happy, 0.65)),
            default_weights(),
            t0(),
        );
        assert_eq!(result.label, EmotionLabel::Happy);
        assert_eq!(result.confidence, 0.65);
        assert_eq!(result.source, SourceKind::Text);
        assert_eq!(result.detail.text_keywords, vec!["kw".to_string()]);
    }

    #[test]
    fn test_disagreeing_sources_pick_weighted_max() {
        let result = fuse(
            &inference(EmotionLabel::Stressed, 0.9),
            Some(&judgment(EmotionLabel::Happy, 0.5)),
            default_weights(),
            t0(),
        );
        // 0.36 vs 0.30
        assert_eq!(result.label, EmotionLabel::Stressed);
        assert!((result.confidence - 0.36).abs() < 1e-9);
        assert_eq!(result.scores.len(), 2);
    }

    #[test]
    fn test_weighted_tie_keeps_behavior_label() {
        let weights = FusionWeights {
            behavior: 0.5,
            text: 0.5,
        };
        let result = fuse(
            &inference(EmotionLabel::Sad, 0.6),
            Some(&judgment(EmotionLabel::Anger, 0.6)),
            weights,
            t0(),
        );
        assert_eq!(result.label, EmotionLabel::Sad);
    }

    #[test]
    fn test_boost_is_capped() {
        let result = fuse(
            &inference(EmotionLabel::Happy, 0.9),
            Some(&judgment(EmotionLabel::Happy, 0.95)),
            default_weights(),
            t0(),
        );
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn test_initial_result_is_neutral() {
        let engine = FusionCombiner::new(EngineConfig::default(), t0());
        assert_eq!(engine.result(), &FusionResult::neutral(t0()));
        assert_eq!(engine.label(), EmotionLabel::Neutral);
        assert_eq!(engine.confidence(), 0.5);
    }

    #[test]
    fn test_hysteresis_holds_until_confirmed() {
        let mut engine = FusionCombiner::new(EngineConfig::default(), t0());
        ingest_stress_burst(&mut engine);

        let published = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&published);
        engine.subscribe(move |result| sink.borrow_mut().push(result.label));

        assert_eq!(engine.analyze(None, at(1_000)).label, EmotionLabel::Neutral);
        assert_eq!(engine.analyze(None, at(2_000)).label, EmotionLabel::Neutral);

        let result = engine.analyze(None, at(3_000));
        assert_eq!(result.label, EmotionLabel::Stressed);
        assert!((result.confidence - 0.72).abs() < 1e-9);
        assert_eq!(result.source, SourceKind::Behavior);

        assert_eq!(
            *published.borrow(),
            vec![EmotionLabel::Neutral, EmotionLabel::Stressed]
        );
        assert_eq!(engine.stable_state(at(3_000)).label, EmotionLabel::Stressed);
    }

    #[test]
    fn test_without_hysteresis_every_result_publishes() {
        let mut engine = FusionCombiner::new(unhysteretic(), t0());
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        engine.subscribe(move |_| *counter.borrow_mut() += 1);

        let result = engine.analyze(None, at(100));
        assert_eq!(result.label, EmotionLabel::Neutral);
        assert!((result.confidence - 0.4).abs() < 1e-9);
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn test_text_is_sticky() {
        let mut engine = FusionCombiner::new(unhysteretic(), t0());
        ingest_stress_burst(&mut engine);

        let first = engine.feed_text("too much pressure at work", at(1_000));
        assert_eq!(first.source, SourceKind::Multimodal);
        assert_eq!(engine.sticky_text(), Some("too much pressure at work"));

        let second = engine.analyze(None, at(2_000));
        assert_eq!(second.source, SourceKind::Multimodal);
        assert_eq!(second.detail.text_label, Some(EmotionLabel::Stressed));

        engine.analyze(Some(""), at(3_000));
        assert_eq!(engine.sticky_text(), Some("too much pressure at work"));
    }

    #[test]
    fn test_manual_override_bypasses_fusion() {
        let mut engine = FusionCombiner::new(EngineConfig::default(), t0());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.subscribe(move |result| sink.borrow_mut().push(result.source));

        engine.set_manual_emotion(EmotionLabel::Meditation, at(10));
        assert_eq!(engine.label(), EmotionLabel::Meditation);
        assert_eq!(engine.confidence(), 1.0);

        let result = engine.analyze(Some("so tired"), at(20));
        assert_eq!(result.source, SourceKind::Manual);
        assert_eq!(engine.gate().tracker(EmotionLabel::Fatigue), None);
        assert_eq!(engine.sticky_text(), None);

        engine.clear_manual_emotion(at(30));
        assert_eq!(engine.manual_emotion(), None);
        assert_eq!(*seen.borrow(), vec![SourceKind::Behavior, SourceKind::Manual]);
    }

    #[test]
    fn test_panicking_subscriber_does_not_escape() {
        let mut engine = FusionCombiner::new(unhysteretic(), t0());
        engine.subscribe(|_| panic!("subscriber failure"));
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        engine.subscribe(move |_| *counter.borrow_mut() += 1);

        engine.analyze(None, at(100));
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut engine = FusionCombiner::new(unhysteretic(), t0());
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        let subscription = engine.subscribe(move |_| *counter.borrow_mut() += 1);

        subscription.unsubscribe();
        engine.analyze(None, at(100));
        assert_eq!(*hits.borrow(), 1);
        assert!(!engine.unsubscribe(subscription.id() + 100));
    }

    #[test]
    fn test_reset_republishes_neutral() {
        let mut engine = FusionCombiner::new(unhysteretic(), t0());
        ingest_stress_burst(&mut engine);
        engine.feed_text("too much pressure", at(1_000));
        engine.set_manual_emotion(EmotionLabel::Happy, at(1_100));

        let hits = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&hits);
        engine.subscribe(move |result| sink.borrow_mut().push(result.label));

        engine.reset(at(2_000));
        assert_eq!(engine.result(), &FusionResult::neutral(at(2_000)));
        assert_eq!(engine.sticky_text(), None);
        assert_eq!(engine.manual_emotion(), None);
        assert_eq!(engine.behavior().event_count(), 0);
        assert_eq!(*hits.borrow(), vec![EmotionLabel::Happy, EmotionLabel::Neutral]);
    }

    #[test]
    fn test_tick_runs_auto_analysis() {
        let mut engine = FusionCombiner::new(unhysteretic(), t0());
        engine.start(t0());
        assert!(engine.is_running());

        assert!(engine.tick(at(4_900)).is_none());
        assert!(engine.tick(at(5_000)).is_some());
        assert!(engine.tick(at(5_100)).is_none());

        engine.stop();
        assert!(engine.tick(at(20_000)).is_none());
    }

    #[test]
    fn test_interval_change_keeps_auto_analysis_running() {
        let mut engine = FusionCombiner::new(unhysteretic(), t0());
        engine.start(t0());

        let faster = FusionConfig {
            auto_analyze_interval_ms: 2_000,
            ..engine.config().clone()
        };
        engine.update_config(faster, None).unwrap();
        assert!(engine.is_running());
        assert!(engine.tick(at(1_900)).is_none());
        assert!(engine.tick(at(2_000)).is_some());

        let slower = FusionConfig {
            auto_analyze_interval_ms: 10_000,
            ..engine.config().clone()
        };
        engine.update_config(slower, Some(at(3_000))).unwrap();
        assert!(engine.tick(at(12_900)).is_none());
        assert!(engine.tick(at(13_000)).is_some());
    }

    #[test]
    fn test_set_weights_renormalizes() {
        let mut engine = FusionCombiner::new(EngineConfig::default(), t0());
        engine.set_weights(1.0, 1.0).unwrap();
        assert_eq!(engine.config().behavior_weight, 0.5);
        assert_eq!(engine.config().text_weight, 0.5);
        assert!(engine.set_weights(-1.0, 2.0).is_err());
    }
}
