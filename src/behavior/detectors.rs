//! Heuristic emotion detectors over behavioral features
//!
//! Three independent detectors (stress, fatigue, excitement) each score the
//! current features in [0, 1]. The strongest one wins if it clears the
//! neutral floor.

use crate::behavior::types::{BehaviorFeatures, BehaviorInference};
use crate::types::EmotionLabel;

/// Pointer speed thresholds (px/s)
pub mod pointer_speed {
    pub const SLOW: f64 = 100.0;
    pub const FAST: f64 = 500.0;
    pub const VERY_FAST: f64 = 800.0;
}

/// Scroll speed thresholds (px/s)
pub mod scroll_speed {
    pub const FAST: f64 = 1_000.0;
    pub const VERY_FAST: f64 = 2_000.0;
}

/// Click frequency thresholds (clicks/min)
pub mod click_frequency {
    pub const LOW: f64 = 5.0;
    pub const NORMAL: f64 = 15.0;
    pub const VERY_HIGH: f64 = 50.0;
}

/// Hesitation thresholds (ms since the last click)
pub mod hesitation {
    pub const SHORT: f64 = 1_500.0;
    pub const MEDIUM: f64 = 3_000.0;
    pub const LONG: f64 = 5_000.0;
}

/// Dwell time after which low activity counts as fatigue (ms)
const LONG_DWELL_MS: f64 = 120_000.0;

/// Winning score must exceed this to leave neutral
const NEUTRAL_FLOOR: f64 = 0.3;

/// Confidence ceiling for behavior-only inference
const MAX_BEHAVIOR_CONFIDENCE: f64 = 0.9;

/// Score stress signals: fast pointer, fast scroll, frantic clicking
pub fn detect_stress(features: &BehaviorFeatures, reasons: &mut Vec<String>) -> f64 {
    let mut score = 0.0;

    if features.pointer_speed > pointer_speed::VERY_FAST {
        score += 0.3;
        reasons.push("very fast pointer movement".to_string());
    } else if features.pointer_speed > pointer_speed::FAST {
        score += 0.15;
        reasons.push("fast pointer movement".to_string());
    }

    if features.scroll_speed > scroll_speed::VERY_FAST {
        score += 0.3;
        reasons.push("hurried scrolling".to_string());
    } else if features.scroll_speed > scroll_speed::FAST {
        score += 0.15;
        reasons.push("fast scrolling".to_string());
    }

    if features.click_frequency > click_frequency::VERY_HIGH {
        score += 0.25;
        reasons.push("frequent clicking".to_string());
    }

    f64::min(1.0, score)
}

/// Score fatigue signals: sluggish pointer, long hesitation, idle dwelling
pub fn detect_fatigue(features: &BehaviorFeatures, reasons: &mut Vec<String>) -> f64 {
    let mut score = 0.0;

    if features.pointer_speed > 0.0 && features.pointer_speed < pointer_speed::SLOW {
        score += 0.2;
        reasons.push("slow pointer movement".to_string());
    }

    if features.hesitation_time_ms > hesitation::LONG {
        score += 0.3;
        reasons.push("long hesitation".to_string());
    } else if features.hesitation_time_ms > hesitation::MEDIUM {
        score += 0.15;
        reasons.push("noticeable hesitation".to_string());
    }

    if features.dwell_time_ms > LONG_DWELL_MS && features.click_frequency < click_frequency::LOW {
        score += 0.2;
        reasons.push("low activity over a long visit".to_string());
    }

    f64::min(1.0, score)
}

/// Score excitement signals: brisk but controlled movement, active exploration, quick decisions
pub fn detect_excitement(features: &BehaviorFeatures, reasons: &mut Vec<String>) -> f64 {
    let mut score = 0.0;

    let speed = features.pointer_speed;
    if speed > pointer_speed::FAST && speed < pointer_speed::VERY_FAST {
        score += 0.2;
        reasons.push("brisk pointer movement".to_string());
    }

    if features.click_frequency > click_frequency::NORMAL
        && features.click_frequency < click_frequency::VERY_HIGH
    {
        score += 0.2;
        reasons.push("active exploration".to_string());
    }

    if features.hesitation_time_ms > 0.0 && features.hesitation_time_ms < hesitation::SHORT {
        score += 0.15;
        reasons.push("quick decisions".to_string());
    }

    f64::min(1.0, score)
}

/// Infer a behavior-only estimate from features.
///
/// Detector order is stress, fatigue, excitement; on equal scores the earlier
/// detector wins.
pub fn infer(features: &BehaviorFeatures) -> BehaviorInference {
    let mut reasons = Vec::new();

    let signals = [
        (EmotionLabel::Stressed, detect_stress(features, &mut reasons)),
        (EmotionLabel::Fatigue, detect_fatigue(features, &mut reasons)),
        (EmotionLabel::Excited, detect_excitement(features, &mut reasons)),
    ];

    let (label, score) = signals
        .into_iter()
        .fold(signals[0], |best, signal| if signal.1 > best.1 { signal } else { best });

    if score > NEUTRAL_FLOOR {
        BehaviorInference {
            label,
            confidence: f64::min(MAX_BEHAVIOR_CONFIDENCE, 0.5 + score),
            reasons,
        }
    } else {
        BehaviorInference {
            reasons,
            ..BehaviorInference::neutral()
        }
    }
}
