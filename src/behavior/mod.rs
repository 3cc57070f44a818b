//! Behavioral signal extraction
//!
//! This module turns pointer, scroll, click and keystroke events into rolling
//! features and a behavior-only emotion estimate.
//!
//! Pipeline: Events → Histories → Features (sampling tick) → Detectors → Inference

pub mod detectors;
pub mod extractor;
pub mod features;
pub mod history;
pub mod types;

pub use extractor::BehaviorSignalExtractor;
pub use features::BehaviorFeatureDeriver;
pub use history::{BehaviorHistories, EventHistory};
pub use types::{
    BehaviorEvent, BehaviorFeatures, BehaviorInference, BehaviorSnapshot, ClickSample, InputField,
    KeystrokeSample, PointerSample, ScrollSample,
};
