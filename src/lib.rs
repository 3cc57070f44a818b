//! Affect Flux - deterministic engine for stable emotion labels
//!
//! Affect Flux turns two noisy signal sources, interaction dynamics and free
//! text, into a single emotion label that does not flicker:
//! behavior events → features → behavior inference, text → lexical judgment,
//! both → weighted fusion → hysteresis gate → published result.
//!
//! ## Modules
//!
//! - **Behavior**: pointer, scroll, click and keystroke histories with rolling features
//! - **Lexical**: keyword scoring for Korean and English text, optional remote classifier
//! - **Hysteresis**: gating of label changes by confidence, repetition and cooldown
//! - **Fusion**: the engine that owns the extractors and publishes results
//!
//! No component reads the clock; every time-dependent call takes `now`.

pub mod behavior;
pub mod config;
pub mod encoder;
pub mod error;
pub mod fusion;
pub mod hysteresis;
pub mod lexical;
pub mod schedule;
pub mod schema;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::EngineConfig;
pub use encoder::{AffectSnapshot, SnapshotEncoder};
pub use error::AffectError;
pub use fusion::{fuse, FusionCombiner, Subscription};
pub use hysteresis::HysteresisGate;
pub use types::{EmotionLabel, FusionResult, Language, ScoreMap, SourceKind};

// Extractor exports
pub use behavior::{BehaviorEvent, BehaviorSignalExtractor};
pub use lexical::{LexicalJudgment, LexicalSignalExtractor};

// Schema exports
pub use schema::{InputAdapter, InputRecord, SCHEMA_VERSION};

/// Version embedded in all snapshots
pub const AFFECT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for snapshots
pub const PRODUCER_NAME: &str = "affect-flux";
