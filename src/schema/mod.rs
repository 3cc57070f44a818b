//! affect.input.v1 schema
//!
//! This module defines the NDJSON records an outside event source uses to
//! drive the engine: interaction events, text input, manual overrides and
//! clock ticks.

mod adapter;
mod record;

pub use adapter::*;
pub use record::*;
