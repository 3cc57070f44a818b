//! Snapshot encoding
//!
//! This module wraps the published estimate, the hysteresis state and the
//! latest behavioral features into a self-describing JSON snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::behavior::BehaviorFeatures;
use crate::error::AffectError;
use crate::fusion::FusionCombiner;
use crate::hysteresis::StableState;
use crate::types::FusionResult;
use crate::{AFFECT_VERSION, PRODUCER_NAME};

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: &str = "affect.snapshot.v1";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// A published estimate with the state that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectSnapshot {
    pub snapshot_version: String,
    pub producer: Producer,
    pub computed_at: DateTime<Utc>,
    pub result: FusionResult,
    pub stable: StableState,
    pub features: BehaviorFeatures,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticky_text: Option<String>,
}

/// Snapshot encoder; one instance id per encoder
pub struct SnapshotEncoder {
    instance_id: String,
}

impl Default for SnapshotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Snapshot the engine's published result at `now`
    pub fn encode(&self, engine: &FusionCombiner, now: DateTime<Utc>) -> AffectSnapshot {
        self.encode_result(engine, engine.result().clone(), now)
    }

    /// Snapshot a specific result, e.g. one delivered to a subscriber
    pub fn encode_result(
        &self,
        engine: &FusionCombiner,
        result: FusionResult,
        now: DateTime<Utc>,
    ) -> AffectSnapshot {
        AffectSnapshot {
            snapshot_version: SNAPSHOT_VERSION.to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: AFFECT_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at: now,
            result,
            stable: engine.stable_state(now),
            features: engine.behavior_features(),
            sticky_text: engine.sticky_text().map(str::to_string),
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        engine: &FusionCombiner,
        now: DateTime<Utc>,
    ) -> Result<String, AffectError> {
        let snapshot = self.encode(engine, now);
        Ok(serde_json::to_string(&snapshot)?)
    }
}
