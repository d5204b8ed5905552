//! Streaming push payload.
//!
//! A fused state is serialized as a compact JSON object with four-decimal
//! real precision; a batch is the same wrapped in an array. Covariance is
//! not transmitted.

use fusion_core::types::FusedEntityState;
use serde::{Deserialize, Serialize, Serializer};

fn round4<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((value * 1e4).round() / 1e4)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WirePosition {
    #[serde(serialize_with = "round4")]
    pub x: f64,
    #[serde(serialize_with = "round4")]
    pub y: f64,
    #[serde(serialize_with = "round4")]
    pub z: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireVelocity {
    #[serde(serialize_with = "round4")]
    pub vx: f64,
    #[serde(serialize_with = "round4")]
    pub vy: f64,
    #[serde(serialize_with = "round4")]
    pub vz: f64,
}

/// The consumer-facing shape of one fused entity state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireState {
    #[serde(rename = "entityId")]
    pub entity_id: u64,
    /// Entity kind tag, e.g. "VEHICLE"
    #[serde(rename = "type")]
    pub kind: String,
    pub position: WirePosition,
    pub velocity: WireVelocity,
    #[serde(serialize_with = "round4")]
    pub confidence: f64,
    pub measurements: u64,
}

impl From<&FusedEntityState> for WireState {
    fn from(state: &FusedEntityState) -> Self {
        Self {
            entity_id: state.entity_id.0,
            kind: state.entity_kind.to_string(),
            position: WirePosition {
                x: state.position.x,
                y: state.position.y,
                z: state.position.z,
            },
            velocity: WireVelocity {
                vx: state.velocity.x,
                vy: state.velocity.y,
                vz: state.velocity.z,
            },
            confidence: state.confidence,
            measurements: state.measurement_count,
        }
    }
}

/// Serialize one state as a JSON object.
pub fn serialize_state(state: &FusedEntityState) -> serde_json::Result<String> {
    serde_json::to_string(&WireState::from(state))
}

/// Serialize a batch of states as a JSON array.
pub fn serialize_states(states: &[FusedEntityState]) -> serde_json::Result<String> {
    let wire: Vec<WireState> = states.iter().map(WireState::from).collect();
    serde_json::to_string(&wire)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
