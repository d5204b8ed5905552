//! Fundamental types used across the entire workspace.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix6, Vector3, Vector6};
use std::fmt;
use std::time::Instant;

// ---------------------------------------------------------------------------
// Scalar type: use f64 throughout for numerical precision in the filter.
// ---------------------------------------------------------------------------

/// 6-DOF state vector: [px, py, pz, vx, vy, vz]
pub type StateVec = Vector6<f64>;

/// 6×6 state covariance matrix
pub type StateCov = Matrix6<f64>;

/// Generic dynamic-size vector (used for measurement innovation)
pub type DVec = DVector<f64>;

/// Generic dynamic-size matrix (used for H, R, S)
pub type DMat = DMatrix<f64>;

/// 3-D position (x, y, z) in meters
pub type Position = Vector3<f64>;

/// 3-D velocity (vx, vy, vz) in m/s
pub type Velocity = Vector3<f64>;

// ---------------------------------------------------------------------------
// Identifier type — newtype wrapper so IDs are never confused at compile time
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Which physical sensor modality produced a measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Gps,
    Vision,
    Rf,
    Radar,
    Lidar,
    Unknown,
}

impl SensorKind {
    /// Radar and lidar report velocity alongside position; the other
    /// modalities are position-only. This is a property of the kind,
    /// not of the individual measurement.
    pub fn reports_velocity(&self) -> bool {
        matches!(self, SensorKind::Radar | SensorKind::Lidar)
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SensorKind::Gps => "GPS",
            SensorKind::Vision => "VISION",
            SensorKind::Rf => "RF",
            SensorKind::Radar => "RADAR",
            SensorKind::Lidar => "LIDAR",
            SensorKind::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Classification of a tracked entity. Purely informational; it does not
/// affect filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Vehicle,
    Aircraft,
    Personnel,
    Unknown,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Vehicle => "VEHICLE",
            EntityKind::Aircraft => "AIRCRAFT",
            EntityKind::Personnel => "PERSONNEL",
            EntityKind::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

/// A single observation of one entity by one sensor at one instant.
///
/// `velocity` and `velocity_covariance` are only meaningful when
/// `has_velocity` is true; they default to zero / identity otherwise.
#[derive(Clone, Debug)]
pub struct Measurement {
    /// Identity of the observed entity (no data association is performed)
    pub entity_id: EntityId,
    /// Which sensor modality produced this measurement
    pub sensor_kind: SensorKind,
    /// Monotonic capture instant
    pub timestamp: Instant,
    /// Observed position (meters)
    pub position: Position,
    /// Observed velocity (m/s), valid iff `has_velocity`
    pub velocity: Velocity,
    /// Whether the sensor reported velocity
    pub has_velocity: bool,
    /// 3×3 symmetric positive-definite position noise covariance
    pub position_covariance: Matrix3<f64>,
    /// 3×3 velocity noise covariance, valid iff `has_velocity`
    pub velocity_covariance: Matrix3<f64>,
    /// Sensor's self-reported per-measurement quality in [0, 1]
    pub confidence: f64,
}

impl Measurement {
    /// Position-only measurement with zeroed velocity fields.
    pub fn position_only(
        entity_id: EntityId,
        sensor_kind: SensorKind,
        timestamp: Instant,
        position: Position,
        position_covariance: Matrix3<f64>,
        confidence: f64,
    ) -> Self {
        Self {
            entity_id,
            sensor_kind,
            timestamp,
            position,
            velocity: Velocity::zeros(),
            has_velocity: false,
            position_covariance,
            velocity_covariance: Matrix3::identity(),
            confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// Fused entity state — the consumer-visible output record
// ---------------------------------------------------------------------------

/// Snapshot of one tracked entity, published on every output tick.
#[derive(Clone, Debug)]
pub struct FusedEntityState {
    pub entity_id: EntityId,
    pub entity_kind: EntityKind,
    /// Filtered position (first three state components)
    pub position: Position,
    /// Filtered velocity (last three state components)
    pub velocity: Velocity,
    /// Full 6×6 state covariance
    pub covariance: StateCov,
    /// Smoothed track quality in [0, 0.99]
    pub confidence: f64,
    /// Instant this snapshot was taken
    pub timestamp: Instant,
    /// Instant the tracker last incorporated a measurement
    pub last_update_time: Instant,
    /// Ring of the most recent contributing sensor kinds (≤ 10)
    pub contributing_sensors: Vec<SensorKind>,
    /// Total measurements folded into this track
    pub measurement_count: u64,
}

impl fmt::Display for FusedEntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entity {} [{}] Pos:({:.2},{:.2},{:.2}) Vel:({:.2},{:.2},{:.2}) Conf:{:.0}% Measurements:{}",
            self.entity_id,
            self.entity_kind,
            self.position.x,
            self.position.y,
            self.position.z,
            self.velocity.x,
            self.velocity.y,
            self.velocity.z,
            self.confidence * 100.0,
            self.measurement_count,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_reporting_is_a_kind_property() {
        assert!(SensorKind::Radar.reports_velocity());
        assert!(SensorKind::Lidar.reports_velocity());
        assert!(!SensorKind::Gps.reports_velocity());
        assert!(!SensorKind::Vision.reports_velocity());
        assert!(!SensorKind::Rf.reports_velocity());
        assert!(!SensorKind::Unknown.reports_velocity());
    }

    #[test]
    fn display_tags() {
        assert_eq!(SensorKind::Gps.to_string(), "GPS");
        assert_eq!(EntityKind::Aircraft.to_string(), "AIRCRAFT");
        assert_eq!(EntityId(101).to_string(), "101");
    }
}
