//! Entity tracker: one Kalman filter plus bookkeeping for one entity.
//!
//! A tracker is created by the fusion engine on the first measurement
//! carrying an unseen entity id, mutated only by the fusion worker, and
//! destroyed by the output worker's reaper once it goes stale.

use crate::kf::KalmanFilter;
use crate::types::{
    EntityId, EntityKind, FusedEntityState, Measurement, SensorKind, StateCov, StateVec,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::warn;

/// Number of contributing sensor kinds remembered per track.
const SENSOR_RING_LEN: usize = 10;

/// Variance placed on the velocity block at initialization when the first
/// measurement reports no velocity (uninformative prior).
const UNOBSERVED_VELOCITY_VAR: f64 = 10.0;

/// Default variance floor for the unobserved blocks of the measurement
/// noise matrix.
const DEFAULT_NOISE_VAR: f64 = 100.0;

/// Exponential smoothing factor for the running confidence estimate.
const CONFIDENCE_ALPHA: f64 = 0.1;

/// Upper clamp on the smoothed confidence.
const CONFIDENCE_CEILING: f64 = 0.99;

/// One tracked entity: filter state plus confidence and sensor bookkeeping.
#[derive(Clone, Debug)]
pub struct EntityTracker {
    entity_id: EntityId,
    entity_kind: EntityKind,
    filter: KalmanFilter,
    creation_time: Instant,
    last_update_time: Instant,
    total_measurements: u64,
    /// Ring of the most recent contributing sensors, oldest evicted first.
    recent_sensors: VecDeque<SensorKind>,
    base_confidence: f64,
}

impl EntityTracker {
    pub fn new(entity_id: EntityId, entity_kind: EntityKind) -> Self {
        let now = Instant::now();
        Self {
            entity_id,
            entity_kind,
            filter: KalmanFilter::new(),
            creation_time: now,
            last_update_time: now,
            total_measurements: 0,
            recent_sensors: VecDeque::with_capacity(SENSOR_RING_LEN),
            base_confidence: 0.5,
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn entity_kind(&self) -> EntityKind {
        self.entity_kind
    }

    pub fn total_measurements(&self) -> u64 {
        self.total_measurements
    }

    pub fn last_update_time(&self) -> Instant {
        self.last_update_time
    }

    pub fn base_confidence(&self) -> f64 {
        self.base_confidence
    }

    /// Fold one measurement into the track.
    ///
    /// The first measurement initializes the filter directly (no
    /// prediction). Later measurements predict forward by the elapsed time
    /// and then update. Timestamps are assumed non-decreasing; a lower
    /// timestamp floors dt at zero rather than predicting backwards.
    pub fn process_measurement(&mut self, m: &Measurement) {
        if self.total_measurements == 0 {
            let mut state = StateVec::zeros();
            state[0] = m.position.x;
            state[1] = m.position.y;
            state[2] = m.position.z;
            if m.has_velocity {
                state[3] = m.velocity.x;
                state[4] = m.velocity.y;
                state[5] = m.velocity.z;
            }

            let mut cov = StateCov::identity();
            cov.fixed_view_mut::<3, 3>(0, 0)
                .copy_from(&m.position_covariance);
            if m.has_velocity {
                cov.fixed_view_mut::<3, 3>(3, 3)
                    .copy_from(&m.velocity_covariance);
            } else {
                cov.fixed_view_mut::<3, 3>(3, 3)
                    .copy_from(&(nalgebra::Matrix3::identity() * UNOBSERVED_VELOCITY_VAR));
            }

            self.filter.initialize(state, cov);
        } else {
            let dt = m
                .timestamp
                .saturating_duration_since(self.last_update_time)
                .as_secs_f64();
            if dt > 0.0 {
                self.filter.predict(dt);
            }

            let mut z = StateVec::zeros();
            z[0] = m.position.x;
            z[1] = m.position.y;
            z[2] = m.position.z;
            z[3] = m.velocity.x;
            z[4] = m.velocity.y;
            z[5] = m.velocity.z;

            let mut r = StateCov::identity() * DEFAULT_NOISE_VAR;
            r.fixed_view_mut::<3, 3>(0, 0)
                .copy_from(&m.position_covariance);
            r.fixed_view_mut::<3, 3>(3, 3)
                .copy_from(&m.velocity_covariance);

            if let Err(e) = self.filter.update(&z, &r, m.has_velocity) {
                warn!(
                    entity = %self.entity_id,
                    sensor = %m.sensor_kind,
                    "dropping update: {e}"
                );
            }
        }

        self.update_confidence(m.confidence);

        self.recent_sensors.push_back(m.sensor_kind);
        if self.recent_sensors.len() > SENSOR_RING_LEN {
            self.recent_sensors.pop_front();
        }

        self.last_update_time = m.timestamp;
        self.total_measurements += 1;
    }

    /// By-value snapshot of the current fused state, stamped with `now`.
    pub fn snapshot(&self) -> FusedEntityState {
        FusedEntityState {
            entity_id: self.entity_id,
            entity_kind: self.entity_kind,
            position: self.filter.position(),
            velocity: self.filter.velocity(),
            covariance: *self.filter.covariance(),
            confidence: self.base_confidence,
            timestamp: Instant::now(),
            last_update_time: self.last_update_time,
            contributing_sensors: self.recent_sensors.iter().copied().collect(),
            measurement_count: self.total_measurements,
        }
    }

    /// True once the track has gone longer than `max_age` without a
    /// measurement.
    pub fn is_stale(&self, now: Instant, max_age: Duration) -> bool {
        now.saturating_duration_since(self.last_update_time) > max_age
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.creation_time)
    }

    /// Exponentially smooth the sensor-reported quality, then add a
    /// measurement-count bonus, clamped to the ceiling. Uses the count
    /// before this measurement is tallied.
    fn update_confidence(&mut self, measurement_confidence: f64) {
        self.base_confidence = CONFIDENCE_ALPHA * measurement_confidence
            + (1.0 - CONFIDENCE_ALPHA) * self.base_confidence;

        let measurement_bonus = (self.total_measurements as f64 / 100.0).min(0.2);
        self.base_confidence = (self.base_confidence + measurement_bonus).min(CONFIDENCE_CEILING);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
