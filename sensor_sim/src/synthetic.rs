//! Synthetic sensor producer.
//!
//! Each producer runs a generator thread that observes a set of
//! ground-truth trajectories at a fixed rate with:
//! - Gaussian position noise (per-axis, configurable σ)
//! - Noisy velocity reports for velocity-capable kinds (radar, lidar)
//! - Dropout probability (simulated blind spots / comm loss)
//! - Optional artificial delivery delay interval

use crate::trajectory::EntityTrajectory;
use fusion_core::error::FusionError;
use fusion_core::interfaces::{MeasurementCallback, SensorProducer};
use fusion_core::types::{Measurement, SensorKind, Velocity};
use nalgebra::Matrix3;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::info;

/// Generator tick granularity.
const GENERATOR_POLL: Duration = Duration::from_millis(1);

/// Tunables for one synthetic sensor.
#[derive(Clone, Debug)]
pub struct SensorParams {
    /// Measurement emission rate (Hz)
    pub update_rate_hz: f64,
    /// Position noise standard deviation (meters, per axis)
    pub noise_std: f64,
    /// Probability of skipping an entity on a given tick, in [0, 1]
    pub dropout_probability: f64,
    /// Artificial delivery delay interval (milliseconds); no delay when
    /// `max_delay_ms <= min_delay_ms`
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for SensorParams {
    fn default() -> Self {
        Self {
            update_rate_hz: 1.0,
            noise_std: 1.0,
            dropout_probability: 0.0,
            min_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

/// Sensor's self-reported per-measurement quality, by modality.
fn confidence_for(kind: SensorKind) -> f64 {
    match kind {
        SensorKind::Gps => 0.95,
        SensorKind::Lidar => 0.90,
        SensorKind::Radar => 0.85,
        SensorKind::Vision => 0.75,
        _ => 0.70,
    }
}

/// A threaded synthetic sensor observing ground-truth trajectories.
pub struct SyntheticSensor {
    kind: SensorKind,
    params: SensorParams,
    entities: Vec<EntityTrajectory>,
    callback: Option<MeasurementCallback>,
    seed: u64,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SyntheticSensor {
    pub fn new(kind: SensorKind, params: SensorParams, seed: u64) -> Self {
        Self {
            kind,
            params,
            entities: Vec::new(),
            callback: None,
            seed,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Register a trajectory this sensor observes. Configuration-time only.
    pub fn add_entity(&mut self, trajectory: EntityTrajectory) {
        self.entities.push(trajectory);
    }

    fn generator_loop(
        kind: SensorKind,
        params: SensorParams,
        entities: Vec<EntityTrajectory>,
        callback: Option<MeasurementCallback>,
        noise: Normal<f64>,
        seed: u64,
        running: Arc<AtomicBool>,
    ) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let period = Duration::from_secs_f64(1.0 / params.update_rate_hz);
        let start_time = Instant::now();
        let mut next_update = start_time;

        while running.load(Ordering::SeqCst) {
            let current_time = Instant::now();
            if current_time >= next_update {
                for entity in &entities {
                    if rng.gen::<f64>() < params.dropout_probability {
                        continue;
                    }

                    let m = generate_measurement(
                        kind,
                        &params,
                        entity,
                        current_time,
                        current_time.duration_since(start_time).as_secs_f64(),
                        &noise,
                        &mut rng,
                    );

                    if let Some(callback) = &callback {
                        if params.max_delay_ms > params.min_delay_ms {
                            let delay =
                                rng.gen_range(params.min_delay_ms..=params.max_delay_ms);
                            thread::sleep(Duration::from_millis(delay));
                        }
                        callback(m);
                    }
                }
                next_update += period;
            }
            thread::sleep(GENERATOR_POLL);
        }
    }
}

fn generate_measurement(
    kind: SensorKind,
    params: &SensorParams,
    entity: &EntityTrajectory,
    timestamp: Instant,
    elapsed: f64,
    noise: &Normal<f64>,
    rng: &mut ChaCha8Rng,
) -> Measurement {
    let truth = entity.position_at(elapsed);
    let position = nalgebra::Vector3::new(
        truth.x + noise.sample(rng),
        truth.y + noise.sample(rng),
        truth.z + noise.sample(rng),
    );

    let variance = params.noise_std * params.noise_std;
    let mut m = Measurement {
        entity_id: entity.entity_id,
        sensor_kind: kind,
        timestamp,
        position,
        velocity: Velocity::zeros(),
        has_velocity: false,
        position_covariance: Matrix3::identity() * variance,
        velocity_covariance: Matrix3::identity(),
        confidence: confidence_for(kind),
    };

    if kind.reports_velocity() {
        m.has_velocity = true;
        m.velocity = Velocity::new(
            entity.velocity.x + noise.sample(rng) * 0.1,
            entity.velocity.y + noise.sample(rng) * 0.1,
            entity.velocity.z + noise.sample(rng) * 0.1,
        );
        m.velocity_covariance = Matrix3::identity() * (variance * 0.01);
    }

    m
}

impl SensorProducer for SyntheticSensor {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn set_callback(&mut self, callback: MeasurementCallback) {
        self.callback = Some(callback);
    }

    fn start(&mut self) -> Result<(), FusionError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let noise = Normal::new(0.0, self.params.noise_std).map_err(|e| {
            self.running.store(false, Ordering::SeqCst);
            FusionError::Startup(format!("invalid noise std {}: {e}", self.params.noise_std))
        })?;

        let kind = self.kind;
        let params = self.params.clone();
        let entities = self.entities.clone();
        let callback = self.callback.clone();
        let seed = self.seed;
        let running = Arc::clone(&self.running);

        self.worker = Some(
            thread::Builder::new()
                .name(format!("sensor-{}", kind).to_lowercase())
                .spawn(move || {
                    Self::generator_loop(kind, params, entities, callback, noise, seed, running)
                })?,
        );

        info!(sensor = %self.kind, "started generator");
        Ok(())
    }

    fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        info!(sensor = %self.kind, "stopped generator");
    }
}

impl Drop for SyntheticSensor {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_core::types::{EntityId, EntityKind, Position};
    use std::sync::Mutex;

    fn trajectory(id: u64) -> EntityTrajectory {
        EntityTrajectory {
            entity_id: EntityId(id),
            entity_kind: EntityKind::Vehicle,
            initial_position: Position::new(0.0, 0.0, 0.0),
            velocity: Velocity::new(10.0, 0.0, 0.0),
        }
    }

    fn collecting_sensor(kind: SensorKind, params: SensorParams) -> (SyntheticSensor, Arc<Mutex<Vec<Measurement>>>) {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        let mut sensor = SyntheticSensor::new(kind, params, 42);
        sensor.add_entity(trajectory(101));
        sensor.set_callback(Arc::new(move |m| sink.lock().unwrap().push(m)));
        (sensor, collected)
    }

    #[test]
    fn emits_measurements_at_rate() {
        let (mut sensor, collected) = collecting_sensor(
            SensorKind::Gps,
            SensorParams {
                update_rate_hz: 50.0,
                noise_std: 0.5,
                ..Default::default()
            },
        );
        sensor.start().unwrap();
        thread::sleep(Duration::from_millis(300));
        sensor.stop();

        let measurements = collected.lock().unwrap();
        assert!(measurements.len() >= 5, "got {}", measurements.len());
        for m in measurements.iter() {
            assert_eq!(m.entity_id, EntityId(101));
            assert_eq!(m.sensor_kind, SensorKind::Gps);
            assert!(!m.has_velocity, "GPS is position-only");
        }
    }

    #[test]
    fn radar_reports_velocity() {
        let (mut sensor, collected) = collecting_sensor(
            SensorKind::Radar,
            SensorParams {
                update_rate_hz: 50.0,
                noise_std: 0.5,
                ..Default::default()
            },
        );
        sensor.start().unwrap();
        thread::sleep(Duration::from_millis(200));
        sensor.stop();

        let measurements = collected.lock().unwrap();
        assert!(!measurements.is_empty());
        for m in measurements.iter() {
            assert!(m.has_velocity);
            assert!((m.velocity.x - 10.0).abs() < 2.0);
            assert_eq!(m.confidence, 0.85);
        }
    }

    #[test]
    fn full_dropout_emits_nothing() {
        let (mut sensor, collected) = collecting_sensor(
            SensorKind::Vision,
            SensorParams {
                update_rate_hz: 100.0,
                dropout_probability: 1.0,
                ..Default::default()
            },
        );
        sensor.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        sensor.stop();
        assert!(collected.lock().unwrap().is_empty());
    }

    #[test]
    fn no_callback_after_stop() {
        let (mut sensor, collected) = collecting_sensor(
            SensorKind::Gps,
            SensorParams {
                update_rate_hz: 100.0,
                ..Default::default()
            },
        );
        sensor.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        sensor.stop();

        let count_at_stop = collected.lock().unwrap().len();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(collected.lock().unwrap().len(), count_at_stop);
    }

    #[test]
    fn start_is_idempotent() {
        let (mut sensor, _collected) = collecting_sensor(SensorKind::Gps, SensorParams::default());
        sensor.start().unwrap();
        sensor.start().unwrap();
        sensor.stop();
        sensor.stop();
    }
}
