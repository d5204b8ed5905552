//! Lifecycle orchestrator: wires sensor producers, the fusion engine, and
//! output consumers together with deterministic start/stop ordering.
//!
//! # Start order
//! 1. Install the engine's output callback (fans each fused state out to
//!    every registered consumer in registration order).
//! 2. Start the fusion engine.
//! 3. Start output consumers in registration order.
//! 4. For each producer: point its callback at `engine.ingest`, then start
//!    it.
//!
//! # Stop order (reverse of useful data flow)
//! 1. Stop producers (no new measurements).
//! 2. Stop the engine (drains, no more fused states).
//! 3. Stop consumers.
//!
//! A consumer or producer failing to start aborts the sequence and
//! propagates; partial starts are not unwound.

use crate::engine::FusionEngine;
use crate::error::FusionError;
use crate::interfaces::{OutputConsumer, SensorProducer};
use std::sync::Arc;
use tracing::info;

pub struct FusionSystem {
    engine: Arc<FusionEngine>,
    sensors: Vec<Box<dyn SensorProducer>>,
    outputs: Vec<Arc<dyn OutputConsumer>>,
    running: bool,
}

impl FusionSystem {
    pub fn new(engine: Arc<FusionEngine>) -> Self {
        Self {
            engine,
            sensors: Vec::new(),
            outputs: Vec::new(),
            running: false,
        }
    }

    pub fn engine(&self) -> &Arc<FusionEngine> {
        &self.engine
    }

    /// Register a sensor producer. Configuration-time only; the list is
    /// frozen once `start` runs.
    pub fn add_sensor(&mut self, sensor: Box<dyn SensorProducer>) {
        self.sensors.push(sensor);
    }

    /// Register an output consumer. Configuration-time only.
    pub fn add_output(&mut self, output: Arc<dyn OutputConsumer>) {
        self.outputs.push(output);
    }

    /// Bring the whole system up. Idempotent.
    pub fn start(&mut self) -> Result<(), FusionError> {
        if self.running {
            return Ok(());
        }
        info!("starting fusion system");

        let consumers = self.outputs.clone();
        self.engine.set_output_callback(move |state| {
            for consumer in &consumers {
                consumer.publish_state(state);
            }
        });
        self.engine.start()?;

        for output in &self.outputs {
            output.start()?;
        }

        for sensor in &mut self.sensors {
            let engine = Arc::clone(&self.engine);
            sensor.set_callback(Arc::new(move |measurement| engine.ingest(measurement)));
            sensor.start()?;
        }

        self.running = true;
        info!("fusion system started");
        Ok(())
    }

    /// Tear the system down. Idempotent; also invoked on drop.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        info!("stopping fusion system");

        for sensor in &mut self.sensors {
            sensor.stop();
        }

        self.engine.stop();

        for output in &self.outputs {
            output.stop();
        }

        self.running = false;
        info!("fusion system stopped");
    }
}

impl Drop for FusionSystem {
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
    use crate::interfaces::MeasurementCallback;
    use crate::types::{EntityId, FusedEntityState, Measurement, Position, SensorKind};
    use nalgebra::Matrix3;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Producer that emits a fixed burst of measurements from `start`.
    struct BurstProducer {
        entity: u64,
        count: u64,
        callback: Option<MeasurementCallback>,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl SensorProducer for BurstProducer {
        fn kind(&self) -> SensorKind {
            SensorKind::Gps
        }

        fn set_callback(&mut self, callback: MeasurementCallback) {
            self.callback = Some(callback);
        }

        fn start(&mut self) -> Result<(), FusionError> {
            self.events.lock().unwrap().push("producer:start".into());
            let callback = self.callback.as_ref().expect("callback set before start");
            for i in 0..self.count {
                callback(Measurement::position_only(
                    EntityId(self.entity),
                    SensorKind::Gps,
                    Instant::now(),
                    Position::new(i as f64, 0.0, 0.0),
                    Matrix3::identity(),
                    0.9,
                ));
            }
            Ok(())
        }

        fn stop(&mut self) {
            self.events.lock().unwrap().push("producer:stop".into());
        }
    }

    struct RecordingConsumer {
        delivered: AtomicU64,
        fail_start: bool,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl OutputConsumer for RecordingConsumer {
        fn start(&self) -> Result<(), FusionError> {
            self.events.lock().unwrap().push("consumer:start".into());
            if self.fail_start {
                return Err(FusionError::Startup("mock consumer refused".into()));
            }
            Ok(())
        }

        fn stop(&self) {
            self.events.lock().unwrap().push("consumer:stop".into());
        }

        fn publish_state(&self, _state: &FusedEntityState) {
            self.delivered.fetch_add(1, Ordering::SeqCst);
        }

        fn publish_states(&self, states: &[FusedEntityState]) {
            self.delivered
                .fetch_add(states.len() as u64, Ordering::SeqCst);
        }
    }

    fn build_system(
        fail_start: bool,
    ) -> (FusionSystem, Arc<RecordingConsumer>, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let engine = Arc::new(FusionEngine::new());
        engine.set_output_rate_hz(100.0);
        let mut system = FusionSystem::new(engine);

        let consumer = Arc::new(RecordingConsumer {
            delivered: AtomicU64::new(0),
            fail_start,
            events: Arc::clone(&events),
        });
        system.add_output(consumer.clone());
        system.add_sensor(Box::new(BurstProducer {
            entity: 11,
            count: 5,
            callback: None,
            events: Arc::clone(&events),
        }));
        (system, consumer, events)
    }

    #[test]
    fn states_flow_from_producer_to_consumer() {
        let (mut system, consumer, _events) = build_system(false);
        system.start().unwrap();
        std::thread::sleep(Duration::from_millis(150));
        system.stop();

        assert!(consumer.delivered.load(Ordering::SeqCst) > 0);
        assert_eq!(system.engine().entity_count(), 1);
        let states = system.engine().get_all_entity_states();
        assert_eq!(states[0].measurement_count, 5);
    }

    #[test]
    fn start_and_stop_ordering() {
        let (mut system, _consumer, events) = build_system(false);
        system.start().unwrap();
        system.stop();

        let log = events.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "consumer:start",
                "producer:start",
                "producer:stop",
                "consumer:stop"
            ]
        );
    }

    #[test]
    fn start_stop_idempotent() {
        let (mut system, _consumer, events) = build_system(false);
        system.start().unwrap();
        system.start().unwrap();
        system.stop();
        system.stop();

        let log = events.lock().unwrap().clone();
        assert_eq!(log.iter().filter(|e| *e == "producer:start").count(), 1);
        assert_eq!(log.iter().filter(|e| *e == "consumer:stop").count(), 1);
    }

    #[test]
    fn consumer_start_failure_aborts_startup() {
        let (mut system, _consumer, events) = build_system(true);
        let result = system.start();
        assert!(matches!(result, Err(FusionError::Startup(_))));
        // Producers were never started
        let log = events.lock().unwrap().clone();
        assert!(!log.iter().any(|e| e == "producer:start"));
        // Partial starts are not unwound; shut the engine down by hand.
        system.engine().stop();
    }
}
