//! Fusion engine: demultiplexes the measurement stream into per-entity
//! trackers and periodically publishes fused states.
//!
//! # Threads
//! - The **fusion worker** blocks on the measurement queue and routes each
//!   measurement to the tracker keyed by its entity id, creating trackers
//!   on first sight.
//! - The **output worker** ticks at the configured rate: it reaps stale
//!   trackers, snapshots the live ones, and hands each snapshot to the
//!   output callback outside the trackers lock.
//!
//! Because there is exactly one fusion worker, measurements for the same
//! entity are processed in enqueue order.

use crate::error::FusionError;
use crate::queue::MeasurementQueue;
use crate::tracker::EntityTracker;
use crate::types::{EntityId, EntityKind, FusedEntityState, Measurement};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, trace};

/// Poll granularity of the output worker; also the worst-case latency for
/// it to observe shutdown.
const OUTPUT_POLL: Duration = Duration::from_millis(10);

/// Callback invoked once per fused state per output tick, on the output
/// worker thread. Must not re-enter the engine's tracker registry.
pub type StateCallback = Arc<dyn Fn(&FusedEntityState) + Send + Sync>;

struct EngineConfig {
    /// Tracker eviction threshold.
    stale_timeout: Duration,
    /// Periodic output cadence.
    output_rate_hz: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stale_timeout: Duration::from_secs(10),
            output_rate_hz: 10.0,
        }
    }
}

/// The fusion engine. Shared as `Arc<FusionEngine>` between the
/// orchestrator, the sensor callbacks, and its own worker threads.
pub struct FusionEngine {
    queue: MeasurementQueue<Measurement>,
    trackers: Mutex<HashMap<EntityId, EntityTracker>>,
    output_callback: Mutex<Option<StateCallback>>,
    config: Mutex<EngineConfig>,
    running: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FusionEngine {
    pub fn new() -> Self {
        Self {
            queue: MeasurementQueue::new(),
            trackers: Mutex::new(HashMap::new()),
            output_callback: Mutex::new(None),
            config: Mutex::new(EngineConfig::default()),
            running: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Tracker eviction threshold for the output worker's reaper.
    pub fn set_stale_entity_timeout(&self, timeout: Duration) {
        self.config.lock().expect("config lock poisoned").stale_timeout = timeout;
    }

    /// Periodic output cadence. Must be strictly positive.
    pub fn set_output_rate_hz(&self, rate_hz: f64) {
        assert!(rate_hz > 0.0, "output rate must be strictly positive");
        self.config.lock().expect("config lock poisoned").output_rate_hz = rate_hz;
    }

    /// Install the callback the output worker invokes for every published
    /// state. Set once during configuration.
    pub fn set_output_callback<F>(&self, callback: F)
    where
        F: Fn(&FusedEntityState) + Send + Sync + 'static,
    {
        *self.output_callback.lock().expect("callback lock poisoned") = Some(Arc::new(callback));
    }

    /// Enqueue a measurement. Non-blocking; callable from any thread.
    /// Measurements arriving after shutdown are dropped.
    pub fn ingest(&self, measurement: Measurement) {
        if !self.queue.push(measurement) {
            trace!("measurement dropped: queue shut down");
        }
    }

    /// Spawn the fusion and output workers. Idempotent.
    pub fn start(self: &Arc<Self>) -> Result<(), FusionError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let fusion = {
            let engine = Arc::clone(self);
            thread::Builder::new()
                .name("fusion-worker".into())
                .spawn(move || engine.fusion_worker())?
        };
        let output = {
            let engine = Arc::clone(self);
            thread::Builder::new()
                .name("output-worker".into())
                .spawn(move || engine.output_worker())?
        };
        self.workers
            .lock()
            .expect("workers lock poisoned")
            .extend([fusion, output]);

        info!("fusion engine started");
        Ok(())
    }

    /// Close the queue, wake both workers, and join them. Idempotent.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        self.queue.shutdown();

        let workers = std::mem::take(&mut *self.workers.lock().expect("workers lock poisoned"));
        for handle in workers {
            let _ = handle.join();
        }

        info!("fusion engine stopped");
    }

    /// Mutually-consistent snapshot of every live tracker, taken under a
    /// single lock acquisition.
    pub fn get_all_entity_states(&self) -> Vec<FusedEntityState> {
        let trackers = self.trackers.lock().expect("trackers lock poisoned");
        trackers.values().map(EntityTracker::snapshot).collect()
    }

    /// Number of currently tracked entities.
    pub fn entity_count(&self) -> usize {
        self.trackers.lock().expect("trackers lock poisoned").len()
    }

    fn fusion_worker(self: Arc<Self>) {
        while let Some(m) = self.queue.pop() {
            let mut trackers = self.trackers.lock().expect("trackers lock poisoned");
            let tracker = trackers.entry(m.entity_id).or_insert_with(|| {
                // The measurement record carries no entity kind; new
                // trackers default to VEHICLE.
                info!(entity = %m.entity_id, sensor = %m.sensor_kind, "created new tracker");
                EntityTracker::new(m.entity_id, EntityKind::Vehicle)
            });
            tracker.process_measurement(&m);
        }
        // Queue shut down and drained: normal exit.
    }

    fn output_worker(self: Arc<Self>) {
        let period = {
            let config = self.config.lock().expect("config lock poisoned");
            Duration::from_secs_f64(1.0 / config.output_rate_hz)
        };
        let mut next_output = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= next_output {
                self.reap_stale_trackers(now);

                let states = self.get_all_entity_states();

                // Capture the callback per iteration; invoke outside the
                // trackers lock.
                let callback = self
                    .output_callback
                    .lock()
                    .expect("callback lock poisoned")
                    .clone();
                if let Some(callback) = callback {
                    for state in &states {
                        callback(state);
                    }
                }

                // Best-effort schedule: a slow callback delays the next
                // tick; missed ticks are skipped, not duplicated.
                next_output += period;
                let now = Instant::now();
                if next_output <= now {
                    next_output = now + period;
                }
            }

            thread::sleep(OUTPUT_POLL);
        }
    }

    fn reap_stale_trackers(&self, now: Instant) {
        let stale_timeout = self
            .config
            .lock()
            .expect("config lock poisoned")
            .stale_timeout;
        let mut trackers = self.trackers.lock().expect("trackers lock poisoned");
        trackers.retain(|entity_id, tracker| {
            if tracker.is_stale(now, stale_timeout) {
                info!(entity = %entity_id, "removed stale entity");
                false
            } else {
                true
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
