//! Capability traits connecting sensor producers and output consumers to
//! the fusion engine.
//!
//! Both sides are polymorphic over small capability sets; there is no
//! deeper hierarchy. The orchestrator installs callbacks before starting
//! either side.

use crate::error::FusionError;
use crate::types::{FusedEntityState, Measurement, SensorKind};
use std::sync::Arc;

/// Callback a producer invokes for every emitted measurement.
pub type MeasurementCallback = Arc<dyn Fn(Measurement) + Send + Sync>;

/// A source of measurements running on its own thread.
///
/// The orchestrator sets the callback before calling `start`. A producer
/// must never invoke the callback after `stop` has returned.
pub trait SensorProducer: Send {
    /// Which sensor modality this producer simulates or wraps.
    fn kind(&self) -> SensorKind;

    fn set_callback(&mut self, callback: MeasurementCallback);

    fn start(&mut self) -> Result<(), FusionError>;

    fn stop(&mut self);
}

/// A sink for fused entity states.
///
/// `publish_state` is called once per entity per output tick, always from
/// the engine's output worker thread. Implementations must be thread-safe
/// but may assume in-order delivery from that single thread. The batched
/// `publish_states` is part of the interface for consumers that can
/// exploit it, even though the periodic output path delivers one state at
/// a time.
pub trait OutputConsumer: Send + Sync {
    fn start(&self) -> Result<(), FusionError>;

    fn stop(&self);

    fn publish_state(&self, state: &FusedEntityState);

    fn publish_states(&self, states: &[FusedEntityState]);
}
