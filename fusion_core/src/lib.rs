//! `fusion_core` — Multi-sensor entity state fusion.
//!
//! # Module layout
//! - [`types`]      — Fundamental types (IDs, measurements, fused states)
//! - [`error`]      — Error kinds and propagation policy
//! - [`kf`]         — Constant-velocity Kalman filter (predict / update)
//! - [`tracker`]    — Per-entity tracker (filter + bookkeeping)
//! - [`queue`]      — Shutdown-aware measurement queue
//! - [`engine`]     — Fusion engine (demux, workers, stale reaping)
//! - [`interfaces`] — Producer / consumer capability traits
//! - [`system`]     — Lifecycle orchestrator

pub mod engine;
pub mod error;
pub mod interfaces;
pub mod kf;
pub mod queue;
pub mod system;
pub mod tracker;
pub mod types;

pub use engine::{FusionEngine, StateCallback};
pub use error::FusionError;
pub use interfaces::{MeasurementCallback, OutputConsumer, SensorProducer};
pub use system::FusionSystem;
pub use tracker::EntityTracker;
pub use types::{
    EntityId, EntityKind, FusedEntityState, Measurement, Position, SensorKind, StateCov, StateVec,
    Velocity,
};
