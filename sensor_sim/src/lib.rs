//! `sensor_sim` — Synthetic sensor producers for demonstration and tests.
//!
//! # Module layout
//! - [`trajectory`] — Ground-truth constant-velocity entity trajectories
//! - [`synthetic`]  — Threaded sensor producers with noise, dropouts and
//!   artificial latency

pub mod synthetic;
pub mod trajectory;

pub use synthetic::{SensorParams, SyntheticSensor};
pub use trajectory::EntityTrajectory;
