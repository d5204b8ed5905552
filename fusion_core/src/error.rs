//! Error types for the fusion core.
//!
//! Numerical problems in a single measurement never halt the engine: a
//! singular innovation covariance drops that update with a warning.
//! Lifecycle failures propagate up to the orchestrator's `start` and abort
//! startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FusionError {
    /// The innovation covariance S = H·P·Hᵀ + R could not be inverted.
    /// The offending measurement is dropped.
    #[error("innovation covariance is singular; measurement dropped")]
    SingularInnovation,

    /// A producer or consumer failed to come up during the start sequence.
    #[error("component failed to start: {0}")]
    Startup(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
