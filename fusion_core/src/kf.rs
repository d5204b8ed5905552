//! Kalman filter: predict and update steps for one tracked entity.
//!
//! # Design choices
//! - Linear KF with a constant-velocity (CV) motion model.
//! - All math is done in `f64` via `nalgebra` for numerical stability.
//! - The filter owns its state; one filter instance lives inside each
//!   [`crate::tracker::EntityTracker`].
//!
//! ## State vector
//! x = [px, py, pz, vx, vy, vz]ᵀ  (6-dimensional)
//!
//! ## CV transition model
//! F = I₆ + dt * [[0₃ I₃]; [0₃ 0₃]]
//! i.e. px += vx*dt, etc.
//!
//! ## Process noise Q (discrete white-noise acceleration)
//! Q = q * [[dt⁴/4·I₃, dt³/2·I₃]; [dt³/2·I₃, dt²·I₃]]
//!
//! ## Observation models
//! Position-only sensors observe the first three state components through
//! H = [I₃ | 0]; velocity-reporting sensors observe the full state through
//! H = I₆. The caller selects between them with the `has_velocity` flag.

use crate::error::FusionError;
use crate::types::{DMat, DVec, Position, StateCov, StateVec, Velocity};
use nalgebra::Matrix6;

/// Process noise spectral density (acceleration variance, m²/s⁴).
const PROCESS_NOISE_Q: f64 = 0.5;

/// Prior variance on each state component before the first measurement.
const UNINITIALIZED_VAR: f64 = 100.0;

/// Constant-velocity Kalman filter over a 6-D state.
///
/// Tagged uninitialized until [`KalmanFilter::initialize`] is called; the
/// tracker guarantees exactly one initialization and never predicts before
/// it.
#[derive(Clone, Debug)]
pub struct KalmanFilter {
    state: StateVec,
    covariance: StateCov,
    initialized: bool,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        Self {
            state: StateVec::zeros(),
            covariance: StateCov::identity() * UNINITIALIZED_VAR,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn state(&self) -> &StateVec {
        &self.state
    }

    pub fn covariance(&self) -> &StateCov {
        &self.covariance
    }

    /// Filtered position: the first three state components.
    pub fn position(&self) -> Position {
        Position::new(self.state[0], self.state[1], self.state[2])
    }

    /// Filtered velocity: the last three state components.
    pub fn velocity(&self) -> Velocity {
        Velocity::new(self.state[3], self.state[4], self.state[5])
    }

    /// Set state and covariance and mark the filter initialized.
    pub fn initialize(&mut self, state: StateVec, covariance: StateCov) {
        self.state = state;
        self.covariance = covariance;
        self.initialized = true;
    }

    /// Advance state and covariance by `dt` seconds. A no-op for `dt <= 0`.
    pub fn predict(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let f = Self::transition_matrix(dt);
        let q = Self::process_noise(dt);
        self.state = f * self.state;
        self.covariance = f * self.covariance * f.transpose() + q;
    }

    /// Fold a measurement into the state.
    ///
    /// `z` is the full 6-vector [position; velocity]; when `has_velocity`
    /// is false only its first three components are observed and only the
    /// top-left 3×3 block of `r` is used.
    ///
    /// Returns [`FusionError::SingularInnovation`] (state untouched) when
    /// the innovation covariance cannot be inverted.
    pub fn update(
        &mut self,
        z: &StateVec,
        r: &StateCov,
        has_velocity: bool,
    ) -> Result<(), FusionError> {
        let (h, z_obs, r_obs) = if has_velocity {
            (
                DMat::identity(6, 6),
                DVec::from_iterator(6, z.iter().copied()),
                DMat::from_row_slice(6, 6, r.as_slice()),
            )
        } else {
            let r3 = r.fixed_view::<3, 3>(0, 0);
            (
                Self::observation_position(),
                DVec::from_iterator(3, z.iter().take(3).copied()),
                DMat::from_fn(3, 3, |i, j| r3[(i, j)]),
            )
        };

        let x_dyn = DVec::from_iterator(6, self.state.iter().copied());
        let p_dyn = DMat::from_row_slice(6, 6, self.covariance.as_slice());

        // Innovation: y = z − H·x
        let innovation = &z_obs - &h * &x_dyn;

        // Innovation covariance: S = H·P·Hᵀ + R  (LU for numerical stability)
        let s = &h * &p_dyn * h.transpose() + &r_obs;
        let s_inv = s.lu().try_inverse().ok_or(FusionError::SingularInnovation)?;

        // Kalman gain: K = P·Hᵀ·S⁻¹
        let k = &p_dyn * h.transpose() * &s_inv;

        // Updated state: x' = x + K·y
        let state_update = &k * &innovation;
        self.state = StateVec::from_fn(|row, _| self.state[row] + state_update[row]);

        // Updated covariance: Joseph form P' = (I−KH)·P·(I−KH)ᵀ + K·R·Kᵀ
        let i_kh = DMat::identity(6, 6) - &k * &h;
        let new_p = &i_kh * &p_dyn * i_kh.transpose() + &k * &r_obs * k.transpose();
        self.covariance = StateCov::from_fn(|row, col| new_p[(row, col)]);

        Ok(())
    }

    /// Build state transition matrix F for timestep dt.
    fn transition_matrix(dt: f64) -> Matrix6<f64> {
        let mut f = Matrix6::<f64>::identity();
        // position += velocity * dt
        f[(0, 3)] = dt;
        f[(1, 4)] = dt;
        f[(2, 5)] = dt;
        f
    }

    /// Build process noise matrix Q for timestep dt.
    fn process_noise(dt: f64) -> Matrix6<f64> {
        let q = PROCESS_NOISE_Q;
        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let dt4 = dt3 * dt;

        // Block structure for [pos; vel] with acceleration noise
        let mut qm = Matrix6::<f64>::zeros();
        for i in 0..3usize {
            qm[(i, i)] = q * dt4 / 4.0;
            qm[(i + 3, i + 3)] = q * dt2;
            qm[(i, i + 3)] = q * dt3 / 2.0;
            qm[(i + 3, i)] = q * dt3 / 2.0;
        }
        qm
    }

    /// 3×6 observation matrix for position-only sensors: H = [I₃ | 0].
    fn observation_position() -> DMat {
        let mut h = DMat::zeros(3, 6);
        for i in 0..3 {
            h[(i, i)] = 1.0;
        }
        h
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
