//! # N-body dynamical state
//!
//! [`NBodyState`] holds the barycentric positions and velocities of the bodies, the
//! dynamical time they refer to and the bookkeeping of the adaptive integrator
//! (last natural step, last error estimate, cumulative [`IntegrationStats`]).
//!
//! The state is built once from a [`SystemConfig`] and then only moved by
//! [`integrator::advance`]. Derived quantities (momentum, barycenter, energy,
//! angular momentum) are exposed for diagnostics and conservation checks.
//!
//! ## Submodules
//!
//! - [`gravity`] – pairwise accelerations, jerks and potential energy.
//! - [`integrator`] – Gragg–Bulirsch–Stoer propagation with adaptive step control.

use nalgebra::{DVector, Vector3};

use crate::{
    orbit_type::hierarchy::jacobi_to_barycentric, photodyn_errors::PhotodynError,
    system::SystemConfig,
};

pub mod gravity;
pub mod integrator;

pub use integrator::{IntegrationStats, StepControl};

/// Copy of a dynamical state, attached to integration errors as the last valid state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub time: f64,
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
}

/// Mutable Cartesian state of the system, owned by one simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct NBodyState {
    masses: Vec<f64>,
    gravitational_constant: f64,
    time: f64,
    positions: Vec<Vector3<f64>>,
    velocities: Vec<Vector3<f64>>,
    last_step: Option<f64>,
    last_error: f64,
    stats: IntegrationStats,
}

impl NBodyState {
    /// Barycentric state of a validated system at its epoch.
    pub fn from_config(config: &SystemConfig) -> Result<Self, PhotodynError> {
        config.validate()?;
        let (positions, velocities) = jacobi_to_barycentric(
            &config.masses,
            &config.elements,
            config.gravitational_constant,
        )?;
        Ok(NBodyState {
            masses: config.masses.clone(),
            gravitational_constant: config.gravitational_constant,
            time: config.epoch,
            positions,
            velocities,
            last_step: None,
            last_error: 0.0,
            stats: IntegrationStats::default(),
        })
    }

    /// State from explicit Cartesian coordinates.
    ///
    /// The coordinates are used as given: no barycentric shift is applied.
    ///
    /// Return
    /// ------
    /// * [`PhotodynError::LengthMismatch`] when the three vectors differ in length,
    ///   [`PhotodynError::InvalidMass`] or [`PhotodynError::InvalidParameter`] on
    ///   non-finite input.
    pub fn from_cartesian(
        masses: Vec<f64>,
        gravitational_constant: f64,
        time: f64,
        positions: Vec<Vector3<f64>>,
        velocities: Vec<Vector3<f64>>,
    ) -> Result<Self, PhotodynError> {
        let n_bodies = masses.len();
        if n_bodies < 2 {
            return Err(PhotodynError::TooFewBodies(n_bodies));
        }
        for (name, len) in [("positions", positions.len()), ("velocities", velocities.len())] {
            if len != n_bodies {
                return Err(PhotodynError::LengthMismatch {
                    name,
                    expected: n_bodies,
                    got: len,
                });
            }
        }
        if let Some((body, &mass)) = masses
            .iter()
            .enumerate()
            .find(|(_, m)| !(m.is_finite() && **m > 0.0))
        {
            return Err(PhotodynError::InvalidMass { body, mass });
        }
        let finite = positions
            .iter()
            .chain(velocities.iter())
            .all(|v| v.iter().all(|c| c.is_finite()));
        if !finite || !time.is_finite() {
            return Err(PhotodynError::InvalidParameter(
                "Cartesian state and time must be finite".into(),
            ));
        }
        if !(gravitational_constant.is_finite() && gravitational_constant > 0.0) {
            return Err(PhotodynError::InvalidParameter(format!(
                "gravitational constant must be finite and > 0 (got {gravitational_constant})"
            )));
        }
        Ok(NBodyState {
            masses,
            gravitational_constant,
            time,
            positions,
            velocities,
            last_step: None,
            last_error: 0.0,
            stats: IntegrationStats::default(),
        })
    }

    pub fn n_bodies(&self) -> usize {
        self.masses.len()
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn gravitational_constant(&self) -> f64 {
        self.gravitational_constant
    }

    /// Dynamical time of the state.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vector3<f64>] {
        &self.velocities
    }

    /// Magnitude of the last step the controller proposed, `None` before the first call.
    pub fn last_step(&self) -> Option<f64> {
        self.last_step
    }

    /// Scaled error estimate of the last accepted step (≤ 1).
    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    pub fn stats(&self) -> &IntegrationStats {
        &self.stats
    }

    /// Advance (or rewind) the state to `target_time`.
    ///
    /// See [`integrator::advance`].
    pub fn advance_to(&mut self, target_time: f64, control: &StepControl) -> Result<(), PhotodynError> {
        integrator::advance(self, target_time, control)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            time: self.time,
            positions: self.positions.clone(),
            velocities: self.velocities.clone(),
        }
    }

    /// Gravitational acceleration of every body.
    pub fn accelerations(&self) -> Vec<Vector3<f64>> {
        gravity::accelerations(&self.masses, self.gravitational_constant, &self.positions)
    }

    /// Time derivative of the acceleration of every body.
    pub fn jerks(&self) -> Vec<Vector3<f64>> {
        gravity::jerks(
            &self.masses,
            self.gravitational_constant,
            &self.positions,
            &self.velocities,
        )
    }

    pub fn total_momentum(&self) -> Vector3<f64> {
        self.velocities
            .iter()
            .zip(&self.masses)
            .map(|(v, m)| v * *m)
            .sum()
    }

    /// Mass-weighted mean position.
    pub fn barycenter(&self) -> Vector3<f64> {
        let weighted: Vector3<f64> = self
            .positions
            .iter()
            .zip(&self.masses)
            .map(|(r, m)| r * *m)
            .sum();
        weighted / self.masses.iter().sum::<f64>()
    }

    pub fn angular_momentum(&self) -> Vector3<f64> {
        self.positions
            .iter()
            .zip(&self.velocities)
            .zip(&self.masses)
            .map(|((r, v), m)| r.cross(v) * *m)
            .sum()
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.velocities
            .iter()
            .zip(&self.masses)
            .map(|(v, m)| 0.5 * m * v.norm_squared())
            .sum()
    }

    pub fn potential_energy(&self) -> f64 {
        gravity::potential_energy(&self.masses, self.gravitational_constant, &self.positions)
    }

    pub fn total_energy(&self) -> f64 {
        self.kinetic_energy() + self.potential_energy()
    }

    /// Pack the state as `[x_0, …, x_{N−1}, v_0, …, v_{N−1}]`.
    pub(crate) fn to_flat(&self) -> DVector<f64> {
        let n = self.n_bodies();
        DVector::from_fn(6 * n, |k, _| {
            let (block, body, axis) = (k / (3 * n), (k % (3 * n)) / 3, k % 3);
            if block == 0 {
                self.positions[body][axis]
            } else {
                self.velocities[body][axis]
            }
        })
    }

    /// Inverse of [`NBodyState::to_flat`].
    pub(crate) fn set_flat(&mut self, time: f64, y: &DVector<f64>) {
        let n = self.n_bodies();
        for body in 0..n {
            self.positions[body] = y.fixed_rows::<3>(3 * body).into_owned();
            self.velocities[body] = y.fixed_rows::<3>(3 * (n + body)).into_owned();
        }
        self.time = time;
    }

    pub(crate) fn record_step(&mut self, last_step: f64, last_error: f64) {
        self.last_step = Some(last_step);
        self.last_error = last_error;
    }

    pub(crate) fn stats_mut(&mut self) -> &mut IntegrationStats {
        &mut self.stats
    }
}
