//! # Light-time (Rømer) correction
//!
//! The observer sits at infinity along `+z` and observation times are referenced to
//! the arrival of light at the system barycenter. Light emitted by a body at height
//! `z` reaches the observer `z / c` earlier than light emitted at the barycenter, so
//! the emission time of the light seen at `t_obs` satisfies
//!
//! ```text
//! t_e = t_obs + z(t_e) / c
//! ```
//!
//! For every body the delay `τ = t_e − t_obs` is found by fixed-point iteration
//! `τ ← z(t_s + δ + τ) / c`, where `t_s` is the dynamical time of the state,
//! `δ = t_obs − t_s`, and `z(t)` is the third-order Taylor expansion of the body's
//! trajectory around `t_s` (position, velocity, gravitational acceleration and jerk).
//! The iteration contracts by `v_z / c` per pass and stops when `|Δτ| ≤ tolerance`.
//!
//! The expansion is only trusted over one integrator step: `|δ|` may not exceed the
//! last step recorded in the state, and a state that was never advanced must sit
//! exactly at `t_obs`. Larger gaps are rejected with [`PhotodynError::StaleState`];
//! advance the state first.
//!
//! The state itself is never modified: the result is a separate [`ApparentState`].

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_LIGHT_TIME_MAX_ITER, DEFAULT_LIGHT_TIME_TOLERANCE, VLIGHT_AU},
    nbody::NBodyState,
    photodyn_errors::PhotodynError,
};

/// Parameters of the light-time iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightTimeParams {
    /// Speed of light in the caller's units, `f64::INFINITY` disables the correction
    pub speed_of_light: f64,
    /// Absolute convergence threshold on the delay
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for LightTimeParams {
    fn default() -> Self {
        LightTimeParams {
            speed_of_light: VLIGHT_AU,
            tolerance: DEFAULT_LIGHT_TIME_TOLERANCE,
            max_iterations: DEFAULT_LIGHT_TIME_MAX_ITER,
        }
    }
}

impl LightTimeParams {
    /// Parameters that turn the correction off.
    pub fn disabled() -> Self {
        LightTimeParams {
            speed_of_light: f64::INFINITY,
            ..LightTimeParams::default()
        }
    }

    pub fn validate(&self) -> Result<(), PhotodynError> {
        if self.speed_of_light.is_nan() || self.speed_of_light <= 0.0 {
            return Err(PhotodynError::InvalidParameter(format!(
                "speed_of_light must be > 0 (got {})",
                self.speed_of_light
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(PhotodynError::InvalidParameter(format!(
                "light-time tolerance must be finite and > 0 (got {})",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(PhotodynError::InvalidParameter(
                "light-time max_iterations must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Light-time corrected positions and velocities as seen at one observation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ApparentState {
    pub observation_time: f64,
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    /// Per-body delay `τ = t_e − t_obs`
    pub delays: Vec<f64>,
}

impl ApparentState {
    pub fn n_bodies(&self) -> usize {
        self.positions.len()
    }
}

/// Apparent state of every body at `observation_time`.
///
/// Arguments
/// ---------
/// * `state`: dynamical state, advanced to within one step of `observation_time`.
/// * `observation_time`: barycentric arrival time of the light.
/// * `params`: speed of light and iteration controls.
///
/// Return
/// ------
/// * The [`ApparentState`].
/// * [`PhotodynError::StaleState`] when `|observation_time − state.time()|` exceeds
///   the last step of the state.
/// * [`PhotodynError::LightTimeNotConverged`] for the first body whose delay fails to
///   settle within `params.max_iterations`.
pub fn corrected_state(
    state: &NBodyState,
    observation_time: f64,
    params: &LightTimeParams,
) -> Result<ApparentState, PhotodynError> {
    params.validate()?;
    let offset = observation_time - state.time();
    let max_offset = state.last_step().map_or(0.0, f64::abs);
    if !(offset.abs() <= max_offset) {
        return Err(PhotodynError::StaleState {
            state_time: state.time(),
            observation_time,
            max_offset,
        });
    }

    if params.speed_of_light.is_infinite() && offset == 0.0 {
        return Ok(ApparentState {
            observation_time,
            positions: state.positions().to_vec(),
            velocities: state.velocities().to_vec(),
            delays: vec![0.0; state.n_bodies()],
        });
    }

    let accelerations = state.accelerations();
    let jerks = state.jerks();

    let n_bodies = state.n_bodies();
    let mut apparent = ApparentState {
        observation_time,
        positions: Vec::with_capacity(n_bodies),
        velocities: Vec::with_capacity(n_bodies),
        delays: Vec::with_capacity(n_bodies),
    };

    for body in 0..n_bodies {
        let taylor = Taylor {
            x: state.positions()[body],
            v: state.velocities()[body],
            a: accelerations[body],
            j: jerks[body],
        };
        let delay = solve_delay(&taylor, offset, params).map_err(|(iterations, residual)| {
            PhotodynError::LightTimeNotConverged {
                body,
                observation_time,
                iterations,
                residual,
            }
        })?;
        let dt = offset + delay;
        apparent.positions.push(taylor.position(dt));
        apparent.velocities.push(taylor.velocity(dt));
        apparent.delays.push(delay);
    }

    Ok(apparent)
}

/// Third-order expansion of one trajectory around the state time.
struct Taylor {
    x: Vector3<f64>,
    v: Vector3<f64>,
    a: Vector3<f64>,
    j: Vector3<f64>,
}

impl Taylor {
    fn position(&self, dt: f64) -> Vector3<f64> {
        self.x + dt * (self.v + dt * (0.5 * self.a + dt / 6.0 * self.j))
    }

    fn velocity(&self, dt: f64) -> Vector3<f64> {
        self.v + dt * (self.a + 0.5 * dt * self.j)
    }

    fn height(&self, dt: f64) -> f64 {
        self.x.z + dt * (self.v.z + dt * (0.5 * self.a.z + dt / 6.0 * self.j.z))
    }
}

/// Fixed-point solution of `τ = z(δ + τ) / c`; on failure returns `(iterations, |Δτ|)`.
fn solve_delay(taylor: &Taylor, offset: f64, params: &LightTimeParams) -> Result<f64, (usize, f64)> {
    if params.speed_of_light.is_infinite() {
        return Ok(0.0);
    }
    let mut delay = 0.0;
    let mut residual = f64::INFINITY;
    for _ in 0..params.max_iterations {
        let next = taylor.height(offset + delay) / params.speed_of_light;
        residual = (next - delay).abs();
        delay = next;
        if residual <= params.tolerance {
            return Ok(delay);
        }
    }
    Err((params.max_iterations, residual))
}
