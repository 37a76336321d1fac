//! # Gragg–Bulirsch–Stoer integrator
//!
//! One macro step of size `H` is integrated with the modified midpoint rule using
//! `n_k = 2, 4, …, 16` substeps. The results are extrapolated to `h → 0` with an
//! Aitken–Neville tableau in `h²`. After each new row the difference between its last
//! two columns is the local error estimate; the step is accepted as soon as the scaled
//! error drops below one.
//!
//! ## Error scaling
//!
//! The estimate is the largest component difference, divided by
//! `error_tolerance × max_i |x_i|` for positions and `error_tolerance × max_i |v_i|`
//! for velocities. The tolerance is therefore relative to the size of the system.
//!
//! ## Step control
//!
//! * accepted: `H ← H · min(4, 0.94 (0.65 / err)^{1/(2k+1)})`, capped by `max_step`,
//! * rejected: `H ← H · clamp(0.94 (0.65 / err)^{1/(2k+1)}, 0.1, 0.5)`,
//! * a non-finite tableau entry is a rejection,
//! * a rejected step that would fall below `min_step`, or below the resolution of the
//!   current time (`t + H == t`), aborts with [`PhotodynError::StepSizeUnderflow`].
//!
//! The last natural step is remembered in the state and seeds the next call. Steps
//! are truncated so that the integration lands exactly on the target time.

use nalgebra::{DVector, Vector3};
use serde::{Deserialize, Serialize};

use super::{gravity, NBodyState};
use crate::{
    constants::{DEFAULT_ERROR_TOLERANCE, DEFAULT_MAX_STEP, DEFAULT_MAX_STEPS, MIN_STEP},
    photodyn_errors::PhotodynError,
};

/// Substep counts of the extrapolation sequence.
const SUBSTEPS: [usize; 8] = [2, 4, 6, 8, 10, 12, 14, 16];

const SAFETY: f64 = 0.94;
const ERROR_TARGET: f64 = 0.65;
const MAX_GROWTH: f64 = 4.0;
const MAX_SHRINK: f64 = 0.1;
const MIN_SHRINK: f64 = 0.5;

/// Limits of the adaptive step control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepControl {
    /// Upper bound on |H|
    pub max_step: f64,
    /// Relative local error tolerance
    pub error_tolerance: f64,
    /// Lower bound on |H| below which the integration fails
    pub min_step: f64,
    /// Bound on the number of step attempts in one call
    pub max_steps: u64,
}

impl Default for StepControl {
    fn default() -> Self {
        StepControl {
            max_step: DEFAULT_MAX_STEP,
            error_tolerance: DEFAULT_ERROR_TOLERANCE,
            min_step: MIN_STEP,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl StepControl {
    pub fn new(max_step: f64, error_tolerance: f64) -> Self {
        StepControl {
            max_step,
            error_tolerance,
            ..StepControl::default()
        }
    }

    pub fn validate(&self) -> Result<(), PhotodynError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.max_step) {
            return Err(PhotodynError::InvalidParameter(format!(
                "max_step must be finite and > 0 (got {})",
                self.max_step
            )));
        }
        if !positive(self.error_tolerance) {
            return Err(PhotodynError::InvalidParameter(format!(
                "error_tolerance must be finite and > 0 (got {})",
                self.error_tolerance
            )));
        }
        if !positive(self.min_step) || self.min_step > self.max_step {
            return Err(PhotodynError::InvalidParameter(format!(
                "min_step must be > 0 and <= max_step (got {})",
                self.min_step
            )));
        }
        if self.max_steps == 0 {
            return Err(PhotodynError::InvalidParameter(
                "max_steps must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Cumulative counters of an [`NBodyState`]'s integration history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegrationStats {
    pub accepted_steps: u64,
    pub rejected_steps: u64,
    pub force_evaluations: u64,
}

enum StepOutcome {
    Accepted {
        y: DVector<f64>,
        error: f64,
        factor: f64,
    },
    Rejected {
        factor: f64,
    },
}

/// Advance `state` to `target_time`, forward or backward.
///
/// Arguments
/// ---------
/// * `state`: the state to move in place.
/// * `target_time`: dynamical time to reach.
/// * `control`: step limits and tolerance.
///
/// Return
/// ------
/// * `Ok(())` with `state.time() == target_time`.
/// * [`PhotodynError::StepSizeUnderflow`] or [`PhotodynError::MaxStepsExceeded`]; the
///   state is then left at the last accepted step, which is also carried by the error.
/// * [`PhotodynError::InvalidParameter`] for a non-finite target or invalid `control`.
pub fn advance(
    state: &mut NBodyState,
    target_time: f64,
    control: &StepControl,
) -> Result<(), PhotodynError> {
    control.validate()?;
    if !target_time.is_finite() {
        return Err(PhotodynError::InvalidParameter(format!(
            "target time must be finite (got {target_time})"
        )));
    }
    if target_time == state.time() {
        return Ok(());
    }

    let direction = if target_time > state.time() { 1.0 } else { -1.0 };
    let mut h = state
        .last_step()
        .map_or(control.max_step, f64::abs)
        .min(control.max_step);
    let mut last_error = state.last_error();
    let mut t = state.time();
    let mut y = state.to_flat();
    let mut attempts: u64 = 0;

    loop {
        let remaining = target_time - t;
        if remaining == 0.0 || t + remaining == t {
            break;
        }
        if attempts >= control.max_steps {
            state.set_flat(t, &y);
            state.record_step(h, last_error);
            return Err(PhotodynError::MaxStepsExceeded {
                time: t,
                target: target_time,
                max_steps: control.max_steps,
                last_valid: Box::new(state.snapshot()),
            });
        }
        attempts += 1;

        let truncated = h >= remaining.abs();
        let step = if truncated { remaining } else { direction * h };

        match bulirsch_stoer_step(state, &y, step, control.error_tolerance) {
            StepOutcome::Accepted { y: y_new, error, factor } => {
                state.stats_mut().accepted_steps += 1;
                y = y_new;
                t = if truncated { target_time } else { t + step };
                last_error = error;
                if !truncated || factor < 1.0 {
                    h = (step.abs() * factor).min(control.max_step);
                }
            }
            StepOutcome::Rejected { factor } => {
                state.stats_mut().rejected_steps += 1;
                let shrunk = step.abs() * factor;
                if shrunk < control.min_step || t + direction * shrunk == t {
                    state.set_flat(t, &y);
                    state.record_step(h, last_error);
                    return Err(PhotodynError::StepSizeUnderflow {
                        time: t,
                        step: shrunk,
                        min_step: control.min_step,
                        last_valid: Box::new(state.snapshot()),
                    });
                }
                h = shrunk;
            }
        }
    }

    state.set_flat(target_time, &y);
    state.record_step(h, last_error);
    Ok(())
}

/// One extrapolated macro step of signed size `step` from `y`.
fn bulirsch_stoer_step(
    state: &mut NBodyState,
    y: &DVector<f64>,
    step: f64,
    error_tolerance: f64,
) -> StepOutcome {
    let n_bodies = state.n_bodies();
    let (pos_scale, vel_scale) = error_scales(y, n_bodies, error_tolerance);

    let mut previous_row: Vec<DVector<f64>> = Vec::with_capacity(SUBSTEPS.len());
    for (k, &n_k) in SUBSTEPS.iter().enumerate() {
        let mut row = Vec::with_capacity(k + 1);
        row.push(modified_midpoint(state, y, step, n_k));
        for j in 1..=k {
            let ratio = (n_k as f64 / SUBSTEPS[k - j] as f64).powi(2);
            let refined = &row[j - 1] + (&row[j - 1] - &previous_row[j - 1]) / (ratio - 1.0);
            row.push(refined);
        }

        if !row[k].iter().all(|c| c.is_finite()) {
            return StepOutcome::Rejected { factor: MAX_SHRINK };
        }

        if k >= 1 {
            let error = scaled_error(&row[k], &row[k - 1], n_bodies, pos_scale, vel_scale);
            if !error.is_finite() {
                return StepOutcome::Rejected { factor: MAX_SHRINK };
            }
            let exponent = 1.0 / (2 * k + 1) as f64;
            let factor = SAFETY * (ERROR_TARGET / error).powf(exponent);
            if error <= 1.0 {
                return StepOutcome::Accepted {
                    y: row.swap_remove(k),
                    error,
                    factor: factor.min(MAX_GROWTH),
                };
            }
            if k + 1 == SUBSTEPS.len() {
                return StepOutcome::Rejected {
                    factor: factor.clamp(MAX_SHRINK, MIN_SHRINK),
                };
            }
        }
        previous_row = row;
    }

    StepOutcome::Rejected { factor: MIN_SHRINK }
}

/// Modified midpoint rule over `step` with `substeps` evaluations.
fn modified_midpoint(
    state: &mut NBodyState,
    y0: &DVector<f64>,
    step: f64,
    substeps: usize,
) -> DVector<f64> {
    let h = step / substeps as f64;
    let mut z_prev = y0.clone();
    let mut z = y0 + derivatives(state, y0) * h;
    for _ in 1..substeps {
        let z_next = &z_prev + derivatives(state, &z) * (2.0 * h);
        z_prev = std::mem::replace(&mut z, z_next);
    }
    (&z + &z_prev + derivatives(state, &z) * h) * 0.5
}

/// `dy/dt` of the flat state: velocities followed by gravitational accelerations.
fn derivatives(state: &mut NBodyState, y: &DVector<f64>) -> DVector<f64> {
    let n = state.n_bodies();
    let positions: Vec<Vector3<f64>> = (0..n)
        .map(|i| y.fixed_rows::<3>(3 * i).into_owned())
        .collect();
    let acc = gravity::accelerations(state.masses(), state.gravitational_constant(), &positions);
    state.stats_mut().force_evaluations += 1;

    let mut dydt = DVector::zeros(6 * n);
    dydt.rows_mut(0, 3 * n).copy_from(&y.rows(3 * n, 3 * n));
    for (i, a) in acc.iter().enumerate() {
        dydt.fixed_rows_mut::<3>(3 * (n + i)).copy_from(a);
    }
    dydt
}

/// Absolute error scales for positions and velocities.
fn error_scales(y: &DVector<f64>, n_bodies: usize, error_tolerance: f64) -> (f64, f64) {
    let max_norm = |offset: usize| {
        (0..n_bodies)
            .map(|i| y.fixed_rows::<3>(offset + 3 * i).norm())
            .fold(0.0, f64::max)
    };
    let pos = (error_tolerance * max_norm(0)).max(f64::EPSILON);
    let vel = (error_tolerance * max_norm(3 * n_bodies)).max(f64::EPSILON);
    (pos, vel)
}

fn scaled_error(
    a: &DVector<f64>,
    b: &DVector<f64>,
    n_bodies: usize,
    pos_scale: f64,
    vel_scale: f64,
) -> f64 {
    a.iter()
        .zip(b.iter())
        .enumerate()
        .map(|(k, (x, y))| {
            let scale = if k < 3 * n_bodies { pos_scale } else { vel_scale };
            (x - y).abs() / scale
        })
        .fold(0.0, |acc, e| if e.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(e) })
}

#[cfg(test)]
mod integrator_test {
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    use super::*;
    use crate::{orbit_type::keplerian_element::KeplerianElements, system::SystemConfig};

    fn elements(a: f64, e: f64, inc: f64, m: f64) -> KeplerianElements {
        KeplerianElements {
            semi_major_axis: a,
            eccentricity: e,
            inclination: inc,
            periapsis_argument: 0.0,
            ascending_node_longitude: 0.0,
            mean_anomaly: m,
        }
    }

    fn two_body(e: f64, m: f64) -> NBodyState {
        let config =
            SystemConfig::new(vec![1.0, 0.001], vec![elements(1.0, e, FRAC_PI_2, m)], 0.0).unwrap();
        NBodyState::from_config(&config).unwrap()
    }

    fn triple() -> NBodyState {
        let config = SystemConfig::new(
            vec![1.0, 0.3, 0.001],
            vec![elements(0.25, 0.1, 1.5, 0.3), elements(2.0, 0.15, 1.45, 2.0)],
            0.0,
        )
        .unwrap();
        NBodyState::from_config(&config).unwrap()
    }

    fn separation(state: &NBodyState) -> Vector3<f64> {
        state.positions()[1] - state.positions()[0]
    }

    #[test]
    fn test_circular_orbit_period() {
        let mut state = two_body(0.0, 0.0);
        let start = separation(&state);
        let period = 2.0 * PI / 1.001_f64.sqrt();

        state.advance_to(period, &StepControl::default()).unwrap();
        assert_eq!(state.time(), period);
        assert_relative_eq!(separation(&state), start, epsilon = 1e-8);
        assert_relative_eq!(separation(&state).norm(), 1.0, epsilon = 1e-9);

        state.advance_to(0.5 * period, &StepControl::default()).unwrap();
        assert_relative_eq!(separation(&state), -start, epsilon = 1e-8);
    }

    #[test]
    fn test_round_trip() {
        let mut state = triple();
        let initial = state.snapshot();
        let control = StepControl::new(0.05, 1e-12);

        state.advance_to(25.0, &control).unwrap();
        state.advance_to(0.0, &control).unwrap();

        assert_eq!(state.time(), 0.0);
        for i in 0..3 {
            assert_relative_eq!(state.positions()[i], initial.positions[i], epsilon = 1e-7);
            assert_relative_eq!(state.velocities()[i], initial.velocities[i], epsilon = 1e-7);
        }
    }

    #[test]
    fn test_conservation() {
        let mut state = triple();
        let energy = state.total_energy();
        let angular_momentum = state.angular_momentum();

        state.advance_to(40.0, &StepControl::default()).unwrap();

        assert_relative_eq!(state.total_momentum(), Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(state.barycenter(), Vector3::zeros(), epsilon = 1e-11);
        assert_relative_eq!(state.total_energy(), energy, max_relative = 1e-9);
        assert_relative_eq!(state.angular_momentum(), angular_momentum, max_relative = 1e-9);
    }

    #[test]
    fn test_step_bounded_and_reused() {
        let mut state = two_body(0.0, 0.0);
        let control = StepControl::new(0.02, 1e-10);
        state.advance_to(1.0, &control).unwrap();

        let h = state.last_step().unwrap();
        assert!(h > 0.0 && h <= 0.02);
        assert!(state.last_error() <= 1.0);
        let stats = *state.stats();
        assert!(stats.accepted_steps >= 50);
        assert!(stats.force_evaluations > stats.accepted_steps);

        // a zero-length advance does nothing
        state.advance_to(1.0, &control).unwrap();
        assert_eq!(*state.stats(), stats);
    }

    #[test]
    fn test_near_collision_fails_cleanly() {
        // starts at apocenter, pericenter distance ~1e-14
        let mut state = two_body(1.0 - 1e-14, PI);
        let control = StepControl::new(0.01, 1e-15);

        let err = state.advance_to(4.0, &control).unwrap_err();
        assert!(err.is_numerical_failure());
        match err {
            PhotodynError::StepSizeUnderflow { time, last_valid, .. }
            | PhotodynError::MaxStepsExceeded { time, last_valid, .. } => {
                assert_eq!(time, last_valid.time);
                assert!(time < 4.0);
                assert!(last_valid
                    .positions
                    .iter()
                    .chain(last_valid.velocities.iter())
                    .all(|v| v.iter().all(|c| c.is_finite())));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(state.positions().iter().all(|v| v.iter().all(|c| c.is_finite())));
    }

    #[test]
    fn test_invalid_control() {
        let mut state = two_body(0.0, 0.0);
        let control = StepControl {
            max_step: 0.0,
            ..StepControl::default()
        };
        assert!(matches!(
            state.advance_to(1.0, &control),
            Err(PhotodynError::InvalidParameter(_))
        ));
        assert!(state.advance_to(f64::NAN, &StepControl::default()).is_err());
    }
}
