mod common;

use approx::assert_relative_eq;
use nalgebra::Vector3;
use photodyn::{NBodyState, PhotodynError, Simulation, StepControl, SystemConfig};

use crate::common::{circumbinary, edge_on, period, relative, star_planet};

#[test]
fn test_circular_orbit_returns_after_one_period() {
    let mut sim = Simulation::new(star_planet()).unwrap();
    let start = relative(sim.state(), 1, 0);
    let p = period(1.0, 1.001);

    sim.advance_to(p, &StepControl::default()).unwrap();
    assert_relative_eq!(relative(sim.state(), 1, 0), start, epsilon = 1e-8);

    for k in 1..8 {
        let t = p * k as f64 / 8.0;
        sim.advance_to(t, &StepControl::default()).unwrap();
        assert_relative_eq!(relative(sim.state(), 1, 0).norm(), 1.0, epsilon = 1e-9);
    }
}

#[test]
fn test_eccentric_orbit_matches_kepler_solution() {
    let e = 0.6;
    let config = SystemConfig::new(vec![1.0, 0.01], vec![edge_on(1.5, e, 0.3)], 2.0).unwrap();
    let mu = 1.01;
    let mut state = NBodyState::from_config(&config).unwrap();

    let dt = 3.7;
    state
        .advance_to(2.0 + dt, &StepControl::new(0.01, 1e-13))
        .unwrap();

    let mean_motion = (mu / 1.5_f64.powi(3)).sqrt();
    let expected = edge_on(1.5, e, 0.3 + mean_motion * dt)
        .to_relative_state(mu)
        .unwrap();
    assert_relative_eq!(relative(&state, 1, 0), expected.0, epsilon = 1e-9);
    let rel_vel = state.velocities()[1] - state.velocities()[0];
    assert_relative_eq!(rel_vel, expected.1, epsilon = 1e-9);
}

#[test]
fn test_hierarchical_system_conserves_invariants() {
    let model = circumbinary();
    let mut state = NBodyState::from_config(&model.system).unwrap();
    let energy = state.total_energy();
    let angular_momentum = state.angular_momentum();

    state.advance_to(-30.0, &StepControl::default()).unwrap();

    assert_relative_eq!(state.total_momentum(), Vector3::zeros(), epsilon = 1e-12);
    assert_relative_eq!(state.barycenter(), Vector3::zeros(), epsilon = 1e-11);
    assert_relative_eq!(state.total_energy(), energy, max_relative = 1e-9);
    assert_relative_eq!(state.angular_momentum(), angular_momentum, max_relative = 1e-9);
}

#[test]
fn test_near_collision_is_reported() {
    let config = SystemConfig::new(
        vec![1.0, 1.0],
        vec![edge_on(1.0, 1.0 - 1e-14, std::f64::consts::PI)],
        0.0,
    )
    .unwrap();
    let mut sim = Simulation::new(config).unwrap();

    let err = sim
        .advance_to(5.0, &StepControl::new(0.01, 1e-15))
        .unwrap_err();
    assert!(err.is_numerical_failure());
    assert!(matches!(
        err,
        PhotodynError::StepSizeUnderflow { .. } | PhotodynError::MaxStepsExceeded { .. }
    ));
    assert!(sim
        .state()
        .positions()
        .iter()
        .all(|r| r.iter().all(|c| c.is_finite())));
}
