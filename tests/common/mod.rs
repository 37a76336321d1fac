#![allow(dead_code)]

use std::f64::consts::FRAC_PI_2;

use approx::assert_relative_eq;
use nalgebra::Vector3;
use photodyn::{
    KeplerianElements, LimbDarkening, ModelParameters, NBodyState, PhotometricBody, SystemConfig,
};

pub fn edge_on(a: f64, e: f64, mean_anomaly: f64) -> KeplerianElements {
    KeplerianElements {
        semi_major_axis: a,
        eccentricity: e,
        inclination: FRAC_PI_2,
        periapsis_argument: 0.0,
        ascending_node_longitude: 0.0,
        mean_anomaly,
    }
}

/// Sun-like star with a Jupiter-mass planet on a circular, edge-on orbit at `a = 1`.
pub fn star_planet() -> SystemConfig {
    SystemConfig::new(vec![1.0, 0.001], vec![edge_on(1.0, 0.0, 0.0)], 0.0).unwrap()
}

/// Unit star and a planet of radius 0.1, both without limb darkening.
pub fn star_planet_photometry() -> Vec<PhotometricBody> {
    vec![
        PhotometricBody::new(1.0, 1.0, LimbDarkening::UNIFORM),
        PhotometricBody::new(0.1, 0.0, LimbDarkening::UNIFORM),
    ]
}

pub fn star_planet_model() -> ModelParameters {
    ModelParameters::new(star_planet(), star_planet_photometry())
}

/// Inner binary with a circumbinary planet.
pub fn circumbinary() -> ModelParameters {
    let system = SystemConfig::new(
        vec![1.0, 0.3, 0.001],
        vec![
            KeplerianElements {
                inclination: 1.55,
                ..edge_on(0.2, 0.1, 0.4)
            },
            edge_on(1.1, 0.05, 2.0),
        ],
        0.0,
    )
    .unwrap();
    let photometry = vec![
        PhotometricBody::new(0.05, 0.8, LimbDarkening::new(0.4, 0.2)),
        PhotometricBody::new(0.03, 0.2, LimbDarkening::new(0.5, 0.1)),
        PhotometricBody::new(0.008, 0.0, LimbDarkening::UNIFORM),
    ];
    ModelParameters::new(system, photometry)
}

pub fn period(a: f64, mu: f64) -> f64 {
    std::f64::consts::TAU * (a.powi(3) / mu).sqrt()
}

pub fn relative(state: &NBodyState, body: usize, center: usize) -> Vector3<f64> {
    state.positions()[body] - state.positions()[center]
}

pub fn assert_curves_close(actual: &[f64], expected: &[f64], epsilon: f64) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_relative_eq!(*a, *e, epsilon = epsilon);
    }
}
