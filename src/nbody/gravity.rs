//! Direct pairwise Newtonian gravity.
//!
//! Every pair `(i, j)` with `i < j` is visited once per evaluation and its
//! contribution is applied to both bodies with opposite signs. No softening is
//! applied: coincident bodies produce non-finite values that the integrator rejects.

use itertools::Itertools;
use nalgebra::Vector3;

/// Acceleration of every body due to all the others.
///
/// Arguments
/// ---------
/// * `masses`: the `N` masses.
/// * `gravitational_constant`: `G`.
/// * `positions`: the `N` positions.
///
/// Return
/// ------
/// * `a_i = Σ_j G m_j (x_j − x_i) / |x_j − x_i|³`
pub fn accelerations(
    masses: &[f64],
    gravitational_constant: f64,
    positions: &[Vector3<f64>],
) -> Vec<Vector3<f64>> {
    let mut acc = vec![Vector3::zeros(); positions.len()];
    for (i, j) in (0..positions.len()).tuple_combinations() {
        let dr = positions[j] - positions[i];
        let r2 = dr.norm_squared();
        let inv_r3 = gravitational_constant / (r2 * r2.sqrt());
        acc[i] += dr * (masses[j] * inv_r3);
        acc[j] -= dr * (masses[i] * inv_r3);
    }
    acc
}

/// Time derivative of the gravitational acceleration of every body.
///
/// ```text
/// j_i = Σ_j G m_j [ Δv / r³ − 3 (Δx · Δv) Δx / r⁵ ],   Δx = x_j − x_i,  Δv = v_j − v_i
/// ```
pub fn jerks(
    masses: &[f64],
    gravitational_constant: f64,
    positions: &[Vector3<f64>],
    velocities: &[Vector3<f64>],
) -> Vec<Vector3<f64>> {
    let mut jerk = vec![Vector3::zeros(); positions.len()];
    for (i, j) in (0..positions.len()).tuple_combinations() {
        let dr = positions[j] - positions[i];
        let dv = velocities[j] - velocities[i];
        let r2 = dr.norm_squared();
        let inv_r3 = gravitational_constant / (r2 * r2.sqrt());
        let pair = (dv - dr * (3.0 * dr.dot(&dv) / r2)) * inv_r3;
        jerk[i] += pair * masses[j];
        jerk[j] -= pair * masses[i];
    }
    jerk
}

/// Total potential energy `−Σ_{i<j} G m_i m_j / r_ij`.
pub fn potential_energy(
    masses: &[f64],
    gravitational_constant: f64,
    positions: &[Vector3<f64>],
) -> f64 {
    (0..positions.len())
        .tuple_combinations()
        .map(|(i, j)| {
            let r = (positions[j] - positions[i]).norm();
            -gravitational_constant * masses[i] * masses[j] / r
        })
        .sum()
}
