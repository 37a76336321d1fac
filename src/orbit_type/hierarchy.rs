//! # Hierarchical (Jacobi) initial conditions
//!
//! Body `k ≥ 1` is placed on a Keplerian orbit around the barycenter of bodies
//! `0..k`, with gravitational parameter `G·(m_0 + … + m_k)`. The resulting set of
//! absolute states is then shifted so that the system barycenter sits at the origin
//! with zero momentum.

use nalgebra::Vector3;

use crate::{orbit_type::keplerian_element::KeplerianElements, photodyn_errors::PhotodynError};

/// Barycentric positions and velocities of a hierarchical system.
///
/// Arguments
/// ---------
/// * `masses`: the `N` masses, already validated (> 0).
/// * `elements`: elements of bodies `1..N` (length `N − 1`), already validated.
/// * `gravitational_constant`: `G` of the unit system.
///
/// Return
/// ------
/// * `(positions, velocities)` with Σ mᵢ rᵢ = 0 and Σ mᵢ vᵢ = 0.
pub fn jacobi_to_barycentric(
    masses: &[f64],
    elements: &[KeplerianElements],
    gravitational_constant: f64,
) -> Result<(Vec<Vector3<f64>>, Vec<Vector3<f64>>), PhotodynError> {
    let n_bodies = masses.len();
    if elements.len() + 1 != n_bodies {
        return Err(PhotodynError::LengthMismatch {
            name: "elements",
            expected: n_bodies.saturating_sub(1),
            got: elements.len(),
        });
    }

    let mut positions = vec![Vector3::zeros(); n_bodies];
    let mut velocities = vec![Vector3::zeros(); n_bodies];

    // barycenter of the bodies placed so far
    let mut inner_mass = masses[0];
    let mut inner_pos = Vector3::zeros();
    let mut inner_vel = Vector3::zeros();

    for (k, elem) in elements.iter().enumerate().map(|(i, e)| (i + 1, e)) {
        let mu = gravitational_constant * (inner_mass + masses[k]);
        let (rel_pos, rel_vel) = elem.to_relative_state(mu)?;

        positions[k] = inner_pos + rel_pos;
        velocities[k] = inner_vel + rel_vel;

        let total = inner_mass + masses[k];
        inner_pos = (inner_mass * inner_pos + masses[k] * positions[k]) / total;
        inner_vel = (inner_mass * inner_vel + masses[k] * velocities[k]) / total;
        inner_mass = total;
    }

    for (pos, vel) in positions.iter_mut().zip(velocities.iter_mut()) {
        *pos -= inner_pos;
        *vel -= inner_vel;
    }

    Ok((positions, velocities))
}
