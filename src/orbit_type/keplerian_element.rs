//! # Keplerian orbital elements
//!
//! This module defines the [`KeplerianElements`] struct and its conversion to a relative
//! Cartesian state, the building block of the hierarchical initial condition.
//!
//! ## What are Keplerian elements?
//!
//! The six Keplerian elements are:
//!
//! 1. **a** – Semi-major axis
//! 2. **e** – Eccentricity (unitless)
//! 3. **i** – Inclination (radians)
//! 4. **ω** – Argument of periapsis (radians)
//! 5. **Ω** – Longitude of ascending node (radians)
//! 6. **M** – Mean anomaly at epoch (radians)
//!
//! ## Frame
//!
//! The reference plane is the sky plane (x, y) and +z points toward the observer.
//! An edge-on orbit has `i = π/2`; with `Ω = ω = 0` the body crosses the line of
//! sight in front of its primary at true anomaly `π/2`.
//!
//! ## Degeneracies
//!
//! Circular (`e = 0`) or face-on (`i = 0`) orbits are accepted as-is: ω and Ω simply
//! fix the phase origin. Only bound orbits (`0 ≤ e < 1`, `a > 0`) are supported.

use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    kepler::solve_kepler_equation,
    photodyn_errors::PhotodynError,
};

/// Keplerian orbital elements (osculating, two-body) at the system epoch.
///
/// Units
/// -----
/// * `semi_major_axis`: caller length unit.
/// * `eccentricity`: unitless.
/// * `inclination`, `periapsis_argument`, `ascending_node_longitude`, `mean_anomaly`: radians.
///
/// See also
/// --------
/// * [`KeplerianElements::to_relative_state`] – Conversion to position/velocity.
/// * [`crate::orbit_type::hierarchy`] – How the per-body states are stacked.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct KeplerianElements {
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub periapsis_argument: f64,
    pub ascending_node_longitude: f64,
    pub mean_anomaly: f64,
}

impl KeplerianElements {
    /// Check that the elements describe a bound, finite orbit.
    ///
    /// Arguments
    /// ---------
    /// * `body`: index of the body, used in the error message only.
    ///
    /// Return
    /// ------
    /// * [`PhotodynError::InvalidElements`] on a non-finite value, `a ≤ 0` or `e ∉ [0, 1)`.
    pub fn validate(&self, body: usize) -> Result<(), PhotodynError> {
        let invalid = |reason: String| Err(PhotodynError::InvalidElements { body, reason });

        let values = [
            ("semi_major_axis", self.semi_major_axis),
            ("eccentricity", self.eccentricity),
            ("inclination", self.inclination),
            ("periapsis_argument", self.periapsis_argument),
            ("ascending_node_longitude", self.ascending_node_longitude),
            ("mean_anomaly", self.mean_anomaly),
        ];
        if let Some((name, value)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return invalid(format!("{name} is not finite ({value})"));
        }
        if self.semi_major_axis <= 0.0 {
            return invalid(format!(
                "semi-major axis must be > 0 (got {})",
                self.semi_major_axis
            ));
        }
        if !(0.0..1.0).contains(&self.eccentricity) {
            return invalid(format!(
                "eccentricity must be in [0, 1) for a bound orbit (got {})",
                self.eccentricity
            ));
        }
        Ok(())
    }

    /// Position and velocity relative to the attracting center.
    ///
    /// Solves Kepler's equation for the eccentric anomaly, builds the perifocal unit
    /// vectors `P` and `Q` from (Ω, i, ω) and evaluates
    ///
    /// ```text
    /// r = a (cos E − e) P + a √(1−e²) sin E Q
    /// v = n a / (1 − e cos E) · (−sin E P + √(1−e²) cos E Q),   n = √(μ / a³)
    /// ```
    ///
    /// Arguments
    /// ---------
    /// * `mu`: gravitational parameter `G·(m_center + m_body)`.
    ///
    /// Return
    /// ------
    /// * `(position, velocity)` relative to the center, or the error of
    ///   [`solve_kepler_equation`].
    pub fn to_relative_state(&self, mu: f64) -> Result<(Vector3<f64>, Vector3<f64>), PhotodynError> {
        let a = self.semi_major_axis;
        let e = self.eccentricity;

        let ecc_anom = solve_kepler_equation(self.mean_anomaly, e)?;
        let (sin_e, cos_e) = ecc_anom.sin_cos();
        let beta = (1.0 - e * e).sqrt();

        let (p_vec, q_vec) = self.perifocal_basis();

        let position = a * (cos_e - e) * p_vec + a * beta * sin_e * q_vec;

        let mean_motion = (mu / a.powi(3)).sqrt();
        let v_scale = mean_motion * a / (1.0 - e * cos_e);
        let velocity = v_scale * (-sin_e * p_vec + beta * cos_e * q_vec);

        Ok((position, velocity))
    }

    /// Unit vectors toward periapsis (`P`) and 90° ahead of it in the orbit plane (`Q`).
    fn perifocal_basis(&self) -> (Vector3<f64>, Vector3<f64>) {
        let (sin_node, cos_node) = self.ascending_node_longitude.sin_cos();
        let (sin_peri, cos_peri) = self.periapsis_argument.sin_cos();
        let (sin_inc, cos_inc) = self.inclination.sin_cos();

        let p_vec = Vector3::new(
            cos_node * cos_peri - sin_node * sin_peri * cos_inc,
            sin_node * cos_peri + cos_node * sin_peri * cos_inc,
            sin_peri * sin_inc,
        );
        let q_vec = Vector3::new(
            -cos_node * sin_peri - sin_node * cos_peri * cos_inc,
            -sin_node * sin_peri + cos_node * cos_peri * cos_inc,
            cos_peri * sin_inc,
        );
        (p_vec, q_vec)
    }
}

impl fmt::Display for KeplerianElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rad_to_deg = 180.0 / std::f64::consts::PI;
        writeln!(f, "Keplerian Elements")?;
        writeln!(f, "-------------------------------------------")?;
        writeln!(
            f,
            "  a   (semi-major axis)       = {:.6}",
            self.semi_major_axis
        )?;
        writeln!(
            f,
            "  e   (eccentricity)          = {:.6}",
            self.eccentricity
        )?;
        writeln!(
            f,
            "  i   (inclination)           = {:.6} rad ({:.6}°)",
            self.inclination,
            self.inclination * rad_to_deg
        )?;
        writeln!(
            f,
            "  ω   (argument of periapsis) = {:.6} rad ({:.6}°)",
            self.periapsis_argument,
            self.periapsis_argument * rad_to_deg
        )?;
        writeln!(
            f,
            "  Ω   (longitude of node)     = {:.6} rad ({:.6}°)",
            self.ascending_node_longitude,
            self.ascending_node_longitude * rad_to_deg
        )?;
        writeln!(
            f,
            "  M   (mean anomaly)          = {:.6} rad ({:.6}°)",
            self.mean_anomaly,
            self.mean_anomaly * rad_to_deg
        )
    }
}
