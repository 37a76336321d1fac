//! # System configuration
//!
//! [`SystemConfig`] is the validated, serializable description of a hierarchical
//! system at its reference epoch: the masses of the `N` bodies, the Keplerian elements
//! of bodies `1..N` and the gravitational constant of the unit system.
//!
//! Host layers that work with flat arrays go through [`ElementArrays`], which mirrors
//! the `(masses[N], a[N], e[N], inc[N], ω[N], Ω[N], M[N], t0)` calling convention.
//! Element arrays may carry `N` entries (slot 0 is a placeholder for the root body and
//! is ignored) or `N − 1` entries (one per orbiting body).
//!
//! ## Example
//!
//! ```rust
//! use photodyn::system::{ElementArrays, SystemConfig};
//!
//! let inc = std::f64::consts::FRAC_PI_2;
//! let config = SystemConfig::from_arrays(&ElementArrays {
//!     masses: &[1.0, 0.001],
//!     semi_major_axes: &[0.0, 1.0],
//!     eccentricities: &[0.0, 0.0],
//!     inclinations: &[0.0, inc],
//!     periapsis_arguments: &[0.0, 0.0],
//!     ascending_node_longitudes: &[0.0, 0.0],
//!     mean_anomalies: &[0.0, 0.0],
//!     epoch: 0.0,
//! })
//! .unwrap();
//!
//! assert_eq!(config.n_bodies(), 2);
//! assert_eq!(config.elements.len(), 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    constants::DEFAULT_GRAVITATIONAL_CONSTANT, orbit_type::keplerian_element::KeplerianElements,
    photodyn_errors::PhotodynError,
};

fn default_gravitational_constant() -> f64 {
    DEFAULT_GRAVITATIONAL_CONSTANT
}

/// Masses and epoch elements of a hierarchical N-body system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Masses of the `N` bodies
    pub masses: Vec<f64>,
    /// Elements of bodies `1..N`, body `k` orbiting the barycenter of bodies `0..k`
    pub elements: Vec<KeplerianElements>,
    /// Reference epoch of the elements
    pub epoch: f64,
    #[serde(default = "default_gravitational_constant")]
    pub gravitational_constant: f64,
}

/// Flat-array view of a system, one slice per element.
#[derive(Debug, Clone, Copy)]
pub struct ElementArrays<'a> {
    pub masses: &'a [f64],
    pub semi_major_axes: &'a [f64],
    pub eccentricities: &'a [f64],
    pub inclinations: &'a [f64],
    pub periapsis_arguments: &'a [f64],
    pub ascending_node_longitudes: &'a [f64],
    pub mean_anomalies: &'a [f64],
    pub epoch: f64,
}

impl SystemConfig {
    /// Build and validate a system with `G = 1`.
    ///
    /// Arguments
    /// ---------
    /// * `masses`: the `N ≥ 2` masses, all finite and > 0.
    /// * `elements`: `N − 1` element sets for bodies `1..N`.
    /// * `epoch`: reference time of the elements.
    ///
    /// Return
    /// ------
    /// * The configuration, or the first validation error encountered.
    pub fn new(
        masses: Vec<f64>,
        elements: Vec<KeplerianElements>,
        epoch: f64,
    ) -> Result<Self, PhotodynError> {
        let config = SystemConfig {
            masses,
            elements,
            epoch,
            gravitational_constant: DEFAULT_GRAVITATIONAL_CONSTANT,
        };
        config.validate()?;
        Ok(config)
    }

    /// Replace the gravitational constant (must be finite and > 0).
    pub fn with_gravitational_constant(mut self, g: f64) -> Result<Self, PhotodynError> {
        self.gravitational_constant = g;
        self.validate()?;
        Ok(self)
    }

    /// Build a system from flat arrays (see the module documentation for the layout).
    pub fn from_arrays(arrays: &ElementArrays<'_>) -> Result<Self, PhotodynError> {
        let n_bodies = arrays.masses.len();
        if n_bodies < 2 {
            return Err(PhotodynError::TooFewBodies(n_bodies));
        }

        let columns = [
            ("semi_major_axes", arrays.semi_major_axes),
            ("eccentricities", arrays.eccentricities),
            ("inclinations", arrays.inclinations),
            ("periapsis_arguments", arrays.periapsis_arguments),
            ("ascending_node_longitudes", arrays.ascending_node_longitudes),
            ("mean_anomalies", arrays.mean_anomalies),
        ];

        let width = arrays.semi_major_axes.len();
        let offset = match width {
            w if w == n_bodies => 1,
            w if w + 1 == n_bodies => 0,
            w => {
                return Err(PhotodynError::LengthMismatch {
                    name: "semi_major_axes",
                    expected: n_bodies,
                    got: w,
                })
            }
        };
        if let Some((name, col)) = columns.iter().find(|(_, col)| col.len() != width) {
            return Err(PhotodynError::LengthMismatch {
                name: *name,
                expected: width,
                got: col.len(),
            });
        }

        let elements = (offset..width)
            .map(|i| KeplerianElements {
                semi_major_axis: arrays.semi_major_axes[i],
                eccentricity: arrays.eccentricities[i],
                inclination: arrays.inclinations[i],
                periapsis_argument: arrays.periapsis_arguments[i],
                ascending_node_longitude: arrays.ascending_node_longitudes[i],
                mean_anomaly: arrays.mean_anomalies[i],
            })
            .collect();

        SystemConfig::new(arrays.masses.to_vec(), elements, arrays.epoch)
    }

    /// Number of bodies `N`.
    pub fn n_bodies(&self) -> usize {
        self.masses.len()
    }

    /// Total mass of the system.
    pub fn total_mass(&self) -> f64 {
        self.masses.iter().sum()
    }

    /// Check the invariants required before any integration.
    ///
    /// Return
    /// ------
    /// * [`PhotodynError::TooFewBodies`] when `N < 2`.
    /// * [`PhotodynError::LengthMismatch`] when `elements.len() != N − 1`.
    /// * [`PhotodynError::InvalidMass`] for a non-finite or non-positive mass.
    /// * [`PhotodynError::InvalidElements`] for an unbound or non-finite orbit.
    /// * [`PhotodynError::InvalidParameter`] for a bad epoch or `G`.
    pub fn validate(&self) -> Result<(), PhotodynError> {
        let n_bodies = self.n_bodies();
        if n_bodies < 2 {
            return Err(PhotodynError::TooFewBodies(n_bodies));
        }
        if self.elements.len() + 1 != n_bodies {
            return Err(PhotodynError::LengthMismatch {
                name: "elements",
                expected: n_bodies - 1,
                got: self.elements.len(),
            });
        }
        if let Some((body, &mass)) = self
            .masses
            .iter()
            .enumerate()
            .find(|(_, m)| !(m.is_finite() && **m > 0.0))
        {
            return Err(PhotodynError::InvalidMass { body, mass });
        }
        for (k, elem) in self.elements.iter().enumerate() {
            elem.validate(k + 1)?;
        }
        if !self.epoch.is_finite() {
            return Err(PhotodynError::InvalidParameter(format!(
                "epoch must be finite (got {})",
                self.epoch
            )));
        }
        if !(self.gravitational_constant.is_finite() && self.gravitational_constant > 0.0) {
            return Err(PhotodynError::InvalidParameter(format!(
                "gravitational constant must be finite and > 0 (got {})",
                self.gravitational_constant
            )));
        }
        Ok(())
    }
}
