//! # Orbital element representations
//!
//! - [`keplerian_element`] : classical elements `(a, e, i, ω, Ω, M)` of one body and their
//!   conversion to a relative Cartesian state.
//! - [`hierarchy`] : stacking of per-body elements into a barycentric N-body state using
//!   Jacobi (hierarchical) coordinates.
//!
//! ## Typical workflow
//!
//! ```rust
//! use photodyn::orbit_type::{hierarchy::jacobi_to_barycentric, keplerian_element::KeplerianElements};
//!
//! let planet = KeplerianElements {
//!     semi_major_axis: 1.0,
//!     eccentricity: 0.0,
//!     inclination: std::f64::consts::FRAC_PI_2,
//!     periapsis_argument: 0.0,
//!     ascending_node_longitude: 0.0,
//!     mean_anomaly: 0.0,
//! };
//!
//! let (positions, velocities) = jacobi_to_barycentric(&[1.0, 1e-3], &[planet], 1.0).unwrap();
//! assert_eq!(positions.len(), 2);
//! assert_eq!(velocities.len(), 2);
//! ```

/// Classical Keplerian elements structure and utilities.
pub mod keplerian_element;

/// Jacobi-coordinate construction of the barycentric initial state.
pub mod hierarchy;
