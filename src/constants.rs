//! # Constants and type aliases for photodyn
//!
//! This module centralizes the **numerical constants**, **default tolerances** and
//! shared by the element converter, the integrator, the light-time
//! solver and the flux model.
//!
//! ## Units
//!
//! The engine performs no unit conversion. Every distance, time and mass must be
//! expressed in one consistent system in which the gravitational constant equals
//! [`DEFAULT_GRAVITATIONAL_CONSTANT`] unless the caller overrides it in
//! [`SystemConfig`](crate::system::SystemConfig). The speed of light used by the
//! light-time correction is a separate parameter; its default ([`VLIGHT_AU`]) assumes
//! AU and days.

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Number of seconds in a Julian day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Astronomical Unit in kilometers (IAU 2012)
pub const AU: f64 = 149_597_870.7;

/// Speed of light in km/s
pub const VLIGHT: f64 = 2.99792458e5;

/// Speed of light in astronomical units per day
pub const VLIGHT_AU: f64 = VLIGHT / AU * SECONDS_PER_DAY;

/// Gravitational constant of the normalized photodynamical unit system
pub const DEFAULT_GRAVITATIONAL_CONSTANT: f64 = 1.0;

// -------------------------------------------------------------------------------------------------
// Integration defaults
// -------------------------------------------------------------------------------------------------

/// Smallest step the integrator may take before declaring a numerical failure
pub const MIN_STEP: f64 = 1.0e-20;

/// Default upper bound on the integration step
pub const DEFAULT_MAX_STEP: f64 = 0.01;

/// Default local error tolerance (relative to the system scale)
pub const DEFAULT_ERROR_TOLERANCE: f64 = 1.0e-12;

/// Default bound on the number of steps taken by a single `advance` call
pub const DEFAULT_MAX_STEPS: u64 = 10_000_000;

/// Default absolute convergence threshold of the light-time iteration
pub const DEFAULT_LIGHT_TIME_TOLERANCE: f64 = 1.0e-14;

/// Default iteration bound of the light-time iteration
pub const DEFAULT_LIGHT_TIME_MAX_ITER: usize = 50;

/// Default number of quadrature nodes per radial segment of the flux integral
pub const DEFAULT_QUADRATURE_NODES: usize = 64;
