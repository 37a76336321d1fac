//! # Photometric description of the bodies
//!
//! Each body is a uniform-temperature disk of radius `R`, intrinsic flux `F` and a
//! quadratic limb-darkening law
//!
//! ```text
//! I(μ) / I(1) = 1 − u1 (1 − μ) − u2 (1 − μ)²,     μ = √(1 − r²)
//! ```
//!
//! with `r` the normalized distance from the disk center. A body with `R = 0` (or
//! `F = 0`) contributes no light of its own; with `R > 0` it can still occult others.

use serde::{Deserialize, Serialize};

use crate::photodyn_errors::PhotodynError;

/// Quadratic limb-darkening coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LimbDarkening {
    pub u1: f64,
    pub u2: f64,
}

impl LimbDarkening {
    /// Uniform disk (`u1 = u2 = 0`).
    pub const UNIFORM: LimbDarkening = LimbDarkening { u1: 0.0, u2: 0.0 };

    pub fn new(u1: f64, u2: f64) -> Self {
        LimbDarkening { u1, u2 }
    }

    /// Normalized intensity at radius `r ∈ [0, 1]` of the disk.
    #[inline]
    pub fn intensity(&self, r: f64) -> f64 {
        let one_minus_mu = 1.0 - (1.0 - r * r).max(0.0).sqrt();
        1.0 - self.u1 * one_minus_mu - self.u2 * one_minus_mu * one_minus_mu
    }

    /// `∫₀¹ I(r) 2π r dr = π (1 − u1/3 − u2/6)`, the total disk intensity.
    #[inline]
    pub fn total_intensity(&self) -> f64 {
        std::f64::consts::PI * (1.0 - self.u1 / 3.0 - self.u2 / 6.0)
    }
}

/// Radius, intrinsic flux and limb darkening of one body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotometricBody {
    pub radius: f64,
    pub flux: f64,
    #[serde(default)]
    pub limb_darkening: LimbDarkening,
}

impl PhotometricBody {
    pub fn new(radius: f64, flux: f64, limb_darkening: LimbDarkening) -> Self {
        PhotometricBody {
            radius,
            flux,
            limb_darkening,
        }
    }

    /// `true` when the body emits light and has a disk to be occulted.
    #[inline]
    pub fn is_luminous(&self) -> bool {
        self.radius > 0.0 && self.flux > 0.0
    }

    /// Check `R ≥ 0`, `F ≥ 0`, finite limb-darkening coefficients and a positive total
    /// disk intensity `1 − u1/3 − u2/6 > 0`.
    pub fn validate(&self, body: usize) -> Result<(), PhotodynError> {
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(PhotodynError::InvalidParameter(format!(
                "radius of body {body} must be finite and >= 0 (got {})",
                self.radius
            )));
        }
        if !(self.flux.is_finite() && self.flux >= 0.0) {
            return Err(PhotodynError::InvalidParameter(format!(
                "flux of body {body} must be finite and >= 0 (got {})",
                self.flux
            )));
        }
        let LimbDarkening { u1, u2 } = self.limb_darkening;
        if !(u1.is_finite() && u2.is_finite()) {
            return Err(PhotodynError::InvalidParameter(format!(
                "limb-darkening coefficients of body {body} must be finite (got u1 = {u1}, u2 = {u2})"
            )));
        }
        if self.limb_darkening.total_intensity() <= 0.0 {
            return Err(PhotodynError::InvalidParameter(format!(
                "limb darkening of body {body} leaves no light: 1 - u1/3 - u2/6 <= 0 (got u1 = {u1}, u2 = {u2})"
            )));
        }
        Ok(())
    }
}

/// Validate one photometric description per body.
///
/// Return
/// ------
/// * [`PhotodynError::LengthMismatch`] when `bodies.len() != n_bodies`, otherwise the
///   first error of [`PhotometricBody::validate`].
pub fn validate_photometry(bodies: &[PhotometricBody], n_bodies: usize) -> Result<(), PhotodynError> {
    if bodies.len() != n_bodies {
        return Err(PhotodynError::LengthMismatch {
            name: "photometry",
            expected: n_bodies,
            got: bodies.len(),
        });
    }
    bodies
        .iter()
        .enumerate()
        .try_for_each(|(i, body)| body.validate(i))
}

/// Flat-array view of the photometric parameters, one slice per quantity.
#[derive(Debug, Clone, Copy)]
pub struct PhotometryArrays<'a> {
    pub radii: &'a [f64],
    pub fluxes: &'a [f64],
    pub u1: &'a [f64],
    pub u2: &'a [f64],
}

impl PhotometryArrays<'_> {
    /// Gather the slices into one [`PhotometricBody`] per body.
    ///
    /// Return
    /// ------
    /// * [`PhotodynError::LengthMismatch`] if any slice length differs from `radii.len()`,
    ///   or the first validation error.
    pub fn to_bodies(&self) -> Result<Vec<PhotometricBody>, PhotodynError> {
        let n = self.radii.len();
        for (name, len) in [
            ("fluxes", self.fluxes.len()),
            ("u1", self.u1.len()),
            ("u2", self.u2.len()),
        ] {
            if len != n {
                return Err(PhotodynError::LengthMismatch {
                    name,
                    expected: n,
                    got: len,
                });
            }
        }

        let bodies: Vec<PhotometricBody> = (0..n)
            .map(|i| {
                PhotometricBody::new(
                    self.radii[i],
                    self.fluxes[i],
                    LimbDarkening::new(self.u1[i], self.u2[i]),
                )
            })
            .collect();
        validate_photometry(&bodies, n)?;
        Ok(bodies)
    }
}
