//! # Goodness of fit
//!
//! Comparison of model curves with observed series carrying Gaussian uncertainties:
//!
//! ```text
//! χ²      = Σ ((d_i − m_i) / σ_i)²
//! χ²_ν    = χ² / ν,        ν = n_data − 1 − n_free
//! ln L    = −½ χ²
//! ```
//!
//! The log-likelihood omits the constant `−½ Σ ln(2π σ_i²)` term, which does not
//! depend on the model parameters.

use serde::{Deserialize, Serialize};

use crate::photodyn_errors::PhotodynError;

/// Observed values `d_i ± σ_i` at times `t_i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedSeries {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
    pub uncertainties: Vec<f64>,
}

impl ObservedSeries {
    /// Build a series, checking lengths and `σ_i > 0`.
    pub fn new(times: Vec<f64>, values: Vec<f64>, uncertainties: Vec<f64>) -> Result<Self, PhotodynError> {
        let series = ObservedSeries {
            times,
            values,
            uncertainties,
        };
        series.validate()?;
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn validate(&self) -> Result<(), PhotodynError> {
        let n = self.times.len();
        for (name, len) in [("values", self.values.len()), ("uncertainties", self.uncertainties.len())] {
            if len != n {
                return Err(PhotodynError::LengthMismatch {
                    name,
                    expected: n,
                    got: len,
                });
            }
        }
        if let Some(sigma) = self
            .uncertainties
            .iter()
            .find(|s| !(s.is_finite() && **s > 0.0))
        {
            return Err(PhotodynError::InvalidParameter(format!(
                "uncertainties must be finite and > 0 (got {sigma})"
            )));
        }
        Ok(())
    }
}

/// `Σ ((d_i − m_i) / σ_i)²` of a model sampled at the series times.
pub fn chi_squared(model: &[f64], observed: &ObservedSeries) -> Result<f64, PhotodynError> {
    observed.validate()?;
    if model.len() != observed.len() {
        return Err(PhotodynError::LengthMismatch {
            name: "model",
            expected: observed.len(),
            got: model.len(),
        });
    }
    Ok(model
        .iter()
        .zip(&observed.values)
        .zip(&observed.uncertainties)
        .map(|((m, d), s)| ((d - m) / s).powi(2))
        .sum())
}

/// `χ² / (n_data − 1 − n_free)`.
///
/// Return
/// ------
/// * [`PhotodynError::InvalidParameter`] when there are no degrees of freedom left.
pub fn reduced_chi_squared(chi_squared: f64, n_data: usize, n_free: usize) -> Result<f64, PhotodynError> {
    let nu = n_data as f64 - 1.0 - n_free as f64;
    if nu <= 0.0 {
        return Err(PhotodynError::InvalidParameter(format!(
            "no degrees of freedom left ({n_data} data points, {n_free} free parameters)"
        )));
    }
    Ok(chi_squared / nu)
}

/// Gaussian log-likelihood `−½ χ²` summed over several (model, series) pairs.
///
/// Typical use is one photometric and one radial-velocity pair.
pub fn ln_likelihood(pairs: &[(&[f64], &ObservedSeries)]) -> Result<f64, PhotodynError> {
    pairs
        .iter()
        .map(|(model, observed)| chi_squared(model, observed))
        .sum::<Result<f64, _>>()
        .map(|chi2| -0.5 * chi2)
}
