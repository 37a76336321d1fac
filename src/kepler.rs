use std::f64::consts::PI;

use super::constants::DPI;
use crate::photodyn_errors::PhotodynError;

/// Solve Kepler's equation `M = E − e·sin(E)` for the eccentric anomaly `E`.
///
/// Newton–Raphson on the reduced mean anomaly, started from `M + e·sin(M)` for
/// moderate eccentricities and from `π` for `e > 0.8`, where the first guess is known
/// to overshoot. The returned anomaly is continuous with the input: the number of
/// full revolutions contained in `mean_anomaly` is added back.
///
/// Arguments
/// ---------
/// * `mean_anomaly`: mean anomaly `M` (radians, any value).
/// * `eccentricity`: `0 ≤ e < 1`.
///
/// Return
/// ------
/// * The eccentric anomaly `E` in radians, or [`PhotodynError::KeplerNotConverged`]
///   when the iteration fails to reach machine precision.
pub fn solve_kepler_equation(mean_anomaly: f64, eccentricity: f64) -> Result<f64, PhotodynError> {
    const MAX_ITER: usize = 50;
    let tol = 4.0 * f64::EPSILON;

    if eccentricity == 0.0 {
        return Ok(mean_anomaly);
    }

    let revolutions = (mean_anomaly / DPI).floor();
    let m = mean_anomaly - revolutions * DPI;

    let mut ecc_anom = if eccentricity > 0.8 {
        PI
    } else {
        m + eccentricity * m.sin()
    };

    for _ in 0..MAX_ITER {
        let f = ecc_anom - eccentricity * ecc_anom.sin() - m;
        let fp = 1.0 - eccentricity * ecc_anom.cos();
        let delta = f / fp;
        ecc_anom -= delta;
        if delta.abs() <= tol * (1.0 + ecc_anom.abs()) {
            return Ok(ecc_anom + revolutions * DPI);
        }
    }

    Err(PhotodynError::KeplerNotConverged {
        mean_anomaly,
        eccentricity,
    })
}

#[cfg(test)]
mod kepler_test {
    use super::*;

    #[test]
    fn test_kepler_circular_is_identity() {
        assert_eq!(solve_kepler_equation(1.234, 0.0).unwrap(), 1.234);
    }

    #[test]
    fn test_kepler_equation_residual() {
        for &e in &[0.01, 0.3, 0.7, 0.95, 0.999] {
            for k in 0..24 {
                let m = -7.0 + k as f64 * 0.61;
                let ecc_anom = solve_kepler_equation(m, e).unwrap();
                let residual = ecc_anom - e * ecc_anom.sin() - m;
                assert!(residual.abs() < 1e-12, "e = {e}, M = {m}, residual = {residual:e}");
            }
        }
    }
}
