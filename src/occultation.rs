//! # Occultation flux model
//!
//! Computes the flux received from `N` limb-darkened disks projected on the sky plane
//! `(x, y)`, with `z` ordering the bodies along the line of sight (larger `z` is nearer
//! to the observer).
//!
//! For each luminous body `j`, every body `k` with `R_k > 0`, `z_k > z_j` and a projected
//! separation below `R_j + R_k` is an occulter. Distances are normalized by `R_j`; the
//! fraction of light lost is
//!
//! ```text
//!         ∫₀¹ I(r) Θ(r) r dr
//! lost = ─────────────────────,   I(r) = 1 − u1 (1 − μ) − u2 (1 − μ)²,  μ = √(1 − r²)
//!         π (1 − u1/3 − u2/6)
//! ```
//!
//! where `Θ(r)` is the angular measure of the union of the arcs of the circle of radius
//! `r` hidden by the occulters. Overlapping occulters are never subtracted twice.
//!
//! The integrand has kinks at `|s − p|` and `s + p` for each occulter (`s` the normalized
//! separation, `p` the radius ratio). The interval `[0, 1]` is split at these radii and
//! each piece is integrated with the substitution `r = a + (b − a)(1 − cos θ)/2`, which
//! absorbs the square-root behaviour at the break points and at the limb, followed by a
//! Gauss–Legendre rule in `θ ∈ [0, π]`. The integrand is analytic in `θ` on every piece,
//! so the default 64 nodes reach round-off for a single occulter.
//!
//! ## Example
//!
//! ```rust
//! use nalgebra::Vector3;
//! use photodyn::occultation::occult_n;
//! use photodyn::photometry::{LimbDarkening, PhotometricBody};
//!
//! let star = PhotometricBody::new(1.0, 1.0, LimbDarkening::UNIFORM);
//! let planet = PhotometricBody::new(0.1, 0.0, LimbDarkening::UNIFORM);
//!
//! let positions = [Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.2, 0.0, 1.0)];
//! let flux = occult_n(&positions, &[star, planet]).unwrap();
//! assert!((flux - 0.99).abs() < 1e-4);
//! ```

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_QUADRATURE_NODES, DPI},
    photodyn_errors::PhotodynError,
    photometry::{validate_photometry, LimbDarkening, PhotometricBody, PhotometryArrays},
};

/// Geometric relation of a background disk and a nearer disk on the sky plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlapCase {
    /// No overlap
    Disjoint,
    /// The boundaries intersect
    Partial,
    /// The background disk is completely hidden by the nearer one
    BackInsideFront,
    /// The nearer disk lies completely within the background disk
    FrontInsideBack,
}

/// Classify a pair of disks from their projected separation and radii.
pub fn overlap_case(separation: f64, r_back: f64, r_front: f64) -> OverlapCase {
    if separation >= r_back + r_front {
        OverlapCase::Disjoint
    } else if separation + r_back <= r_front {
        OverlapCase::BackInsideFront
    } else if separation + r_front <= r_back {
        OverlapCase::FrontInsideBack
    } else {
        OverlapCase::Partial
    }
}

/// Total flux with the default number of quadrature nodes.
///
/// See [`occult_n_with_nodes`].
pub fn occult_n(
    positions: &[Vector3<f64>],
    bodies: &[PhotometricBody],
) -> Result<f64, PhotodynError> {
    occult_n_with_nodes(positions, bodies, DEFAULT_QUADRATURE_NODES)
}

/// Total flux `Σ_j F_j (1 − lost_j)` of the system.
///
/// Arguments
/// ---------
/// * `positions`: sky-plane `(x, y)` and line-of-sight `z` of each body.
/// * `bodies`: radius, intrinsic flux and limb darkening of each body.
/// * `quadrature_nodes`: Gauss–Legendre nodes per radial segment (> 0).
///
/// Return
/// ------
/// * The summed flux, exactly `Σ F_j` when no disk overlaps a farther one.
/// * [`PhotodynError::LengthMismatch`] if the slices differ in length,
///   [`PhotodynError::InvalidParameter`] if `quadrature_nodes == 0` or a body fails
///   [`PhotometricBody::validate`].
pub fn occult_n_with_nodes(
    positions: &[Vector3<f64>],
    bodies: &[PhotometricBody],
    quadrature_nodes: usize,
) -> Result<f64, PhotodynError> {
    if positions.len() != bodies.len() {
        return Err(PhotodynError::LengthMismatch {
            name: "positions",
            expected: bodies.len(),
            got: positions.len(),
        });
    }
    if quadrature_nodes == 0 {
        return Err(PhotodynError::InvalidParameter(
            "quadrature_nodes must be > 0".into(),
        ));
    }
    validate_photometry(bodies, positions.len())?;

    let rule = GaussLegendre::new(quadrature_nodes);
    let total: f64 = bodies
        .iter()
        .enumerate()
        .filter(|(_, body)| body.flux > 0.0)
        .map(|(j, body)| {
            if body.radius <= 0.0 {
                return body.flux;
            }
            let lost = lost_fraction(j, positions, bodies, &rule);
            body.flux * (1.0 - lost)
        })
        .sum();
    Ok(total)
}

/// Total flux from flat photometric arrays.
pub fn flux(positions: &[Vector3<f64>], photometry: &PhotometryArrays<'_>) -> Result<f64, PhotodynError> {
    let bodies = photometry.to_bodies()?;
    occult_n(positions, &bodies)
}

/// Gauss–Legendre nodes and weights on `[−1, 1]`.
#[derive(Debug, Clone)]
struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    /// Roots of `P_n` by Newton iteration from the Tricomi estimate, symmetric pairs
    /// computed once.
    fn new(n: usize) -> Self {
        const MAX_ITER: usize = 100;
        let mut nodes = vec![0.0; n];
        let mut weights = vec![0.0; n];

        for i in 0..n.div_ceil(2) {
            let mut x = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            for _ in 0..MAX_ITER {
                let (value, slope) = legendre(n, x);
                let delta = value / slope;
                x -= delta;
                if delta.abs() <= 1e-15 {
                    break;
                }
            }
            let derivative = legendre(n, x).1;
            let weight = 2.0 / ((1.0 - x * x) * derivative * derivative);
            nodes[i] = -x;
            nodes[n - 1 - i] = x;
            weights[i] = weight;
            weights[n - 1 - i] = weight;
        }
        GaussLegendre { nodes, weights }
    }
}

/// `(P_n(x), P_n'(x))` from the three-term recurrence.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let (mut p0, mut p1) = (0.0, 1.0);
    for j in 1..=n {
        let j = j as f64;
        (p0, p1) = (p1, ((2.0 * j - 1.0) * x * p1 - (j - 1.0) * p0) / j);
    }
    let n = n as f64;
    (p1, n * (x * p1 - p0) / (x * x - 1.0))
}

/// Occulter expressed in units of the background radius.
#[derive(Debug, Clone, Copy)]
struct Occulter {
    /// center-to-center separation
    s: f64,
    /// radius ratio
    p: f64,
    /// position angle of the occulter seen from the background center
    phi: f64,
}

/// Fraction of the light of body `j` hidden by nearer bodies.
fn lost_fraction(
    j: usize,
    positions: &[Vector3<f64>],
    bodies: &[PhotometricBody],
    rule: &GaussLegendre,
) -> f64 {
    let back = positions[j];
    let r_back = bodies[j].radius;

    let mut occulters = Vec::new();
    for (k, (front, body)) in positions.iter().zip(bodies).enumerate() {
        if k == j || body.radius <= 0.0 || front.z <= back.z {
            continue;
        }
        let dx = front.x - back.x;
        let dy = front.y - back.y;
        let separation = dx.hypot(dy);
        match overlap_case(separation, r_back, body.radius) {
            OverlapCase::Disjoint => {}
            OverlapCase::BackInsideFront => return 1.0,
            OverlapCase::Partial | OverlapCase::FrontInsideBack => occulters.push(Occulter {
                s: separation / r_back,
                p: body.radius / r_back,
                phi: dy.atan2(dx),
            }),
        }
    }
    if occulters.is_empty() {
        return 0.0;
    }

    let ld = &bodies[j].limb_darkening;
    let blocked = integrate_blocked(&occulters, ld, rule);
    (blocked / ld.total_intensity()).clamp(0.0, 1.0)
}

/// `∫₀¹ I(r) Θ(r) r dr`, split at the arc appearance and disappearance radii.
fn integrate_blocked(occulters: &[Occulter], ld: &LimbDarkening, rule: &GaussLegendre) -> f64 {
    let mut breaks = vec![0.0, 1.0];
    for occ in occulters {
        for r in [(occ.s - occ.p).abs(), occ.s + occ.p] {
            if r > 0.0 && r < 1.0 {
                breaks.push(r);
            }
        }
    }
    breaks.sort_by(f64::total_cmp);
    breaks.dedup();

    let half_pi = std::f64::consts::FRAC_PI_2;
    let mut arcs = Vec::with_capacity(2 * occulters.len());

    breaks
        .windows(2)
        .map(|segment| {
            let (a, b) = (segment[0], segment[1]);
            let half = 0.5 * (b - a);
            rule.nodes
                .iter()
                .zip(&rule.weights)
                .map(|(x, w)| {
                    let theta = half_pi * (x + 1.0);
                    let (sin_t, cos_t) = theta.sin_cos();
                    let r = a + half * (1.0 - cos_t);
                    let weight = w * half_pi * half * sin_t;
                    weight * ld.intensity(r) * covered_angle(r, occulters, &mut arcs) * r
                })
                .sum::<f64>()
        })
        .sum()
}

/// Measure of the union of the arcs of the circle of radius `r` inside any occulter.
///
/// `arcs` is scratch space reused across calls.
fn covered_angle(r: f64, occulters: &[Occulter], arcs: &mut Vec<(f64, f64)>) -> f64 {
    arcs.clear();
    for occ in occulters {
        if occ.s == 0.0 {
            if r < occ.p {
                return DPI;
            }
            continue;
        }
        let cos_kappa = (r * r + occ.s * occ.s - occ.p * occ.p) / (2.0 * r * occ.s);
        if cos_kappa <= -1.0 {
            return DPI;
        }
        if cos_kappa >= 1.0 {
            continue;
        }
        let kappa = cos_kappa.acos();
        let start = (occ.phi - kappa).rem_euclid(DPI);
        let end = start + 2.0 * kappa;
        if end > DPI {
            arcs.push((start, DPI));
            arcs.push((0.0, end - DPI));
        } else {
            arcs.push((start, end));
        }
    }
    if arcs.is_empty() {
        return 0.0;
    }

    arcs.sort_by(|x, y| x.0.total_cmp(&y.0));
    let mut covered = 0.0;
    let (mut lo, mut hi) = arcs[0];
    for &(start, end) in arcs.iter().skip(1) {
        if start > hi {
            covered += hi - lo;
            lo = start;
            hi = end;
        } else {
            hi = hi.max(end);
        }
    }
    (covered + hi - lo).min(DPI)
}

#[cfg(test)]
mod occultation_test {
    use approx::assert_relative_eq;

    use super::*;

    fn disk(radius: f64, flux: f64) -> PhotometricBody {
        PhotometricBody::new(radius, flux, LimbDarkening::UNIFORM)
    }

    #[test]
    fn test_overlap_case() {
        assert_eq!(overlap_case(2.0, 1.0, 0.5), OverlapCase::Disjoint);
        assert_eq!(overlap_case(1.0, 1.0, 0.5), OverlapCase::Partial);
        assert_eq!(overlap_case(0.2, 1.0, 0.5), OverlapCase::FrontInsideBack);
        assert_eq!(overlap_case(0.2, 0.5, 1.0), OverlapCase::BackInsideFront);
        assert_eq!(overlap_case(1.5, 1.0, 0.5), OverlapCase::Disjoint);
    }

    #[test]
    fn test_disjoint_baseline() {
        let bodies = [disk(1.0, 0.7), disk(0.5, 0.2), disk(0.1, 0.1)];
        let positions = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(3.0, 0.0, 1.0),
            Vector3::new(0.0, -2.0, 2.0),
        ];
        assert_eq!(occult_n(&positions, &bodies).unwrap(), 0.7 + 0.2 + 0.1);
    }

    #[test]
    fn test_full_occultation() {
        let bodies = [disk(1.0, 1.0), disk(0.3, 0.5)];
        // small body behind the large one
        let positions = [Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.4, 0.2, -1.0)];
        assert_eq!(occult_n(&positions, &bodies).unwrap(), 1.0);
    }

    #[test]
    fn test_uniform_transit_depth() {
        let bodies = [disk(1.0, 1.0), disk(0.1, 0.0)];
        for &x in &[0.0, 0.3, 0.85] {
            let positions = [Vector3::zeros(), Vector3::new(x, 0.0, 1.0)];
            let flux = occult_n(&positions, &bodies).unwrap();
            assert_relative_eq!(flux, 0.99, epsilon = 1e-13);
        }
    }

    /// Area of the intersection of the unit disk with a disk of radius `p` at distance `s`.
    fn lens_area(s: f64, p: f64) -> f64 {
        if s >= 1.0 + p {
            return 0.0;
        }
        if s <= (1.0 - p).abs() {
            return std::f64::consts::PI * p.min(1.0).powi(2);
        }
        let kappa_0 = ((p * p + s * s - 1.0) / (2.0 * p * s)).acos();
        let kappa_1 = ((1.0 - p * p + s * s) / (2.0 * s)).acos();
        let chord = (4.0 * s * s - (1.0 + s * s - p * p).powi(2)).max(0.0).sqrt();
        p * p * kappa_0 + kappa_1 - 0.5 * chord
    }

    #[test]
    fn test_gauss_legendre_rule() {
        for n in [1, 2, 7, 64] {
            let rule = GaussLegendre::new(n);
            assert_relative_eq!(rule.weights.iter().sum::<f64>(), 2.0, epsilon = 1e-13);
            // exact for x⁴ as soon as n ≥ 3
            if n >= 3 {
                let moment: f64 = rule.nodes.iter().zip(&rule.weights).map(|(x, w)| w * x.powi(4)).sum();
                assert_relative_eq!(moment, 0.4, epsilon = 1e-13);
            }
        }
    }

    #[test]
    fn test_uniform_disk_matches_lens_area() {
        for &p in &[0.1, 0.3, 0.6] {
            let bodies = [disk(1.0, 1.0), disk(p, 0.0)];
            for k in 0..=40 {
                let s = k as f64 * (1.0 + p) / 40.0;
                let positions = [Vector3::zeros(), Vector3::new(s, 0.0, 1.0)];
                let flux = occult_n(&positions, &bodies).unwrap();
                let expected = 1.0 - lens_area(s, p) / std::f64::consts::PI;
                assert!(
                    (flux - expected).abs() < 1e-10,
                    "p = {p}, s = {s}: flux {flux}, expected {expected}"
                );
            }
        }
    }

    #[test]
    fn test_limb_darkened_central_transit() {
        let (u1, u2) = (0.4, 0.2);
        let ld = LimbDarkening::new(u1, u2);

        // concentric disks: lost = [F(1) − F(μ_p)] / (1 − u1/3 − u2/6), μ_p = √(1 − p²)
        let primitive = |mu: f64| {
            mu * mu - u1 * (mu * mu - 2.0 * mu.powi(3) / 3.0)
                - u2 * (mu * mu - 4.0 * mu.powi(3) / 3.0 + mu.powi(4) / 2.0)
        };
        for &p in &[0.05, 0.3, 0.6] {
            let bodies = [PhotometricBody::new(1.0, 1.0, ld), disk(p, 0.0)];
            let positions = [Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0)];
            let depth = 1.0 - occult_n(&positions, &bodies).unwrap();
            let mu_p = (1.0 - p * p).sqrt();
            let expected = (primitive(1.0) - primitive(mu_p)) / (1.0 - u1 / 3.0 - u2 / 6.0);
            assert_relative_eq!(depth, expected, epsilon = 1e-12);
        }

        // darker near the limb
        let bodies = [PhotometricBody::new(1.0, 1.0, ld), disk(0.05, 0.0)];
        let center = [Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0)];
        let limb = [Vector3::zeros(), Vector3::new(0.9, 0.0, 1.0)];
        let depth = 1.0 - occult_n(&center, &bodies).unwrap();
        let limb_depth = 1.0 - occult_n(&limb, &bodies).unwrap();
        assert!(limb_depth < depth);
    }

    #[test]
    fn test_limb_darkened_converged_in_nodes() {
        let ld = LimbDarkening::new(0.4, 0.2);
        for &p in &[0.1, 0.3, 0.6] {
            let bodies = [PhotometricBody::new(1.0, 1.0, ld), disk(p, 0.0)];
            for k in 0..25 {
                let s = (k as f64 + 0.5) * (1.0 + p) / 25.0;
                let positions = [Vector3::zeros(), Vector3::new(s, 0.0, 1.0)];
                let default = occult_n(&positions, &bodies).unwrap();
                let reference = occult_n_with_nodes(&positions, &bodies, 512).unwrap();
                assert_relative_eq!(default, reference, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_grazing_transit_partial() {
        let bodies = [disk(1.0, 1.0), disk(0.1, 0.0)];
        let positions = [Vector3::zeros(), Vector3::new(1.0, 0.0, 1.0)];
        let depth = 1.0 - occult_n(&positions, &bodies).unwrap();
        assert!(depth > 0.0 && depth < 0.01);
        // roughly half of the planet overlaps the star
        assert_relative_eq!(depth, 0.005, max_relative = 0.1);
    }

    #[test]
    fn test_front_back_symmetry() {
        let bodies = [disk(0.5, 1.0), disk(0.5, 1.0)];
        let front = [Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.4, 0.3, -1.0)];
        let back = [Vector3::new(0.0, 0.0, -1.0), Vector3::new(0.4, 0.3, 1.0)];
        let f1 = occult_n(&front, &bodies).unwrap();
        let f2 = occult_n(&back, &bodies).unwrap();
        assert!(f1 < 2.0);
        assert_relative_eq!(f1, f2, epsilon = 1e-12);
    }

    #[test]
    fn test_overlapping_occulters_not_double_counted() {
        let bodies = [disk(1.0, 1.0), disk(0.1, 0.0), disk(0.1, 0.0)];
        let single = [
            Vector3::zeros(),
            Vector3::new(0.3, 0.0, 1.0),
            Vector3::new(5.0, 0.0, 2.0),
        ];
        let stacked = [
            Vector3::zeros(),
            Vector3::new(0.3, 0.0, 1.0),
            Vector3::new(0.3, 0.0, 2.0),
        ];
        let apart = [
            Vector3::zeros(),
            Vector3::new(0.3, 0.0, 1.0),
            Vector3::new(-0.3, 0.0, 2.0),
        ];
        let f_single = occult_n(&single, &bodies).unwrap();
        let f_stacked = occult_n(&stacked, &bodies).unwrap();
        let f_apart = occult_n(&apart, &bodies).unwrap();

        assert_relative_eq!(f_stacked, f_single, epsilon = 1e-12);
        assert_relative_eq!(1.0 - f_apart, 2.0 * (1.0 - f_single), epsilon = 1e-13);
    }

    #[test]
    fn test_degeneracies() {
        // zero radius occulter and equal z block nothing
        let bodies = [disk(1.0, 1.0), disk(0.0, 0.3)];
        let positions = [Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0)];
        assert_relative_eq!(occult_n(&positions, &bodies).unwrap(), 1.3, epsilon = 1e-15);

        let bodies = [disk(1.0, 1.0), disk(0.5, 0.0)];
        let positions = [Vector3::zeros(), Vector3::new(0.2, 0.0, 0.0)];
        assert_eq!(occult_n(&positions, &bodies).unwrap(), 1.0);
    }

    #[test]
    fn test_flat_arrays() {
        let arrays = PhotometryArrays {
            radii: &[1.0, 0.1],
            fluxes: &[1.0, 0.0],
            u1: &[0.0, 0.0],
            u2: &[0.0, 0.0],
        };
        let positions = [Vector3::zeros(), Vector3::new(0.2, 0.0, 1.0)];
        assert_relative_eq!(flux(&positions, &arrays).unwrap(), 0.99, epsilon = 1e-13);
        assert!(flux(&positions[..1], &arrays).is_err());
    }

    #[test]
    fn test_limb_darkening_without_light() {
        let dark_limb = PhotometricBody::new(1.0, 1.0, LimbDarkening::new(3.0, 0.0));
        let positions = [Vector3::zeros(), Vector3::new(0.2, 0.0, 1.0)];
        assert!(matches!(
            occult_n(&positions, &[dark_limb, disk(0.1, 0.0)]),
            Err(PhotodynError::InvalidParameter(_))
        ));

        let arrays = PhotometryArrays {
            radii: &[1.0, 0.1],
            fluxes: &[1.0, 0.0],
            u1: &[3.0, 0.0],
            u2: &[0.0, 0.0],
        };
        assert!(flux(&positions, &arrays).is_err());
    }
}
