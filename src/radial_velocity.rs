//! # Radial velocity
//!
//! The observer looks down the `−z` axis from `z = +∞`, so a body moving toward the
//! observer has `v_z > 0`. Radial velocities follow the astronomical convention and
//! are positive when the body recedes: `v_r = −v_z`.

use crate::{light_time::ApparentState, photodyn_errors::PhotodynError};

/// Line-of-sight velocity of one body, positive when receding.
///
/// Return
/// ------
/// * `−v_z` of the apparent velocity, or [`PhotodynError::BodyIndexOutOfRange`].
pub fn radial_velocity(apparent: &ApparentState, body_index: usize) -> Result<f64, PhotodynError> {
    apparent
        .velocities
        .get(body_index)
        .map(|v| -v.z)
        .ok_or(PhotodynError::BodyIndexOutOfRange {
            index: body_index,
            n_bodies: apparent.n_bodies(),
        })
}
