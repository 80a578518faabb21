//! Compensation command calculation
//!
//! [`calc_compensation`] is a pure function of its inputs. The rate limit
//! depends on the previous command and is applied separately by the
//! compensator.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Vector2, Vector3};
use serde::Serialize;

use super::VelCompGains;
use crate::{
    frames::Twist,
    jacobian::{induced_velocity, PlanarVel},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A computed compensation command with the intermediate values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Compensation {
    /// Lever arm from the base origin to the end effector
    pub lever_arm_m: Vector2<f64>,

    /// Velocity induced at the end effector by the base
    pub induced_ms: Vector3<f64>,

    /// The command to send to the arm
    pub cmd: Twist,

    /// True if the linear command was scaled down to the speed limit
    pub speed_limited: bool,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Planar lever arm from the base origin to the end effector.
///
/// The end effector position is in the arm mount frame, the mount offset is
/// the mount's position in the base frame.
pub fn lever_arm(ee_position_m: &Vector3<f64>, mount_offset_m: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(ee_position_m.x, ee_position_m.y) + mount_offset_m
}

/// Compute the arm command cancelling the velocity induced by the base.
pub fn calc_compensation(
    base_vel: &PlanarVel,
    ee_position_m: &Vector3<f64>,
    mount_offset_m: &Vector2<f64>,
    gains: &VelCompGains,
) -> Compensation {
    let lever_arm_m = lever_arm(ee_position_m, mount_offset_m);
    let induced_ms = induced_velocity(base_vel, &lever_arm_m);

    let mut linear_ms = -gains.comp_gain * induced_ms;

    // Scale down rather than clamp each axis so the direction is kept
    let speed_ms = linear_ms.norm();
    let speed_limited = speed_ms > gains.linear_speed_limit_ms;
    if speed_limited {
        linear_ms *= gains.linear_speed_limit_ms / speed_ms;
    }

    let angular_rads = Vector3::new(0.0, 0.0, -gains.angular_ff_gain * base_vel.wz_rads);

    Compensation {
        lever_arm_m,
        induced_ms,
        cmd: Twist::new(linear_ms, angular_rads),
        speed_limited,
    }
}

/// Limit the change in linear command from `prev` to `next` over `dt_s`.
///
/// Returns the limited command and whether the limit was active. A limit of
/// zero or a non-positive time step leaves the command unchanged.
pub fn rate_limit(prev: &Twist, next: &Twist, dt_s: f64, accel_limit_ms2: f64) -> (Twist, bool) {
    if accel_limit_ms2 <= 0.0 || dt_s <= 0.0 {
        return (*next, false);
    }

    let delta_ms = next.linear_ms - prev.linear_ms;
    let max_delta_ms = accel_limit_ms2 * dt_s;
    let delta_norm = delta_ms.norm();

    if delta_norm <= max_delta_ms {
        return (*next, false);
    }

    (
        Twist::new(
            prev.linear_ms + delta_ms * (max_delta_ms / delta_norm),
            next.angular_rads,
        ),
        true,
    )
}
