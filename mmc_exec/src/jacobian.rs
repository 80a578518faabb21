//! # Platform velocity Jacobian
//!
//! Maps the planar velocity of the mobile base onto the linear velocity it
//! induces at a point rigidly attached to the base (the end effector while the
//! arm is holding still relative to the base).
//!
//! For a base velocity `(vx, vy, wz)` expressed in the base frame and a lever
//! arm `r = (rx, ry)` from the base origin to the point, the rigid body relation
//! `v_ee = v_base + w x r` restricted to the horizontal plane gives:
//!
//! ```text
//! | vx_ee |   | 1  0  -ry |   | vx |
//! | vy_ee | = | 0  1   rx | * | vy |
//! | vz_ee |   | 0  0    0 |   | wz |
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Planar velocity of the base in its own frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanarVel {
    /// Units: meters/second
    pub vx_ms: f64,

    /// Units: meters/second
    pub vy_ms: f64,

    /// Units: radians/second
    pub wz_rads: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PlanarVel {
    pub fn new(vx_ms: f64, vy_ms: f64, wz_rads: f64) -> Self {
        Self {
            vx_ms,
            vy_ms,
            wz_rads,
        }
    }

    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.vx_ms, self.vy_ms, self.wz_rads)
    }

    /// Linear part of the velocity lifted into 3D.
    pub fn linear(&self) -> Vector3<f64> {
        Vector3::new(self.vx_ms, self.vy_ms, 0.0)
    }
}

impl From<&comms_if::eqpt::base::BaseVelSample> for PlanarVel {
    fn from(s: &comms_if::eqpt::base::BaseVelSample) -> Self {
        Self::new(s.linear_x_ms, s.linear_y_ms, s.angular_z_rads)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// The Jacobian relating `(vx, vy, wz)` of the base to the linear velocity of
/// a point at `offset_m` from the base origin.
pub fn platform_jacobian(offset_m: &Vector2<f64>) -> Matrix3<f64> {
    Matrix3::new(
        1.0, 0.0, -offset_m.y,
        0.0, 1.0, offset_m.x,
        0.0, 0.0, 0.0,
    )
}

/// Linear velocity induced at `offset_m` by the base moving at `base_vel`.
pub fn induced_velocity(base_vel: &PlanarVel, offset_m: &Vector2<f64>) -> Vector3<f64> {
    platform_jacobian(offset_m) * base_vel.as_vector()
}
