//! # Mobile base data

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{Header, PoseData};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A planar velocity sample of the mobile base, expressed in the base's own frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct BaseVelSample {
    /// Time the sample was taken, in session seconds
    pub stamp_s: f64,

    /// Forward velocity
    ///
    /// Units: meters/second
    pub linear_x_ms: f64,

    /// Lateral velocity
    ///
    /// Units: meters/second
    pub linear_y_ms: f64,

    /// Yaw rate
    ///
    /// Units: radians/second
    pub angular_z_rads: f64,
}

/// A pose sample of the mobile base in the world (map) frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BasePoseSample {
    pub header: Header,
    pub pose: PoseData,
}
