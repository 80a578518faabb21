//! # Manipulator arm data

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{Header, PoseData};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An end effector pose sample. The frame is given explicitly in the header and
/// may be either the world frame or the arm's mount frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EePoseSample {
    pub header: Header,
    pub pose: PoseData,
}

/// Velocity demands sent to the arm's low-level velocity controller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct ArmVelDems {
    /// Stamp of the base velocity sample these demands were computed from
    pub stamp_s: f64,

    /// Linear velocity demand
    ///
    /// Units: meters/second
    pub linear_ms: [f64; 3],

    /// Angular velocity demand
    ///
    /// Units: radians/second
    pub angular_rads: [f64; 3],
}
