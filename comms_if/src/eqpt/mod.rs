//! # Equipment Interface
//!
//! This module defines the data structures exchanged with the mobile base and
//! the manipulator arm.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod arm;
pub mod base;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Header carried by every frame-relative sample.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Header {
    /// Identifier of the frame the data is expressed in
    pub frame_id: String,

    /// Time the sample was taken, in session seconds
    pub stamp_s: f64,
}

/// A position and attitude as sent over the wire.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PoseData {
    /// Position in meters
    pub position_m: [f64; 3],

    /// Attitude quaternion, ordered `[x, y, z, w]`
    pub attitude_q: [f64; 4],
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for PoseData {
    fn default() -> Self {
        Self {
            position_m: [0.0; 3],
            attitude_q: [0.0, 0.0, 0.0, 1.0],
        }
    }
}
