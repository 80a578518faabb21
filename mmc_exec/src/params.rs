//! # Compensation Executable Parameters
//!
//! This module provides parameters for the compensation executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MmcExecParams {
    // ---- FRAMES ----
    /// The world frame paths and base poses are expressed in
    pub world_frame: String,

    /// The mobile base's frame
    pub base_frame: String,

    /// The frame of the arm's mount on the base, which arm targets and end
    /// effector poses are expressed in
    pub arm_base_frame: String,

    /// Length of the transform history kept by the frame tree.
    ///
    /// Units: seconds
    pub frame_cache_time_s: f64,

    /// Maximum time to wait for the transform needed to convert an end
    /// effector pose into the arm base frame.
    ///
    /// Units: seconds
    pub ee_lookup_timeout_s: f64,

    /// Static transforms seeded into the frame tree at startup
    #[serde(default)]
    pub static_transforms: Vec<StaticTransformParams>,

    // ---- EXECUTION ----
    /// Period of the script replay loop.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,
}

/// A fixed transform between two frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticTransformParams {
    pub parent: String,
    pub child: String,

    /// Position of the child frame in the parent frame.
    ///
    /// Units: meters
    pub translation_m: [f64; 3],

    /// Roll, pitch and yaw of the child frame in the parent frame.
    ///
    /// Units: radians
    #[serde(default)]
    pub rotation_rpy_rad: [f64; 3],
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StaticTransformParams {
    pub fn to_isometry(&self) -> Isometry3<f64> {
        let [x, y, z] = self.translation_m;
        let [roll, pitch, yaw] = self.rotation_rpy_rad;

        Isometry3::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }
}
