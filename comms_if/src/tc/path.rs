//! # Path commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A whole-path replacement. The points are ordered, and the order defines the
/// direction of travel along the path.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PathUpdate {
    /// Frame the points are expressed in, usually the world (map) frame
    pub frame_id: String,

    /// Time the path was issued, in session seconds
    #[serde(default)]
    pub stamp_s: f64,

    /// The path points
    ///
    /// Units: meters
    pub points_m: Vec<[f64; 3]>,
}
