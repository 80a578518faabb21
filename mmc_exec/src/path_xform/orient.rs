//! # Oriented path preprocessing
//!
//! Turns a path of bare points into a sequence of poses facing along the path.
//! Each interior point is shifted by a fixed rigid offset and given the
//! heading towards the next point. The first and last points have no
//! incoming and outgoing heading respectively and are dropped, so a path of N
//! points gives N - 2 poses.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::{Path, PathError};
use crate::frames::{Pose, PoseStamped};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A rigid offset applied to every point of an oriented path.
///
/// The translation is rotated by the roll/pitch/yaw rotation before being
/// added to each point.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathOffset {
    /// Units: meters
    pub tx: f64,
    pub ty: f64,
    pub tz: f64,

    /// Units: radians
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathOffset {
    /// The offset vector to add to each point.
    pub fn shift_m(&self) -> Vector3<f64> {
        UnitQuaternion::from_euler_angles(self.rx, self.ry, self.rz)
            * Vector3::new(self.tx, self.ty, self.tz)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Orient the points of the path along the direction of travel.
///
/// Fails with `EmptyPath` for no points and `MalformedPath` for a single
/// point. Two points give an empty sequence.
pub fn orient_path(path: &Path, offset: &PathOffset) -> Result<Vec<PoseStamped>, PathError> {
    match path.len() {
        0 => return Err(PathError::EmptyPath),
        1 => {
            return Err(PathError::MalformedPath(
                "a single point has no direction".into(),
            ))
        }
        _ => (),
    }

    let shift_m = offset.shift_m();

    Ok(path
        .points_m
        .windows(2)
        .skip(1)
        .map(|w| {
            let heading_rad = (w[1].y - w[0].y).atan2(w[1].x - w[0].x);

            PoseStamped {
                frame_id: path.frame_id.clone(),
                stamp_s: path.stamp_s,
                pose: Pose::new(
                    w[0] + shift_m,
                    UnitQuaternion::from_euler_angles(0.0, 0.0, heading_rad),
                ),
            }
        })
        .collect())
}
