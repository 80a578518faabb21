//! # Path frame transformer
//!
//! Converts world frame paths into targets for the arm. The arm's target is the
//! first point of the path expressed relative to the arm's base, with the tool
//! pointing straight down. The whole path is also oriented along its direction
//! of travel for diagnostics (see [`orient_path`]).
//!
//! Paths are validated before any transform is looked up, and a failed lookup
//! produces no target at all.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod orient;
mod params;
mod path;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use nalgebra::Vector3;
use serde::Serialize;

// Internal
use crate::frames::{FrameError, FrameResolver, LookupTime, Pose, PoseStamped};
pub use orient::*;
pub use params::*;
pub use path::*;
use util::time::seconds_to_std;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Transforms paths into arm targets.
pub struct PathFrameTransformer {
    params: Params,
    resolver: FrameResolver,

    /// The frame the arm targets are expressed in
    arm_base_frame: String,
}

/// The result of processing one path.
#[derive(Debug, Clone, Serialize)]
pub struct PathXformOutput {
    /// The arm's target, in the arm base frame
    pub target: PoseStamped,

    /// The path oriented along its direction of travel, in the path's frame
    pub oriented: Vec<PoseStamped>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathXformError {
    #[error("Invalid path: {0}")]
    Path(#[from] PathError),

    #[error("Could not get the arm base position: {0}")]
    Frame(#[from] FrameError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathFrameTransformer {
    pub fn new(params: Params, resolver: FrameResolver, arm_base_frame: &str) -> Self {
        Self {
            params,
            resolver,
            arm_base_frame: arm_base_frame.to_string(),
        }
    }

    /// Process a new path, computing the arm target from its first point.
    ///
    /// `now_s` is the current session time, at which the arm base position is
    /// looked up unless `use_latest_transform` is set.
    pub fn process(&self, path: &Path, now_s: f64) -> Result<PathXformOutput, PathXformError> {
        path.validate()?;

        // Orientation needs a direction, so short paths just have no oriented poses
        let oriented = if path.len() >= 2 {
            orient_path(path, &self.params.path_offset)?
        } else {
            Vec::new()
        };

        let at = match self.params.use_latest_transform {
            true => LookupTime::Latest,
            false => LookupTime::At(now_s),
        };

        let target = match path.first() {
            Some(p) => transform_waypoint(
                p,
                &self.arm_base_frame,
                &path.frame_id,
                &self.resolver,
                at,
                self.params.lookup_timeout_s,
            ),
            None => return Err(PathError::EmptyPath.into()),
        };

        let target = match target {
            Ok(t) => t,
            Err(e) => {
                warn!("No target for path issued at {:.3} s: {}", path.stamp_s, e);
                return Err(e.into());
            }
        };

        debug!(
            "Path of {} points gives target {:?} in {}",
            path.len(),
            target.pose.position_m.as_slice(),
            target.frame_id
        );

        Ok(PathXformOutput { target, oriented })
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Express a world frame target position relative to the arm base.
///
/// The relative position is the difference between the target and the arm
/// base's position in the world frame. The arm base's attitude is not applied.
/// The target attitude is always the fixed tool down attitude.
pub fn transform_waypoint(
    target_world_m: &Vector3<f64>,
    arm_base_frame: &str,
    world_frame: &str,
    resolver: &FrameResolver,
    at: LookupTime,
    timeout_s: f64,
) -> Result<PoseStamped, FrameError> {
    let world_from_arm = resolver.resolve(
        world_frame,
        arm_base_frame,
        at,
        seconds_to_std(timeout_s),
    )?;

    let relative_m = target_world_m - world_from_arm.transform.translation.vector;

    Ok(PoseStamped {
        frame_id: arm_base_frame.to_string(),
        stamp_s: world_from_arm.stamp_s,
        pose: Pose::tool_down(relative_m),
    })
}
