//! Planner and executor interfaces

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use super::CancelToken;
use crate::frames::{Pose, PoseStamped};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A timed sequence of tool poses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    /// Frame the poses are expressed in
    pub frame_id: String,

    pub points: Vec<TrajPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajPoint {
    /// Units: seconds
    pub time_from_start_s: f64,

    pub pose: Pose,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum PlanError {
    #[error("Target is {distance_m:.3} m from the arm base, beyond the reach of {max_reach_m:.3} m")]
    OutOfReach { distance_m: f64, max_reach_m: f64 },

    #[error("Target height {z_m:.3} m is below the minimum of {min_z_m:.3} m")]
    BelowMinHeight { z_m: f64, min_z_m: f64 },

    #[error("Target is in frame {actual:?}, the planner works in {expected:?}")]
    WrongFrame { expected: String, actual: String },

    #[error("Planning failed: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecError {
    #[error("The trajectory is in frame {0:?} which the executor can't follow")]
    WrongFrame(String),

    #[error("The executor aborted: {0}")]
    Aborted(String),
}

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecOutcome {
    Completed,

    /// A newer target arrived before the execution finished
    Cancelled,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A motion planner for the arm.
pub trait Planner: Send {
    /// Plan a trajectory to the full 6 DOF target pose.
    fn plan(&mut self, target: &PoseStamped) -> Result<Trajectory, PlanError>;
}

/// Follows planned trajectories.
pub trait Executor: Send {
    /// Execute the trajectory, blocking until it is complete or cancelled.
    fn execute(
        &mut self,
        trajectory: &Trajectory,
        cancel: &CancelToken,
    ) -> Result<ExecOutcome, ExecError>;
}
