//! Parameters structure for TargetDispatcher

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the target dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    /// Stop accepting targets once one has been executed successfully
    pub stop_after_success: bool,

    /// Save the targets and paths to the session as JSON
    #[serde(default)]
    pub save_diagnostics: bool,

    /// Period at which the dispatch worker checks whether it should stop.
    ///
    /// Units: seconds
    pub idle_poll_period_s: f64,

    pub planner: LinearPlannerParams,

    pub executor: SimExecutorParams,
}

/// Parameters for the in-process straight line planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearPlannerParams {
    /// Targets further than this from the arm base are unreachable.
    ///
    /// Units: meters
    pub max_reach_m: f64,

    /// Targets lower than this in the arm base frame are rejected.
    ///
    /// Units: meters
    pub min_z_m: f64,

    /// Maximum distance between two trajectory points.
    ///
    /// Units: meters
    pub step_m: f64,

    /// Speed of the tool along the trajectory.
    ///
    /// Units: meters/second
    pub tool_speed_ms: f64,

    /// Tool position assumed when no end effector pose is known.
    ///
    /// Units: meters
    pub home_m: [f64; 3],
}

/// Parameters for the simulated executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExecutorParams {
    /// Multiplier on the trajectory timing, 0 executes instantly
    pub time_scale: f64,

    /// Publish the tool pose to the data store while executing
    #[serde(default)]
    pub publish_ee_pose: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            stop_after_success: true,
            save_diagnostics: false,
            idle_poll_period_s: 0.1,
            planner: LinearPlannerParams::default(),
            executor: SimExecutorParams::default(),
        }
    }
}

impl Default for LinearPlannerParams {
    fn default() -> Self {
        Self {
            max_reach_m: 1.3,
            min_z_m: -0.2,
            step_m: 0.05,
            tool_speed_ms: 0.25,
            home_m: [0.5, 0.0, 0.4],
        }
    }
}

impl Default for SimExecutorParams {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            publish_ee_pose: false,
        }
    }
}
