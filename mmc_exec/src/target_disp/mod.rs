//! # Target dispatcher module
//!
//! Hands arm targets to a motion planner and executes the planned
//! trajectories. Planning failures are reported and the dispatcher waits for
//! the next target, there are no automatic retries.
//!
//! The planner and executor are behind the [`Planner`] and [`Executor`]
//! traits. [`LinearPlanner`] and [`SimExecutor`] are in-process versions used
//! by the executable when no external planner is connected.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod diag;
mod intake;
mod params;
mod planner;
mod sim;
mod state;
mod worker;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
pub use diag::*;
pub use intake::*;
pub use params::*;
pub use planner::*;
pub use sim::*;
pub use state::*;
pub use worker::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Operating mode of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DispatchMode {
    /// Accepting targets
    Ready,

    /// A target has been executed and the dispatcher is set to stop after one
    /// success
    Finished,
}

/// The result of dispatching one target.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The target was planned and the trajectory executed
    Accepted(ExecOutcome),

    /// The planner could not find a trajectory to the target
    PlanningFailed(PlanError),

    /// The dispatcher can't act on the target
    Unsupported(String),
}

/// Possible errors that can occur during dispatching.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Execution of the trajectory failed: {0}")]
    ExecutionFailed(#[from] ExecError),

    #[error("The path intake has been closed")]
    IntakeClosed,
}
