//! # Velocity compensator module
//!
//! Cancels the motion the mobile base induces at the end effector. Each base
//! velocity sample is mapped through the platform Jacobian at the current lever
//! arm (end effector position plus the static base to arm mount offset), and the
//! negated induced velocity is commanded to the arm's velocity controller.
//!
//! The static offset is resolved once during [`State::init`](util::module::State)
//! and the compensator refuses to produce any command before it is known.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calc;
mod gains;
mod params;
mod state;
mod worker;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use crate::frames::FrameError;
pub use calc::*;
pub use gains::*;
pub use params::*;
pub use state::*;
pub use worker::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Operating mode of the compensator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VelCompMode {
    /// The static offset hasn't been resolved, no commands are produced
    AwaitingOffset,

    /// Compensating every base velocity sample
    Running,
}

/// Possible errors that can occur during VelComp operation.
#[derive(Debug, thiserror::Error)]
pub enum VelCompError {
    #[error("Could not resolve the static base to arm mount offset after {attempts} attempts: {last}")]
    OffsetUnresolved { attempts: usize, last: FrameError },

    #[error("The compensator is not running (mode {0:?})")]
    NotRunning(VelCompMode),

    #[error("No end effector pose has been received")]
    NoEePose,

    #[error("End effector pose is in frame {actual:?}, expected {expected:?}")]
    WrongEeFrame { expected: String, actual: String },

    #[error("Base velocity sample contains non-finite values")]
    InvalidSample,

    #[error("Could not read the compensation gains: {0}")]
    Gains(crate::reconf::ReconfError),
}
