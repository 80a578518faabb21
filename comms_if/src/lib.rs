//! # Communications interface crate.
//!
//! Provides the typed messages exchanged between the compensation software
//! and its input/output streams. These are plain wire structures, validated
//! and converted into core types by the consumer.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Commands sent to the software (path updates, parameter updates)
pub mod tc;

/// Equipment data (base and arm samples, arm velocity demands)
pub mod eqpt;

/// Message envelope used by input streams and scripts
pub mod msg;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use msg::{Msg, MsgParseError};
