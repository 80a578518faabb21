//! # Command module
//!
//! Commands change what the software is doing: a new path to follow or a new
//! value for a live parameter.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod path;
pub mod reconf;
