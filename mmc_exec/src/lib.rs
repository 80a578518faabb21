//! # Mobile manipulator compensation library.
//!
//! This library allows other crates in the workspace (and the benches) to access items defined
//! inside the compensation crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Latest-value snapshots shared between the input streams and the modules
pub mod data_store;

/// Named coordinate frames - transforms between frames and the resolver which waits for them
pub mod frames;

/// Velocity Jacobian of the mobile base
pub mod jacobian;

/// Executable parameters
pub mod params;

/// Path frame transformer - converts world frame paths into arm targets
pub mod path_xform;

/// Live reconfiguration of module gains
pub mod reconf;

/// Target dispatcher - plans and executes motions to arm targets
pub mod target_disp;

/// Velocity compensator - cancels the motion induced by the base at the end effector
pub mod vel_comp;
