//! Parameters structure for PathFrameTransformer

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::PathOffset;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the path frame transformer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    /// Maximum time to wait for the world to arm base transform.
    ///
    /// Units: seconds
    pub lookup_timeout_s: f64,

    /// If true the newest available transform is used rather than waiting for
    /// one at the current time.
    #[serde(default)]
    pub use_latest_transform: bool,

    /// Rigid offset applied to the oriented path
    #[serde(default)]
    pub path_offset: PathOffset,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            lookup_timeout_s: 2.0,
            use_latest_transform: false,
            path_offset: PathOffset::default(),
        }
    }
}
