//! Parameters structure for VelComp

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::VelCompGains;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for velocity compensation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    // ---- SAMPLES ----
    /// Base velocity samples older than this (relative to the current time)
    /// are discarded.
    ///
    /// Units: seconds
    pub max_sample_age_s: f64,

    // ---- STATIC OFFSET ----
    /// Number of attempts made to resolve the static base to mount offset
    pub offset_resolve_attempts: usize,

    /// Time allowed for each attempt.
    ///
    /// Units: seconds
    pub offset_resolve_timeout_s: f64,

    /// Wait after the first failed attempt, doubled after each further
    /// failure.
    ///
    /// Units: seconds
    pub offset_retry_backoff_s: f64,

    // ---- GAINS ----
    /// Initial values of the live gains
    #[serde(default)]
    pub gains: VelCompGains,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_sample_age_s: 0.5,
            offset_resolve_attempts: 5,
            offset_resolve_timeout_s: 1.0,
            offset_retry_backoff_s: 0.1,
            gains: VelCompGains::default(),
        }
    }
}
