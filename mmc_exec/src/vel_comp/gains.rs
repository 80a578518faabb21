//! Live compensation gains

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::reconf::{ParamDef, Reconfigurable};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const GAIN_DEFS: [ParamDef; 4] = [
    ParamDef {
        name: "comp_gain",
        min: 0.0,
        max: 2.0,
    },
    ParamDef {
        name: "linear_speed_limit_ms",
        min: 0.01,
        max: 2.0,
    },
    ParamDef {
        name: "accel_limit_ms2",
        min: 0.0,
        max: 10.0,
    },
    ParamDef {
        name: "angular_ff_gain",
        min: 0.0,
        max: 2.0,
    },
];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains and limits of the compensator which can be changed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelCompGains {
    /// Proportion of the induced velocity which is cancelled.
    pub comp_gain: f64,

    /// Maximum norm of the linear compensation command.
    ///
    /// Units: meters/second
    pub linear_speed_limit_ms: f64,

    /// Maximum change in the linear command per second, 0 (the default) to
    /// disable.
    ///
    /// Units: meters/second^2
    pub accel_limit_ms2: f64,

    /// Gain of the angular feed-forward term, 0 to disable.
    pub angular_ff_gain: f64,
}

impl Default for VelCompGains {
    fn default() -> Self {
        Self {
            comp_gain: 1.0,
            linear_speed_limit_ms: 0.3,
            accel_limit_ms2: 0.0,
            angular_ff_gain: 0.0,
        }
    }
}

impl Reconfigurable for VelCompGains {
    fn param_defs() -> &'static [ParamDef] {
        &GAIN_DEFS
    }

    fn get(&self, name: &str) -> Option<f64> {
        match name {
            "comp_gain" => Some(self.comp_gain),
            "linear_speed_limit_ms" => Some(self.linear_speed_limit_ms),
            "accel_limit_ms2" => Some(self.accel_limit_ms2),
            "angular_ff_gain" => Some(self.angular_ff_gain),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: f64) -> bool {
        match name {
            "comp_gain" => self.comp_gain = value,
            "linear_speed_limit_ms" => self.linear_speed_limit_ms = value,
            "accel_limit_ms2" => self.accel_limit_ms2 = value,
            "angular_ff_gain" => self.angular_ff_gain = value,
            _ => return false,
        }
        true
    }
}
