//! # Live reconfiguration commands

use serde::{Deserialize, Serialize};

/// Sets a named live parameter to a new value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParamUpdate {
    pub name: String,
    pub value: f64,
}
