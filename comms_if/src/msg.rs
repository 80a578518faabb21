//! # Message envelope
//!
//! All input streams of the software are multiplexed into a single `Msg`
//! type when read from a script.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    eqpt::{
        arm::EePoseSample,
        base::{BasePoseSample, BaseVelSample},
    },
    tc::{path::PathUpdate, reconf::ParamUpdate},
};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A single input message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Msg {
    /// Replace the current path
    Path(PathUpdate),

    /// New base velocity sample
    BaseVel(BaseVelSample),

    /// New base pose sample
    BasePose(BasePoseSample),

    /// New end effector pose sample
    EePose(EePoseSample),

    /// Update a live parameter
    Param(ParamUpdate),
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum MsgParseError {
    #[error("Message contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Msg {
    /// Parse a new message from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, MsgParseError> {
        serde_json::from_str(json_str).map_err(MsgParseError::InvalidJson)
    }

    /// Serialise the message into a JSON string
    pub fn to_json(&self) -> Result<String, MsgParseError> {
        serde_json::to_string(self).map_err(MsgParseError::InvalidJson)
    }

    /// A short name for the message kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Path(_) => "Path",
            Msg::BaseVel(_) => "BaseVel",
            Msg::BasePose(_) => "BasePose",
            Msg::EePose(_) => "EePose",
            Msg::Param(_) => "Param",
        }
    }
}
