//! # Input script interpreter module
//!
//! This module provides an interpreter for input scripts, allowing recorded or
//! hand-written input streams (paths, base and arm samples, parameter updates)
//! to be replayed against the session clock.
//!
//! A script is a sequence of entries of the form `<time_s>: <json msg>;`, for
//! example:
//!
//! ```text
//! 0.5: {"BaseVel": {"stamp_s": 0.5, "linear_x_ms": 0.2, "linear_y_ms": 0.0, "angular_z_rads": 0.1}};
//! ```
//!
//! Anything outside of an entry is ignored and can be used for comments.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use regex::RegexBuilder;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal
use crate::session::get_elapsed_seconds;
use comms_if::{Msg, MsgParseError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A message which is scripted to be delivered at a specific time.
#[derive(Debug)]
pub struct ScriptedMsg {
    /// The time the message is supposed to be delivered at
    exec_time_s: f64,

    /// The message to deliver
    msg: Msg,
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use
/// `.get_pending_msgs` to acquire a list of messages that are due.
pub struct ScriptInterpreter {
    _script_path: Option<PathBuf>,
    msgs: VecDeque<ScriptedMsg>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)"
    )]
    InvalidTimestamp(String),

    #[error("Script contains an invalid message at {0} s: {1}")]
    InvalidMsg(f64, MsgParseError),
}

#[derive(Debug)]
pub enum PendingMsgs {
    None,
    Some(Vec<Msg>),
    EndOfScript,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {
    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = PathBuf::from(script_path.as_ref());

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let script = fs::read_to_string(&path).map_err(ScriptError::ScriptLoadError)?;

        let mut si = Self::from_script_str(&script)?;
        si._script_path = Some(path);

        Ok(si)
    }

    /// Create a new interpreter from the contents of a script.
    pub fn from_script_str(script: &str) -> Result<Self, ScriptError> {
        let mut msg_queue: VecDeque<ScriptedMsg> = VecDeque::new();

        // Go through the script executing __the magic regex__.
        let re = RegexBuilder::new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

        for cap in re.captures_iter(script) {
            // Both groups are mandatory in the pattern so will always be present
            let (time_str, payload) = match (cap.get(1), cap.get(3)) {
                (Some(t), Some(p)) => (t.as_str(), p.as_str()),
                _ => continue,
            };

            let exec_time_s: f64 = time_str
                .parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            let msg = Msg::from_json(payload)
                .map_err(|e| ScriptError::InvalidMsg(exec_time_s, e))?;

            msg_queue.push_back(ScriptedMsg { exec_time_s, msg });
        }

        if msg_queue.is_empty() {
            return Err(ScriptError::ScriptEmpty);
        }

        // Entries are delivered in time order even if the script isn't written that way. The sort
        // is stable so entries with the same time keep their written order.
        let mut sorted: Vec<ScriptedMsg> = msg_queue.into_iter().collect();
        sorted.sort_by(|a, b| {
            a.exec_time_s
                .partial_cmp(&b.exec_time_s)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(ScriptInterpreter {
            _script_path: None,
            msgs: sorted.into_iter().collect(),
        })
    }

    /// Return the messages which are due at the current session time.
    pub fn get_pending_msgs(&mut self) -> PendingMsgs {
        self.get_pending_msgs_at(get_elapsed_seconds())
    }

    /// Return the messages which are due at the given time.
    pub fn get_pending_msgs_at(&mut self, current_time_s: f64) -> PendingMsgs {
        // If the queue is empty the script is over
        if self.msgs.is_empty() {
            return PendingMsgs::EndOfScript;
        }

        let mut msg_vec: Vec<Msg> = vec![];

        while let Some(front) = self.msgs.front() {
            if front.exec_time_s > current_time_s {
                break;
            }

            if let Some(m) = self.msgs.pop_front() {
                msg_vec.push(m.msg);
            }
        }

        if msg_vec.is_empty() {
            PendingMsgs::None
        } else {
            PendingMsgs::Some(msg_vec)
        }
    }

    /// Get the number of messages remaining in the script
    pub fn get_num_msgs(&self) -> usize {
        self.msgs.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.msgs.back() {
            Some(c) => c.exec_time_s,
            None => 0f64,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SCRIPT: &str = r#"
# Drive forward while turning
1.0: {"BaseVel": {"stamp_s": 1.0, "linear_x_ms": 0.2, "linear_y_ms": 0.0, "angular_z_rads": 0.1}};
0.5: {"Param": {"name": "comp_gain", "value": 0.8}};
2.0: {"Path": {"frame_id": "map", "points_m": [[0, 0, 0], [1, 0, 0], [2, 0, 0]]}};
"#;

    #[test]
    fn test_pending_in_time_order() {
        let mut si = ScriptInterpreter::from_script_str(SCRIPT).unwrap();

        assert_eq!(si.get_num_msgs(), 3);
        assert_eq!(si.get_duration(), 2.0);

        match si.get_pending_msgs_at(0.1) {
            PendingMsgs::None => (),
            p => panic!("Expected nothing pending, got {:?}", p),
        }

        match si.get_pending_msgs_at(1.2) {
            PendingMsgs::Some(v) => {
                assert_eq!(v.len(), 2);
                assert_eq!(v[0].kind(), "Param");
                assert_eq!(v[1].kind(), "BaseVel");
            }
            p => panic!("Expected two messages, got {:?}", p),
        }

        match si.get_pending_msgs_at(5.0) {
            PendingMsgs::Some(v) => assert_eq!(v[0].kind(), "Path"),
            p => panic!("Expected the path, got {:?}", p),
        }

        match si.get_pending_msgs_at(6.0) {
            PendingMsgs::EndOfScript => (),
            p => panic!("Expected end of script, got {:?}", p),
        }
    }

    #[test]
    fn test_empty_script() {
        match ScriptInterpreter::from_script_str("# nothing here\n") {
            Err(ScriptError::ScriptEmpty) => (),
            r => panic!("Expected ScriptEmpty, got {:?}", r.err()),
        }
    }

    #[test]
    fn test_invalid_msg() {
        match ScriptInterpreter::from_script_str("1.0: {\"Nope\": 1};") {
            Err(ScriptError::InvalidMsg(t, _)) => assert_eq!(t, 1.0),
            r => panic!("Expected InvalidMsg, got {:?}", r.err()),
        }
    }
}
