//! Dispatch diagnostics
//!
//! Snapshots of the intermediate values of the path to trajectory pipeline.
//! None of them are consumed by the software itself.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use super::Trajectory;
use crate::{frames::PoseStamped, path_xform::Path};
use util::session;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

pub const ORIGINAL_PATH_DIAG: &str = "path_xform/original_path.json";
pub const LOCAL_TARGET_DIAG: &str = "path_xform/local_target.json";
pub const ORIENTED_PATH_DIAG: &str = "path_xform/oriented_path.json";
pub const PLANNED_TRAJECTORY_DIAG: &str = "target_disp/planned_trajectory.json";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A diagnostic snapshot, serialised as the inner value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Diagnostic {
    OriginalPath(Path),
    LocalTarget(PoseStamped),
    OrientedPath(Vec<PoseStamped>),
    PlannedTrajectory(Trajectory),
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Destination of the dispatch diagnostics.
pub trait DiagSink: Send + Sync {
    fn save(&self, name: &str, diag: Diagnostic);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Saves diagnostics as timestamped JSON files in the current session.
pub struct SessionSink;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DiagSink for SessionSink {
    fn save(&self, name: &str, diag: Diagnostic) {
        session::save_with_timestamp(name, diag);
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::frames::Pose;
    use nalgebra::Vector3;
    use std::sync::Mutex;

    /// Keeps every diagnostic in memory.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub records: Mutex<Vec<(String, Diagnostic)>>,
    }

    impl RecordingSink {
        pub fn names(&self) -> Vec<String> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .map(|(n, _)| n.clone())
                .collect()
        }
    }

    impl DiagSink for RecordingSink {
        fn save(&self, name: &str, diag: Diagnostic) {
            self.records.lock().unwrap().push((name.to_string(), diag));
        }
    }

    #[test]
    fn test_serialised_untagged() {
        let target = PoseStamped {
            frame_id: "arm_base".into(),
            stamp_s: 1.0,
            pose: Pose::tool_down(Vector3::new(0.5, 0.0, 0.2)),
        };

        assert_eq!(
            serde_json::to_value(Diagnostic::LocalTarget(target.clone())).unwrap(),
            serde_json::to_value(target).unwrap()
        );
    }
}
