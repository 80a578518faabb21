//! # Path
//!
//! The path the end effector is asked to follow, expressed in a world frame.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// Internal
use comms_if::tc::path::PathUpdate;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An ordered sequence of points in a named frame. The order defines the
/// direction of travel. A path is never edited, a new path replaces it.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Path {
    pub frame_id: String,

    /// Time the path was issued, in session seconds
    pub stamp_s: f64,

    pub points_m: Vec<Vector3<f64>>,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("The path contains no points")]
    EmptyPath,

    #[error("The path is malformed: {0}")]
    MalformedPath(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Path {
    pub fn new(frame_id: &str, stamp_s: f64, points_m: Vec<Vector3<f64>>) -> Self {
        Self {
            frame_id: frame_id.to_string(),
            stamp_s,
            points_m,
        }
    }

    /// Check that the path can be used as a target.
    ///
    /// A path must have at least one point, a frame, and only finite
    /// coordinates.
    pub fn validate(&self) -> Result<(), PathError> {
        if self.points_m.is_empty() {
            return Err(PathError::EmptyPath);
        }

        if self.frame_id.is_empty() {
            return Err(PathError::MalformedPath("no frame id".into()));
        }

        if let Some(i) = self
            .points_m
            .iter()
            .position(|p| p.iter().any(|v| !v.is_finite()))
        {
            return Err(PathError::MalformedPath(format!(
                "point {} has non-finite coordinates",
                i
            )));
        }

        Ok(())
    }

    /// The first point of the path, which is the arm's next target.
    pub fn first(&self) -> Option<&Vector3<f64>> {
        self.points_m.first()
    }

    pub fn len(&self) -> usize {
        self.points_m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points_m.is_empty()
    }
}

impl From<&PathUpdate> for Path {
    fn from(update: &PathUpdate) -> Self {
        Self {
            frame_id: update.frame_id.clone(),
            stamp_s: update.stamp_s,
            points_m: update
                .points_m
                .iter()
                .map(|p| Vector3::new(p[0], p[1], p[2]))
                .collect(),
        }
    }
}
