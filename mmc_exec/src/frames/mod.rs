//! # Frames module
//!
//! Frames provides the rigid transforms between named coordinate frames. Two
//! pieces are involved:
//!
//! - A [`TransformSource`], which answers a single non-blocking query for the
//!   transform between two frames. [`FrameTree`] is the in-process source, a
//!   buffer of timestamped parent to child transforms.
//! - The [`FrameResolver`], which wraps a source and waits (up to a deadline)
//!   for a transform to become available, converting source failures into the
//!   [`FrameError`] taxonomy used by the rest of the software.
//!
//! Transforms are never cached by consumers beyond a single control cycle, as
//! the base is continuously moving.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod pose;
mod resolver;
mod tree;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};

pub use pose::*;
pub use resolver::*;
pub use tree::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A rigid transform relating a child frame to a parent frame at a given time.
///
/// `transform` maps coordinates expressed in the child frame into the parent
/// frame, i.e. it is the pose of the child frame in the parent frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StampedTransform {
    pub parent: String,
    pub child: String,

    /// The time this transform is valid at, in session seconds. Static
    /// transforms carry the time they were requested at.
    pub stamp_s: f64,

    pub transform: Isometry3<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The time at which a transform is requested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LookupTime {
    /// The newest time at which every link between the two frames is known
    Latest,

    /// A specific time in session seconds
    At(f64),
}

/// Errors produced when resolving a transform.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("There is no path between frames {parent:?} and {child:?}")]
    FrameUnavailable { parent: String, child: String },

    #[error("Transform {parent:?} -> {child:?} was not available within {timeout_s:.3} s")]
    FrameTimeout {
        parent: String,
        child: String,
        timeout_s: f64,
    },

    #[error(
        "Transform {parent:?} -> {child:?} requested at {requested_s:.3} s is outside of the \
        known history [{oldest_s:.3}, {newest_s:.3}] s"
    )]
    FrameExtrapolation {
        parent: String,
        child: String,
        requested_s: f64,
        oldest_s: f64,
        newest_s: f64,
    },
}

/// Errors produced by a single query to a [`TransformSource`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupError {
    /// The frame has never been seen by the source. It may appear later.
    #[error("Frame {0:?} is not known")]
    UnknownFrame(String),

    /// Both frames are known but there's no chain of links between them.
    #[error("Frames {0:?} and {1:?} are not connected")]
    NotConnected(String, String),

    /// The requested time is older than the oldest data held.
    #[error("Requested time {requested_s:.3} s is older than the history [{oldest_s:.3}, {newest_s:.3}] s")]
    ExtrapolationPast {
        requested_s: f64,
        oldest_s: f64,
        newest_s: f64,
    },

    /// The requested time is newer than the newest data held. Newer data may
    /// arrive later.
    #[error("Requested time {requested_s:.3} s is newer than the history [{oldest_s:.3}, {newest_s:.3}] s")]
    ExtrapolationFuture {
        requested_s: f64,
        oldest_s: f64,
        newest_s: f64,
    },
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A provider of transforms between named frames.
///
/// Implementations must answer without blocking, the waiting is done by the
/// [`FrameResolver`].
pub trait TransformSource: Send + Sync {
    /// Get the transform which maps coordinates in `child` into `parent` at the
    /// given time.
    fn lookup(
        &self,
        parent: &str,
        child: &str,
        at: LookupTime,
    ) -> Result<StampedTransform, LookupError>;
}
