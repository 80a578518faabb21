//! # Data store
//!
//! Latest-value cells shared between the input streams and the modules.
//! Each stream is the only writer of its cell and publishes a complete
//! immutable snapshot, readers take the newest snapshot and may miss
//! intermediate ones.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use comms_if::eqpt::{
    arm::{ArmVelDems, EePoseSample},
    base::BasePoseSample,
};
use log::{trace, warn};

use crate::frames::{FrameError, FrameResolver, FrameTree, PoseError, PoseStamped, TreeError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A cell holding the newest published value.
pub struct Latest<T> {
    cell: RwLock<Option<Stamped<T>>>,
}

/// A value with the number of values published before it.
pub struct Stamped<T> {
    pub seq: u64,
    pub value: Arc<T>,
}

/// Shared data for the executable.
#[derive(Default)]
pub struct DataStore {
    /// End effector pose, always in the arm base frame
    pub ee_pose: Latest<PoseStamped>,

    /// Base pose in the world frame
    pub base_pose: Latest<PoseStamped>,

    /// Newest compensation command sent to the arm
    pub arm_vel_dems: Latest<ArmVelDems>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised when taking in a sample.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Invalid pose: {0}")]
    Pose(#[from] PoseError),

    #[error("Could not express the pose in the arm base frame: {0}")]
    Frame(#[from] FrameError),

    #[error("Could not add the base pose to the frame tree: {0}")]
    Tree(#[from] TreeError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self {
            cell: RwLock::new(None),
        }
    }
}

impl<T> Clone for Stamped<T> {
    fn clone(&self) -> Self {
        Self {
            seq: self.seq,
            value: self.value.clone(),
        }
    }
}

impl<T> Latest<T> {
    /// Publish a new value, replacing the previous one.
    pub fn publish(&self, value: T) {
        // A poisoned cell only means a reader panicked, the data is still whole
        let mut cell = match self.cell.write() {
            Ok(c) => c,
            Err(e) => e.into_inner(),
        };

        let seq = cell.as_ref().map(|s| s.seq + 1).unwrap_or(0);
        *cell = Some(Stamped {
            seq,
            value: Arc::new(value),
        });
    }

    /// Get the newest value, or `None` if nothing has been published.
    pub fn get(&self) -> Option<Arc<T>> {
        self.get_stamped().map(|s| s.value)
    }

    /// Get the newest value with its sequence number.
    pub fn get_stamped(&self) -> Option<Stamped<T>> {
        match self.cell.read() {
            Ok(c) => c.clone(),
            Err(e) => e.into_inner().clone(),
        }
    }
}

impl DataStore {
    /// Take in an end effector pose sample, converting it into the arm base
    /// frame. On failure the previous pose is kept.
    pub fn ingest_ee_pose(
        &self,
        sample: &EePoseSample,
        resolver: &FrameResolver,
        arm_base_frame: &str,
        timeout: Duration,
    ) -> Result<(), IngestError> {
        let pose = PoseStamped::from_wire(&sample.header, &sample.pose)?;

        let pose = match resolver.transform_pose(&pose, arm_base_frame, timeout) {
            Ok(p) => p,
            Err(e) => {
                warn!("Keeping previous end effector pose: {}", e);
                return Err(e.into());
            }
        };

        trace!("EE pose {:?}", pose.pose.position_m.as_slice());
        self.ee_pose.publish(pose);

        Ok(())
    }

    /// Take in a base pose sample, adding it to the frame tree as the link
    /// between the sample's frame and `base_frame`.
    pub fn ingest_base_pose(
        &self,
        sample: &BasePoseSample,
        tree: &FrameTree,
        base_frame: &str,
    ) -> Result<(), IngestError> {
        let pose = PoseStamped::from_wire(&sample.header, &sample.pose)?;

        tree.set_transform(
            &pose.frame_id,
            base_frame,
            pose.stamp_s,
            pose.pose.to_isometry(),
        )?;
        self.base_pose.publish(pose);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::{Header, PoseData};
    use std::thread;

    fn header(frame: &str, stamp_s: f64) -> Header {
        Header {
            frame_id: frame.into(),
            stamp_s,
        }
    }

    #[test]
    fn test_latest_wins() {
        let cell = Latest::default();
        assert!(cell.get().is_none());

        cell.publish(1);
        cell.publish(2);

        let s = cell.get_stamped().unwrap();
        assert_eq!(*s.value, 2);
        assert_eq!(s.seq, 1);
    }

    #[test]
    fn test_snapshot_outlives_update() {
        let cell = Latest::default();
        cell.publish(vec![1, 2, 3]);

        let held = cell.get().unwrap();
        cell.publish(vec![4]);

        assert_eq!(*held, vec![1, 2, 3]);
        assert_eq!(*cell.get().unwrap(), vec![4]);
    }

    #[test]
    fn test_shared_between_threads() {
        let store = Arc::new(DataStore::default());
        let writer = store.clone();

        thread::spawn(move || {
            for i in 0..100 {
                writer.base_pose.publish(crate::frames::PoseStamped {
                    frame_id: "map".into(),
                    stamp_s: i as f64,
                    pose: Default::default(),
                });
            }
        })
        .join()
        .unwrap();

        assert_eq!(store.base_pose.get().unwrap().stamp_s, 99.0);
        assert!(store.ee_pose.get().is_none());
    }

    #[test]
    fn test_ingest_poses() {
        let store = DataStore::default();
        let tree = Arc::new(FrameTree::new(10.0));
        tree.set_static("base_link", "arm_base", nalgebra::Isometry3::identity())
            .unwrap();
        let resolver = FrameResolver::new(tree.clone())
            .with_poll_period(Duration::from_millis(1));

        store
            .ingest_base_pose(
                &BasePoseSample {
                    header: header("map", 1.0),
                    pose: PoseData {
                        position_m: [1.0, 0.0, 0.0],
                        ..Default::default()
                    },
                },
                &tree,
                "base_link",
            )
            .unwrap();
        assert_eq!(store.base_pose.get().unwrap().stamp_s, 1.0);

        // World frame sample converted into the arm base frame
        store
            .ingest_ee_pose(
                &EePoseSample {
                    header: header("map", 1.0),
                    pose: PoseData {
                        position_m: [1.5, 0.0, 0.3],
                        ..Default::default()
                    },
                },
                &resolver,
                "arm_base",
                Duration::from_millis(10),
            )
            .unwrap();

        let ee = store.ee_pose.get().unwrap();
        assert_eq!(ee.frame_id, "arm_base");
        assert!((ee.pose.position_m.x - 0.5).abs() < 1e-12);

        // A failed conversion keeps the previous pose
        assert!(matches!(
            store.ingest_ee_pose(
                &EePoseSample {
                    header: header("odom", 1.0),
                    pose: PoseData::default(),
                },
                &resolver,
                "arm_base",
                Duration::from_millis(5),
            ),
            Err(IngestError::Frame(_))
        ));
        assert_eq!(store.ee_pose.get_stamped().unwrap().seq, 0);

        // Invalid attitude rejected at the boundary
        assert!(matches!(
            store.ingest_ee_pose(
                &EePoseSample {
                    header: header("arm_base", 1.0),
                    pose: PoseData {
                        attitude_q: [0.0, 0.0, 0.0, 2.0],
                        ..Default::default()
                    },
                },
                &resolver,
                "arm_base",
                Duration::from_millis(5),
            ),
            Err(IngestError::Pose(_))
        ));
    }
}
