//! Event driven compensation loop
//!
//! The compensator runs once per base velocity sample, as soon as the sample
//! arrives, rather than on a timer.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{mpsc::Receiver, Arc};

use log::{info, warn};
use serde::Serialize;

use super::{InputData, VelComp, VelCompError};
use crate::data_store::DataStore;
use comms_if::eqpt::base::BaseVelSample;
use util::{archive::Archived, module::State};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Owns the compensator and feeds it base velocity samples.
pub struct VelCompWorker {
    vel_comp: VelComp,
    rx: Receiver<BaseVelSample>,
    store: Arc<DataStore>,

    /// Frame the end effector pose must be in
    mount_frame: String,

    /// Samples are arriving while no end effector pose is known
    missing_ee_pose: bool,
}

/// Counts of what happened to the samples received.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct VelCompSummary {
    pub samples: usize,
    pub commands: usize,
    pub discarded: usize,

    /// Samples which couldn't be compensated as no end effector pose is known
    pub no_ee_pose: usize,
    pub errors: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VelCompWorker {
    pub fn new(
        vel_comp: VelComp,
        rx: Receiver<BaseVelSample>,
        store: Arc<DataStore>,
        mount_frame: &str,
    ) -> Self {
        Self {
            vel_comp,
            rx,
            store,
            mount_frame: mount_frame.to_string(),
            missing_ee_pose: false,
        }
    }

    /// Process samples until every sender has been dropped.
    pub fn run<C>(mut self, clock: C) -> VelCompSummary
    where
        C: Fn() -> f64,
    {
        let mut summary = VelCompSummary::default();

        while let Ok(sample) = self.rx.recv() {
            self.handle(sample, clock(), &mut summary);
        }

        info!("VelComp worker stopped: {:?}", summary);
        summary
    }

    /// Compute and publish the command for one sample.
    pub fn handle(&mut self, sample: BaseVelSample, now_s: f64, summary: &mut VelCompSummary) {
        summary.samples += 1;

        let input = InputData {
            base_vel: sample,
            ee_pose: self.store.ee_pose.get(),
            mount_frame: self.mount_frame.clone(),
            now_s,
        };

        let result = self.vel_comp.proc(&input);

        match (&result, self.missing_ee_pose) {
            (Err(VelCompError::NoEePose), false) => {
                warn!("No end effector pose known, base velocity samples can't be compensated");
                self.missing_ee_pose = true;
            }
            (Err(VelCompError::NoEePose), true) => (),
            (Ok((Some(_), _)), true) => {
                info!("End effector pose available, compensation resumed");
                self.missing_ee_pose = false;
            }
            _ => (),
        }

        match result {
            Ok((Some(dems), _)) => {
                self.store.arm_vel_dems.publish(dems);
                summary.commands += 1;

                if let Err(e) = self.vel_comp.write() {
                    warn!("Could not archive VelComp data: {}", e);
                }
            }
            Ok((None, _)) => summary.discarded += 1,
            Err(VelCompError::NoEePose) => summary.no_ee_pose += 1,
            Err(e) => {
                warn!("VelComp error: {}", e);
                summary.errors += 1;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        frames::{FrameResolver, FrameTree, Pose, PoseStamped},
        reconf::ParamStore,
        vel_comp::{OffsetSource, Params, VelCompGains},
    };
    use nalgebra::{Isometry3, Vector3};
    use std::{sync::mpsc::channel, thread, time::Duration};

    fn worker(rx: Receiver<BaseVelSample>, store: Arc<DataStore>) -> VelCompWorker {
        let tree = Arc::new(FrameTree::new(10.0));
        tree.set_static("base_link", "arm_base", Isometry3::identity())
            .unwrap();

        let mut vc = VelComp::new(
            Params {
                offset_resolve_timeout_s: 0.01,
                ..Params::default()
            },
            Arc::new(ParamStore::new(VelCompGains::default()).unwrap()),
        );
        vc.init(OffsetSource {
            resolver: FrameResolver::new(tree).with_poll_period(Duration::from_millis(1)),
            base_frame: "base_link".into(),
            mount_frame: "arm_base".into(),
        })
        .unwrap();

        VelCompWorker::new(vc, rx, store, "arm_base")
    }

    fn sample(stamp_s: f64) -> BaseVelSample {
        BaseVelSample {
            stamp_s,
            linear_x_ms: 0.1,
            linear_y_ms: 0.0,
            angular_z_rads: 0.0,
        }
    }

    #[test]
    fn test_runs_per_sample() {
        let (tx, rx) = channel();
        let store = Arc::new(DataStore::default());
        let worker = worker(rx, store.clone());

        store.ee_pose.publish(PoseStamped {
            frame_id: "arm_base".into(),
            stamp_s: 0.0,
            pose: Pose::tool_down(Vector3::new(0.4, 0.0, 0.2)),
        });

        // Too old relative to the clock
        tx.send(sample(-1.0)).unwrap();
        tx.send(sample(0.1)).unwrap();
        tx.send(sample(0.2)).unwrap();
        drop(tx);

        let jh = thread::spawn(move || worker.run(|| 0.2));

        let summary = jh.join().unwrap();
        assert_eq!(
            summary,
            VelCompSummary {
                samples: 3,
                commands: 2,
                discarded: 1,
                no_ee_pose: 0,
                errors: 0
            }
        );
        assert_eq!(store.arm_vel_dems.get().unwrap().stamp_s, 0.2);
    }

    #[test]
    fn test_no_ee_pose_counted() {
        let (_tx, rx) = channel();
        let store = Arc::new(DataStore::default());
        let mut worker = worker(rx, store.clone());
        let mut summary = VelCompSummary::default();

        worker.handle(sample(0.0), 0.0, &mut summary);
        worker.handle(sample(0.05), 0.05, &mut summary);

        assert_eq!(summary.no_ee_pose, 2);
        assert_eq!(summary.discarded, 0);
        assert_eq!(summary.errors, 0);
        assert!(worker.missing_ee_pose);
        assert!(store.arm_vel_dems.get().is_none());

        // Compensation resumes once a pose is known
        store.ee_pose.publish(PoseStamped {
            frame_id: "arm_base".into(),
            stamp_s: 0.1,
            pose: Pose::tool_down(Vector3::new(0.4, 0.0, 0.2)),
        });
        worker.handle(sample(0.1), 0.1, &mut summary);

        assert_eq!(summary.commands, 1);
        assert_eq!(summary.no_ee_pose, 2);
        assert!(!worker.missing_ee_pose);
        assert!(store.arm_vel_dems.get().is_some());
    }
}
