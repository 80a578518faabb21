//! In-process planner and executor
//!
//! A straight line Cartesian planner and an executor which steps through the
//! trajectory in time, standing in for the external planning library and arm
//! driver.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{sync::Arc, thread};

use log::{debug, trace};
use nalgebra::Vector3;

use super::{
    CancelToken, ExecError, ExecOutcome, Executor, LinearPlannerParams, PlanError, Planner,
    SimExecutorParams, TrajPoint, Trajectory,
};
use crate::{
    data_store::DataStore,
    frames::{Pose, PoseStamped},
};
use util::time::seconds_to_std;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Plans straight lines from the current tool position to the target.
pub struct LinearPlanner {
    params: LinearPlannerParams,
    arm_base_frame: String,

    /// Source of the current tool position
    store: Option<Arc<DataStore>>,
}

/// Follows trajectories in simulated time.
pub struct SimExecutor {
    params: SimExecutorParams,

    /// Where the tool poses are published, with the clock stamping them
    store: Option<(Arc<DataStore>, Box<dyn Fn() -> f64 + Send>)>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LinearPlanner {
    pub fn new(params: LinearPlannerParams, arm_base_frame: &str) -> Self {
        Self {
            params,
            arm_base_frame: arm_base_frame.to_string(),
            store: None,
        }
    }

    /// Start trajectories from the end effector pose in the store.
    pub fn with_store(mut self, store: Arc<DataStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn start_m(&self) -> Vector3<f64> {
        self.store
            .as_ref()
            .and_then(|s| s.ee_pose.get())
            .filter(|p| p.frame_id == self.arm_base_frame)
            .map(|p| p.pose.position_m)
            .unwrap_or_else(|| Vector3::from(self.params.home_m))
    }
}

impl Planner for LinearPlanner {
    fn plan(&mut self, target: &PoseStamped) -> Result<Trajectory, PlanError> {
        if target.frame_id != self.arm_base_frame {
            return Err(PlanError::WrongFrame {
                expected: self.arm_base_frame.clone(),
                actual: target.frame_id.clone(),
            });
        }

        let end_m = target.pose.position_m;

        let distance_m = end_m.norm();
        if distance_m > self.params.max_reach_m {
            return Err(PlanError::OutOfReach {
                distance_m,
                max_reach_m: self.params.max_reach_m,
            });
        }
        if end_m.z < self.params.min_z_m {
            return Err(PlanError::BelowMinHeight {
                z_m: end_m.z,
                min_z_m: self.params.min_z_m,
            });
        }
        if self.params.step_m <= 0.0 || self.params.tool_speed_ms <= 0.0 {
            return Err(PlanError::Other(
                "step and tool speed must be positive".into(),
            ));
        }

        let start_m = self.start_m();
        let length_m = (end_m - start_m).norm();
        let num_steps = ((length_m / self.params.step_m).ceil() as usize).max(1);

        // The attitude is held at the target's for the whole line
        let points = (0..=num_steps)
            .map(|i| {
                let alpha = i as f64 / num_steps as f64;
                TrajPoint {
                    time_from_start_s: alpha * length_m / self.params.tool_speed_ms,
                    pose: Pose::new(start_m + (end_m - start_m) * alpha, target.pose.attitude_q),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "Planned {:.3} m line in {} points",
            length_m,
            points.len()
        );

        Ok(Trajectory {
            frame_id: target.frame_id.clone(),
            points,
        })
    }
}

impl SimExecutor {
    pub fn new(params: SimExecutorParams) -> Self {
        Self {
            params,
            store: None,
        }
    }

    /// Publish the tool pose to the store while executing, stamped with the
    /// session time given by `clock`.
    pub fn with_store<C>(mut self, store: Arc<DataStore>, clock: C) -> Self
    where
        C: Fn() -> f64 + Send + 'static,
    {
        self.store = Some((store, Box::new(clock)));
        self
    }
}

impl Executor for SimExecutor {
    fn execute(
        &mut self,
        trajectory: &Trajectory,
        cancel: &CancelToken,
    ) -> Result<ExecOutcome, ExecError> {
        let mut prev_time_s = 0.0;

        for point in &trajectory.points {
            if cancel.is_cancelled() {
                return Ok(ExecOutcome::Cancelled);
            }

            let wait_s = (point.time_from_start_s - prev_time_s) * self.params.time_scale;
            if wait_s > 0.0 {
                thread::sleep(seconds_to_std(wait_s));
            }
            prev_time_s = point.time_from_start_s;

            trace!("Tool at {:?}", point.pose.position_m.as_slice());

            if self.params.publish_ee_pose {
                if let Some((store, clock)) = &self.store {
                    store.ee_pose.publish(PoseStamped {
                        frame_id: trajectory.frame_id.clone(),
                        stamp_s: clock(),
                        pose: point.pose,
                    });
                }
            }
        }

        Ok(ExecOutcome::Completed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{path_xform::Path, target_disp::PathIntake};
    use approx::assert_relative_eq;

    fn target(x: f64, y: f64, z: f64) -> PoseStamped {
        PoseStamped {
            frame_id: "arm_base".into(),
            stamp_s: 0.0,
            pose: Pose::tool_down(Vector3::new(x, y, z)),
        }
    }

    fn planner() -> LinearPlanner {
        LinearPlanner::new(
            LinearPlannerParams {
                max_reach_m: 1.0,
                min_z_m: 0.0,
                step_m: 0.15,
                tool_speed_ms: 0.5,
                home_m: [0.5, 0.0, 0.5],
            },
            "arm_base",
        )
    }

    #[test]
    fn test_plan_line() {
        let traj = planner().plan(&target(0.5, 0.0, 0.1)).unwrap();

        // 0.4 m in steps of at most 0.15 m
        assert_eq!(traj.points.len(), 4);
        assert_relative_eq!(
            traj.points[0].pose.position_m,
            Vector3::new(0.5, 0.0, 0.5),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            traj.points[3].pose.position_m,
            Vector3::new(0.5, 0.0, 0.1),
            epsilon = 1e-12
        );
        assert_relative_eq!(traj.points[3].time_from_start_s, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_plan_from_store() {
        let store = Arc::new(DataStore::default());
        store.ee_pose.publish(target(0.2, 0.2, 0.2));

        let traj = planner()
            .with_store(store)
            .plan(&target(0.2, 0.2, 0.4))
            .unwrap();

        assert_relative_eq!(
            traj.points[0].pose.position_m,
            Vector3::new(0.2, 0.2, 0.2),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_plan_failures() {
        let mut planner = planner();

        assert!(matches!(
            planner.plan(&target(1.0, 1.0, 0.0)),
            Err(PlanError::OutOfReach { .. })
        ));
        assert!(matches!(
            planner.plan(&target(0.5, 0.0, -0.1)),
            Err(PlanError::BelowMinHeight { .. })
        ));

        let mut wrong = target(0.5, 0.0, 0.1);
        wrong.frame_id = "map".into();
        assert!(matches!(
            planner.plan(&wrong),
            Err(PlanError::WrongFrame { .. })
        ));
    }

    #[test]
    fn test_execute_publishes_pose() {
        let store = Arc::new(DataStore::default());
        let traj = planner().plan(&target(0.5, 0.0, 0.1)).unwrap();

        let mut exec = SimExecutor::new(SimExecutorParams {
            time_scale: 0.0,
            publish_ee_pose: true,
        })
        .with_store(store.clone(), || 42.5);

        assert_eq!(
            exec.execute(&traj, &CancelToken::never()),
            Ok(ExecOutcome::Completed)
        );

        // Stamped with the session clock, not the trajectory's time
        let pose = store.ee_pose.get().unwrap();
        assert_eq!(pose.frame_id, "arm_base");
        assert_eq!(pose.stamp_s, 42.5);
        assert_relative_eq!(
            pose.pose.position_m,
            Vector3::new(0.5, 0.0, 0.1),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_execute_cancelled() {
        let (intake, receiver) = PathIntake::channel();
        intake
            .submit(Path::new("map", 0.0, vec![Vector3::zeros()]))
            .unwrap();
        let (_, token) = receiver
            .recv_freshest(std::time::Duration::from_millis(10))
            .unwrap()
            .unwrap();

        // A newer path arrives before execution starts
        intake
            .submit(Path::new("map", 0.0, vec![Vector3::zeros()]))
            .unwrap();

        let traj = planner().plan(&target(0.5, 0.0, 0.1)).unwrap();
        let mut exec = SimExecutor::new(SimExecutorParams {
            time_scale: 0.0,
            publish_ee_pose: false,
        });

        assert_eq!(exec.execute(&traj, &token), Ok(ExecOutcome::Cancelled));
    }
}
