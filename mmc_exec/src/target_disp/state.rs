//! Implementations for the TargetDispatcher state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use std::sync::Arc;

// Internal
use super::{
    CancelToken, DiagSink, Diagnostic, DispatchError, DispatchMode, DispatchOutcome, ExecOutcome,
    Executor, Planner, PLANNED_TRAJECTORY_DIAG,
};
use crate::frames::PoseStamped;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Target dispatcher state
pub struct TargetDispatcher {
    planner: Box<dyn Planner>,
    executor: Box<dyn Executor>,

    /// Frame the targets must be expressed in
    arm_base_frame: String,

    stop_after_success: bool,

    mode: DispatchMode,

    /// Receives the planned trajectories if set
    diag: Option<Arc<dyn DiagSink>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TargetDispatcher {
    pub fn new(
        planner: Box<dyn Planner>,
        executor: Box<dyn Executor>,
        arm_base_frame: &str,
        stop_after_success: bool,
    ) -> Self {
        Self {
            planner,
            executor,
            arm_base_frame: arm_base_frame.to_string(),
            stop_after_success,
            mode: DispatchMode::Ready,
            diag: None,
        }
    }

    pub fn set_diagnostics(&mut self, sink: Arc<dyn DiagSink>) {
        self.diag = Some(sink);
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Plan a trajectory to the target and execute it.
    ///
    /// Invalid targets are rejected before the planner is called. A planner
    /// failure is reported in the outcome and not retried.
    pub fn dispatch(
        &mut self,
        target: &PoseStamped,
        cancel: &CancelToken,
    ) -> Result<DispatchOutcome, DispatchError> {
        if self.mode == DispatchMode::Finished {
            return Ok(DispatchOutcome::Unsupported(
                "a target has already been executed".into(),
            ));
        }

        self.validate(target)?;

        let trajectory = match self.planner.plan(target) {
            Ok(t) => t,
            Err(e) => {
                warn!("Motion planning failed: {}", e);
                return Ok(DispatchOutcome::PlanningFailed(e));
            }
        };

        if trajectory.points.is_empty() {
            warn!("Planner returned an empty trajectory");
            return Ok(DispatchOutcome::Unsupported(
                "the planned trajectory is empty".into(),
            ));
        }

        // Published before execution so a failed run still leaves the plan
        if let Some(ref diag) = self.diag {
            diag.save(
                PLANNED_TRAJECTORY_DIAG,
                Diagnostic::PlannedTrajectory(trajectory.clone()),
            );
        }

        if cancel.is_cancelled() {
            info!("Target superseded before execution");
            return Ok(DispatchOutcome::Accepted(ExecOutcome::Cancelled));
        }

        let outcome = self.executor.execute(&trajectory, cancel)?;

        match outcome {
            ExecOutcome::Completed => {
                info!("Motion executed successfully");
                if self.stop_after_success {
                    info!("Not accepting further targets");
                    self.mode = DispatchMode::Finished;
                }
            }
            ExecOutcome::Cancelled => info!("Execution cancelled by a newer target"),
        }

        Ok(DispatchOutcome::Accepted(outcome))
    }

    fn validate(&self, target: &PoseStamped) -> Result<(), DispatchError> {
        if target.frame_id != self.arm_base_frame {
            return Err(DispatchError::InvalidTarget(format!(
                "target is in {:?} rather than {:?}",
                target.frame_id, self.arm_base_frame
            )));
        }

        if !target.pose.position_m.iter().all(|v| v.is_finite()) {
            return Err(DispatchError::InvalidTarget(
                "target has non-finite position".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        frames::Pose,
        path_xform::Path,
        target_disp::{
            diag::test::RecordingSink, ExecError, PathIntake, PlanError, TrajPoint, Trajectory,
        },
    };
    use nalgebra::Vector3;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    /// Planner returning a fixed result and counting calls.
    struct FakePlanner {
        result: Result<usize, PlanError>,
        calls: Arc<AtomicUsize>,
    }

    impl Planner for FakePlanner {
        fn plan(&mut self, target: &PoseStamped) -> Result<Trajectory, PlanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n = self.result.clone()?;

            Ok(Trajectory {
                frame_id: target.frame_id.clone(),
                points: (0..n)
                    .map(|i| TrajPoint {
                        time_from_start_s: i as f64,
                        pose: target.pose,
                    })
                    .collect(),
            })
        }
    }

    struct FakeExecutor {
        calls: Arc<AtomicUsize>,
    }

    impl Executor for FakeExecutor {
        fn execute(
            &mut self,
            _trajectory: &Trajectory,
            cancel: &CancelToken,
        ) -> Result<ExecOutcome, ExecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match cancel.is_cancelled() {
                true => Ok(ExecOutcome::Cancelled),
                false => Ok(ExecOutcome::Completed),
            }
        }
    }

    fn dispatcher(
        result: Result<usize, PlanError>,
        stop_after_success: bool,
    ) -> (TargetDispatcher, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let plans = Arc::new(AtomicUsize::new(0));
        let execs = Arc::new(AtomicUsize::new(0));

        (
            TargetDispatcher::new(
                Box::new(FakePlanner {
                    result,
                    calls: plans.clone(),
                }),
                Box::new(FakeExecutor {
                    calls: execs.clone(),
                }),
                "arm_base",
                stop_after_success,
            ),
            plans,
            execs,
        )
    }

    fn target(frame: &str) -> PoseStamped {
        PoseStamped {
            frame_id: frame.into(),
            stamp_s: 0.0,
            pose: Pose::tool_down(Vector3::new(0.5, 0.0, 0.2)),
        }
    }

    fn path() -> Path {
        Path::new("map", 0.0, vec![Vector3::new(1.0, 0.0, 0.0)])
    }

    #[test]
    fn test_success_then_finished() {
        let (mut disp, plans, execs) = dispatcher(Ok(3), true);
        let never = CancelToken::never();

        assert_eq!(
            disp.dispatch(&target("arm_base"), &never),
            Ok(DispatchOutcome::Accepted(ExecOutcome::Completed))
        );
        assert_eq!(disp.mode(), DispatchMode::Finished);

        assert!(matches!(
            disp.dispatch(&target("arm_base"), &never),
            Ok(DispatchOutcome::Unsupported(_))
        ));
        assert_eq!(plans.load(Ordering::SeqCst), 1);
        assert_eq!(execs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_continuous() {
        let (mut disp, _, execs) = dispatcher(Ok(3), false);

        for _ in 0..3 {
            disp.dispatch(&target("arm_base"), &CancelToken::never())
                .unwrap();
        }
        assert_eq!(disp.mode(), DispatchMode::Ready);
        assert_eq!(execs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_planning_failed() {
        let err = PlanError::Other("no solution".into());
        let (mut disp, plans, execs) = dispatcher(Err(err.clone()), true);

        for _ in 0..2 {
            assert_eq!(
                disp.dispatch(&target("arm_base"), &CancelToken::never()),
                Ok(DispatchOutcome::PlanningFailed(err.clone()))
            );
        }

        // No retries, one plan per dispatch
        assert_eq!(plans.load(Ordering::SeqCst), 2);
        assert_eq!(execs.load(Ordering::SeqCst), 0);
        assert_eq!(disp.mode(), DispatchMode::Ready);
    }

    #[test]
    fn test_invalid_target_not_planned() {
        let (mut disp, plans, _) = dispatcher(Ok(3), true);

        assert!(matches!(
            disp.dispatch(&target("map"), &CancelToken::never()),
            Err(DispatchError::InvalidTarget(_))
        ));

        let mut nan = target("arm_base");
        nan.pose.position_m.x = f64::NAN;
        assert!(matches!(
            disp.dispatch(&nan, &CancelToken::never()),
            Err(DispatchError::InvalidTarget(_))
        ));

        assert_eq!(plans.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_trajectory_unsupported() {
        let (mut disp, _, execs) = dispatcher(Ok(0), true);

        assert!(matches!(
            disp.dispatch(&target("arm_base"), &CancelToken::never()),
            Ok(DispatchOutcome::Unsupported(_))
        ));
        assert_eq!(execs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_plan_saved_before_execution() {
        let sink = Arc::new(RecordingSink::default());
        let (mut disp, _, execs) = dispatcher(Ok(3), false);
        disp.set_diagnostics(sink.clone());

        // Superseded targets are not executed but their plan is still kept
        let (intake, receiver) = PathIntake::channel();
        intake.submit(path()).unwrap();
        let (_, cancelled) = receiver
            .recv_freshest(Duration::from_millis(10))
            .unwrap()
            .unwrap();
        intake.submit(path()).unwrap();
        assert_eq!(
            disp.dispatch(&target("arm_base"), &cancelled),
            Ok(DispatchOutcome::Accepted(ExecOutcome::Cancelled))
        );
        assert_eq!(execs.load(Ordering::SeqCst), 0);

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, PLANNED_TRAJECTORY_DIAG);
        match &records[0].1 {
            Diagnostic::PlannedTrajectory(t) => {
                assert_eq!(t.frame_id, "arm_base");
                assert_eq!(t.points.len(), 3);
            }
            d => panic!("unexpected diagnostic {:?}", d),
        }
    }

    #[test]
    fn test_failed_plan_not_saved() {
        let sink = Arc::new(RecordingSink::default());
        let (mut disp, _, _) = dispatcher(Err(PlanError::Other("no solution".into())), false);
        disp.set_diagnostics(sink.clone());

        disp.dispatch(&target("arm_base"), &CancelToken::never())
            .unwrap();
        assert!(sink.names().is_empty());
    }
}
