//! Implementations for the VelComp state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, trace, warn};
use nalgebra::Vector2;
use serde::Serialize;
use std::{sync::Arc, thread, time::Duration};

// Internal
use super::{calc_compensation, rate_limit, Params, VelCompError, VelCompGains, VelCompMode};
use crate::{
    frames::{FrameResolver, LookupTime, PoseStamped, Twist},
    jacobian::PlanarVel,
    reconf::ParamStore,
};
use comms_if::eqpt::{arm::ArmVelDems, base::BaseVelSample};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    session::Session,
    time::seconds_to_std,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Velocity compensation module state
pub struct VelComp {
    pub(crate) params: Params,

    gains: Arc<ParamStore<VelCompGains>>,

    mode: VelCompMode,

    /// Position of the arm mount in the base frame, set once during init
    mount_offset_m: Option<Vector2<f64>>,

    /// The last command produced and the one before it, used as references
    /// for the rate limit
    last_cmd: Option<CmdRecord>,
    prev_cmd: Option<CmdRecord>,

    pub(crate) report: StatusReport,

    arch: Option<Archiver>,
    arch_record: Option<CompArchRecord>,
}

/// Where to find the static base to arm mount offset.
#[derive(Clone)]
pub struct OffsetSource {
    pub resolver: FrameResolver,
    pub base_frame: String,
    pub mount_frame: String,
}

/// Input data to velocity compensation.
pub struct InputData {
    /// The base velocity sample which triggered this cycle
    pub base_vel: BaseVelSample,

    /// The newest end effector pose, in the arm mount frame
    pub ee_pose: Option<Arc<PoseStamped>>,

    /// Expected frame of the end effector pose
    pub mount_frame: String,

    /// Current session time
    pub now_s: f64,
}

/// Status report for VelComp processing.
#[derive(Clone, Copy, Default, Serialize, Debug, PartialEq)]
pub struct StatusReport {
    /// The sample was older than the maximum sample age
    pub stale_sample: bool,

    /// The sample was older than the last accepted one
    pub out_of_order: bool,

    /// The sample had the same stamp as the last accepted one
    pub duplicate: bool,

    pub speed_limited: bool,
    pub accel_limited: bool,

    /// Version of the gains used
    pub gains_version: u64,
}

#[derive(Clone, Copy, Debug)]
struct CmdRecord {
    stamp_s: f64,
    cmd: Twist,
}

/// A flat row of the compensation archive.
#[derive(Clone, Copy, Serialize, Debug)]
struct CompArchRecord {
    stamp_s: f64,
    base_vx_ms: f64,
    base_vy_ms: f64,
    base_wz_rads: f64,
    lever_arm_x_m: f64,
    lever_arm_y_m: f64,
    induced_x_ms: f64,
    induced_y_ms: f64,
    cmd_x_ms: f64,
    cmd_y_ms: f64,
    cmd_wz_rads: f64,
    speed_limited: bool,
    accel_limited: bool,
    gains_version: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for VelComp {
    type InitData = OffsetSource;
    type InitError = VelCompError;

    type InputData = InputData;
    type OutputData = Option<ArmVelDems>;
    type StatusReport = StatusReport;
    type ProcError = VelCompError;

    /// Initialise the VelComp module.
    ///
    /// Resolves the static offset between the base and the arm mount, retrying
    /// with an exponential backoff. On failure the compensator stays in
    /// `AwaitingOffset` and never produces a command.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        let attempts = self.params.offset_resolve_attempts.max(1);
        let mut backoff_s = self.params.offset_retry_backoff_s;
        let mut last_err = None;

        for attempt in 1..=attempts {
            match init_data.resolver.resolve(
                &init_data.base_frame,
                &init_data.mount_frame,
                LookupTime::Latest,
                seconds_to_std(self.params.offset_resolve_timeout_s),
            ) {
                Ok(t) => {
                    let v = t.transform.translation.vector;
                    self.mount_offset_m = Some(Vector2::new(v.x, v.y));
                    self.mode = VelCompMode::Running;

                    info!(
                        "Static offset {} -> {} resolved: ({:.3}, {:.3}) m",
                        init_data.base_frame, init_data.mount_frame, v.x, v.y
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Static offset resolution attempt {}/{} failed: {}",
                        attempt, attempts, e
                    );
                    last_err = Some(e);
                }
            }

            if attempt < attempts {
                thread::sleep(seconds_to_std(backoff_s));
                backoff_s *= 2.0;
            }
        }

        let err = VelCompError::OffsetUnresolved {
            attempts,
            last: match last_err {
                Some(e) => e,
                None => crate::frames::FrameError::FrameUnavailable {
                    parent: init_data.base_frame.clone(),
                    child: init_data.mount_frame.clone(),
                },
            },
        };
        error!("{}", err);

        Err(err)
    }

    /// Compute the compensation command for a new base velocity sample.
    ///
    /// Returns `None` as output if the sample was discarded.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Clear the status report
        self.report = StatusReport::default();
        self.arch_record = None;

        let mount_offset_m = match (self.mode, self.mount_offset_m) {
            (VelCompMode::Running, Some(o)) => o,
            (mode, _) => return Err(VelCompError::NotRunning(mode)),
        };

        let sample = &input_data.base_vel;
        if ![
            sample.stamp_s,
            sample.linear_x_ms,
            sample.linear_y_ms,
            sample.angular_z_rads,
        ]
        .iter()
        .all(|v| v.is_finite())
        {
            return Err(VelCompError::InvalidSample);
        }

        // Check the age and order of the sample
        if sample.stamp_s < input_data.now_s - self.params.max_sample_age_s {
            debug!(
                "Discarding stale base velocity sample ({:.3} s old)",
                input_data.now_s - sample.stamp_s
            );
            self.report.stale_sample = true;
            return Ok((None, self.report));
        }

        let rate_ref = match self.last_cmd {
            Some(last) if sample.stamp_s < last.stamp_s => {
                debug!(
                    "Discarding out of order base velocity sample ({:.3} s < {:.3} s)",
                    sample.stamp_s, last.stamp_s
                );
                self.report.out_of_order = true;
                return Ok((None, self.report));
            }
            Some(last) if sample.stamp_s == last.stamp_s => {
                self.report.duplicate = true;
                self.prev_cmd
            }
            last => last,
        };

        let ee_pose = match &input_data.ee_pose {
            Some(p) => p,
            None => return Err(VelCompError::NoEePose),
        };
        if ee_pose.frame_id != input_data.mount_frame {
            return Err(VelCompError::WrongEeFrame {
                expected: input_data.mount_frame.clone(),
                actual: ee_pose.frame_id.clone(),
            });
        }

        // One consistent set of gains for the whole cycle
        let gains = self.gains.snapshot().map_err(VelCompError::Gains)?;
        self.report.gains_version = gains.version;

        let base_vel = PlanarVel::from(sample);
        let comp = calc_compensation(
            &base_vel,
            &ee_pose.pose.position_m,
            &mount_offset_m,
            &gains.value,
        );
        self.report.speed_limited = comp.speed_limited;

        let cmd = match rate_ref {
            Some(r) => {
                let (cmd, limited) = rate_limit(
                    &r.cmd,
                    &comp.cmd,
                    sample.stamp_s - r.stamp_s,
                    gains.value.accel_limit_ms2,
                );
                self.report.accel_limited = limited;
                cmd
            }
            None => comp.cmd,
        };

        // Update the rate limit references
        let record = CmdRecord {
            stamp_s: sample.stamp_s,
            cmd,
        };
        if !self.report.duplicate {
            self.prev_cmd = self.last_cmd;
        }
        self.last_cmd = Some(record);

        trace!(
            "VelComp {:.3} s: induced {:?}, cmd {:?}",
            sample.stamp_s,
            comp.induced_ms.as_slice(),
            cmd.linear_ms.as_slice()
        );

        self.arch_record = Some(CompArchRecord {
            stamp_s: sample.stamp_s,
            base_vx_ms: base_vel.vx_ms,
            base_vy_ms: base_vel.vy_ms,
            base_wz_rads: base_vel.wz_rads,
            lever_arm_x_m: comp.lever_arm_m.x,
            lever_arm_y_m: comp.lever_arm_m.y,
            induced_x_ms: comp.induced_ms.x,
            induced_y_ms: comp.induced_ms.y,
            cmd_x_ms: cmd.linear_ms.x,
            cmd_y_ms: cmd.linear_ms.y,
            cmd_wz_rads: cmd.angular_rads.z,
            speed_limited: self.report.speed_limited,
            accel_limited: self.report.accel_limited,
            gains_version: gains.version,
        });

        Ok((Some(cmd.to_dems(sample.stamp_s)), self.report))
    }
}

impl Archived for VelComp {
    fn write(&mut self) -> Result<(), ArchiveError> {
        if let (Some(arch), Some(record)) = (self.arch.as_mut(), self.arch_record) {
            arch.serialise(record)?;
        }

        Ok(())
    }
}

impl VelComp {
    pub fn new(params: Params, gains: Arc<ParamStore<VelCompGains>>) -> Self {
        Self {
            params,
            gains,
            mode: VelCompMode::AwaitingOffset,
            mount_offset_m: None,
            last_cmd: None,
            prev_cmd: None,
            report: StatusReport::default(),
            arch: None,
            arch_record: None,
        }
    }

    /// Archive every command to `vel_comp.csv` in the session's archive.
    pub fn enable_archive(&mut self, session: &Session) -> Result<(), ArchiveError> {
        self.arch = Some(Archiver::from_path(session, "vel_comp.csv")?);
        Ok(())
    }

    pub fn mode(&self) -> VelCompMode {
        self.mode
    }

    pub fn mount_offset_m(&self) -> Option<Vector2<f64>> {
        self.mount_offset_m
    }

    /// Forget the previous commands, so that the next command is not rate
    /// limited. Used when the command stream has been interrupted.
    pub fn reset_rate_limit(&mut self) {
        self.last_cmd = None;
        self.prev_cmd = None;
    }
}

/// The longest time `init` can spend resolving the static offset.
pub fn offset_resolution_budget(params: &Params) -> Duration {
    let attempts = params.offset_resolve_attempts.max(1);
    let mut total_s = params.offset_resolve_timeout_s * attempts as f64;
    let mut backoff_s = params.offset_retry_backoff_s;

    for _ in 1..attempts {
        total_s += backoff_s;
        backoff_s *= 2.0;
    }

    seconds_to_std(total_s)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        frames::{FrameTree, Pose},
        jacobian::induced_velocity,
    };
    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

    fn offset_source(tree: Arc<FrameTree>) -> OffsetSource {
        OffsetSource {
            resolver: FrameResolver::new(tree).with_poll_period(Duration::from_millis(1)),
            base_frame: "base_link".into(),
            mount_frame: "arm_base".into(),
        }
    }

    fn quick_params() -> Params {
        Params {
            max_sample_age_s: 0.5,
            offset_resolve_attempts: 3,
            offset_resolve_timeout_s: 0.01,
            offset_retry_backoff_s: 0.001,
            gains: VelCompGains::default(),
        }
    }

    fn running(gains: VelCompGains) -> VelComp {
        let tree = Arc::new(FrameTree::new(10.0));
        tree.set_static(
            "base_link",
            "arm_base",
            Isometry3::from_parts(Translation3::new(0.3, 0.0, 0.4), UnitQuaternion::identity()),
        )
        .unwrap();

        let mut vc = VelComp::new(
            quick_params(),
            Arc::new(ParamStore::new(gains).unwrap()),
        );
        vc.init(offset_source(tree)).unwrap();
        vc
    }

    fn input(stamp_s: f64, vx: f64, wz: f64, now_s: f64) -> InputData {
        InputData {
            base_vel: BaseVelSample {
                stamp_s,
                linear_x_ms: vx,
                linear_y_ms: 0.0,
                angular_z_rads: wz,
            },
            ee_pose: Some(Arc::new(PoseStamped {
                frame_id: "arm_base".into(),
                stamp_s,
                pose: Pose::tool_down(Vector3::new(0.2, 0.0, 0.3)),
            })),
            mount_frame: "arm_base".into(),
            now_s,
        }
    }

    fn no_limits() -> VelCompGains {
        VelCompGains {
            linear_speed_limit_ms: 2.0,
            accel_limit_ms2: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_scenario() {
        let mut vc = running(no_limits());
        assert_eq!(vc.mode(), VelCompMode::Running);
        assert_eq!(vc.mount_offset_m(), Some(Vector2::new(0.3, 0.0)));

        let (dems, report) = vc.proc(&input(1.0, 0.2, 0.1, 1.0)).unwrap();
        let dems = dems.unwrap();

        assert_relative_eq!(dems.linear_ms[0], -0.2, epsilon = 1e-12);
        assert_relative_eq!(dems.linear_ms[1], -0.05, epsilon = 1e-12);
        assert_eq!(dems.linear_ms[2], 0.0);
        assert_eq!(dems.angular_rads, [0.0; 3]);
        assert_eq!(dems.stamp_s, 1.0);
        assert_eq!(report, StatusReport::default());
    }

    #[test]
    fn test_default_gains_cancel_induced_exactly() {
        let mut vc = running(VelCompGains::default());

        // Lever arm is the mount offset plus the ee position
        let induced = induced_velocity(&PlanarVel::new(0.2, 0.0, 0.1), &Vector2::new(0.5, 0.0));

        vc.proc(&input(1.0, 0.0, 0.0, 1.0)).unwrap();
        let (first, first_report) = vc.proc(&input(1.05, 0.2, 0.1, 1.05)).unwrap();
        let (second, second_report) = vc.proc(&input(1.1, 0.2, 0.1, 1.1)).unwrap();
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.linear_ms, second.linear_ms);
        assert_eq!(first.angular_rads, second.angular_rads);
        assert_eq!(first.linear_ms, [-induced.x, -induced.y, -induced.z]);
        assert_relative_eq!(first.linear_ms[0], -0.2, epsilon = 1e-12);
        assert_relative_eq!(first.linear_ms[1], -0.05, epsilon = 1e-12);

        assert!(!first_report.accel_limited && !second_report.accel_limited);
        assert!(!first_report.speed_limited && !second_report.speed_limited);
    }

    #[test]
    fn test_offset_unresolved_is_fatal() {
        // The mount frame is never published
        let tree = Arc::new(FrameTree::new(10.0));
        let mut vc = VelComp::new(
            quick_params(),
            Arc::new(ParamStore::new(no_limits()).unwrap()),
        );

        match vc.init(offset_source(tree)) {
            Err(VelCompError::OffsetUnresolved { attempts, .. }) => assert_eq!(attempts, 3),
            r => panic!("Expected OffsetUnresolved, got {:?}", r),
        }

        assert_eq!(vc.mode(), VelCompMode::AwaitingOffset);
        assert!(matches!(
            vc.proc(&input(1.0, 0.2, 0.1, 1.0)),
            Err(VelCompError::NotRunning(VelCompMode::AwaitingOffset))
        ));
    }

    #[test]
    fn test_offset_resolved_after_retry() {
        let tree = Arc::new(FrameTree::new(10.0));
        let publisher = tree.clone();

        // Publish the mount a little after startup
        let jh = thread::spawn(move || {
            thread::sleep(Duration::from_millis(15));
            publisher
                .set_static("base_link", "arm_base", Isometry3::identity())
                .unwrap();
        });

        let mut vc = VelComp::new(
            Params {
                offset_resolve_attempts: 10,
                ..quick_params()
            },
            Arc::new(ParamStore::new(no_limits()).unwrap()),
        );
        vc.init(offset_source(tree)).unwrap();
        jh.join().unwrap();

        assert_eq!(vc.mode(), VelCompMode::Running);
    }

    #[test]
    fn test_stale_and_out_of_order() {
        let mut vc = running(no_limits());

        let (out, report) = vc.proc(&input(1.0, 0.2, 0.0, 2.0)).unwrap();
        assert!(out.is_none());
        assert!(report.stale_sample);

        assert!(vc.proc(&input(2.0, 0.2, 0.0, 2.0)).unwrap().0.is_some());

        let (out, report) = vc.proc(&input(1.9, 0.2, 0.0, 2.0)).unwrap();
        assert!(out.is_none());
        assert!(report.out_of_order);
    }

    #[test]
    fn test_duplicate_recomputed_identically() {
        let mut vc = running(VelCompGains {
            accel_limit_ms2: 0.5,
            ..no_limits()
        });

        vc.proc(&input(1.0, 0.0, 0.0, 1.0)).unwrap();
        let (first, _) = vc.proc(&input(1.1, 0.2, 0.1, 1.1)).unwrap();
        let (again, report) = vc.proc(&input(1.1, 0.2, 0.1, 1.1)).unwrap();

        assert!(report.duplicate);
        assert!(report.accel_limited);
        assert_eq!(first, again);
    }

    #[test]
    fn test_accel_limit() {
        let mut vc = running(VelCompGains {
            accel_limit_ms2: 1.0,
            ..no_limits()
        });

        vc.proc(&input(1.0, 0.0, 0.0, 1.0)).unwrap();
        let (dems, report) = vc.proc(&input(1.1, 0.5, 0.0, 1.1)).unwrap();

        assert!(report.accel_limited);
        assert_relative_eq!(dems.unwrap().linear_ms[0], -0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_live_gains_used() {
        let gains = Arc::new(ParamStore::new(no_limits()).unwrap());
        let tree = Arc::new(FrameTree::new(10.0));
        tree.set_static("base_link", "arm_base", Isometry3::identity())
            .unwrap();
        let mut vc = VelComp::new(quick_params(), gains.clone());
        vc.init(offset_source(tree)).unwrap();

        gains.set("comp_gain", 0.5).unwrap();
        let (dems, report) = vc.proc(&input(1.0, 0.2, 0.0, 1.0)).unwrap();

        assert_eq!(report.gains_version, 1);
        assert_relative_eq!(dems.unwrap().linear_ms[0], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_ee_pose_required() {
        let mut vc = running(no_limits());

        let mut data = input(1.0, 0.2, 0.0, 1.0);
        data.ee_pose = None;
        assert!(matches!(vc.proc(&data), Err(VelCompError::NoEePose)));

        let mut data = input(1.0, 0.2, 0.0, 1.0);
        data.mount_frame = "tool0".into();
        assert!(matches!(
            vc.proc(&data),
            Err(VelCompError::WrongEeFrame { .. })
        ));
    }

    #[test]
    fn test_resolution_budget() {
        let budget = offset_resolution_budget(&Params {
            offset_resolve_attempts: 3,
            offset_resolve_timeout_s: 1.0,
            offset_retry_backoff_s: 0.5,
            ..Params::default()
        });

        assert_relative_eq!(budget.as_secs_f64(), 4.5, epsilon = 1e-6);
    }
}
