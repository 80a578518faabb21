//! Main compensation executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Seed the frame tree with the static transforms
//!     - Resolve the static base to arm mount offset (fatal on failure)
//!     - Start the workers:
//!         - VelComp, run on every base velocity sample
//!         - Dispatch, run on every new path
//!     - Main loop, replaying the input script:
//!         - Base poses into the frame tree
//!         - End effector poses into the data store
//!         - Base velocity samples to VelComp
//!         - Paths to the dispatcher
//!         - Parameter updates to the live gains
//!     - Drain the workers and exit
//!
//! # Modules
//!
//! All cyclic modules (e.g. `vel_comp`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Sender},
        Arc,
    },
    thread,
};
use structopt::StructOpt;

// Internal
use comms_if::{eqpt::base::BaseVelSample, Msg};
use mmc_lib::{
    data_store::DataStore,
    frames::{FrameResolver, FrameTree},
    params::MmcExecParams,
    path_xform::{self, Path, PathFrameTransformer},
    reconf::ParamStore,
    target_disp::{
        self, DispatchSummary, DispatchWorker, LinearPlanner, PathIntake, SimExecutor,
        TargetDispatcher,
    },
    vel_comp::{
        self, offset_resolution_budget, OffsetSource, VelComp, VelCompGains, VelCompSummary,
        VelCompWorker,
    },
};
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingMsgs, ScriptInterpreter},
    session::{self, Session},
    time::seconds_to_std,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Mobile manipulator compensation executable.
#[derive(Debug, StructOpt)]
#[structopt(name = "mmc_exec")]
struct Opts {
    /// Input script to replay
    #[structopt(parse(from_os_str))]
    script: PathBuf,

    /// Include debug and trace messages in the log
    #[structopt(short, long)]
    verbose: bool,
}

/// Destinations of the script's messages.
struct Streams {
    tree: Arc<FrameTree>,
    resolver: FrameResolver,
    store: Arc<DataStore>,
    gains: Arc<ParamStore<VelCompGains>>,
    base_vel_tx: Sender<BaseVelSample>,
    intake: PathIntake,
    exec_params: MmcExecParams,

    /// Session time at which the script started, added to every stamp
    replay_start_s: f64,
}

#[derive(Serialize)]
struct ExecSummary {
    vel_comp: VelCompSummary,
    dispatch: DispatchSummary,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("mmc_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(
        match opts.verbose {
            true => LevelFilter::Trace,
            false => LevelFilter::Info,
        },
        &session,
    )
    .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Mobile Manipulator Compensation Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: MmcExecParams =
        util::params::load("mmc_exec.toml").wrap_err("Could not load exec params")?;
    let vel_comp_params: vel_comp::Params =
        util::params::load("vel_comp.toml").wrap_err("Could not load VelComp params")?;
    let path_xform_params: path_xform::Params =
        util::params::load("path_xform.toml").wrap_err("Could not load PathXform params")?;
    let target_disp_params: target_disp::Params =
        util::params::load("target_disp.toml").wrap_err("Could not load TargetDisp params")?;

    info!("Exec parameters loaded");

    // ---- LOAD SCRIPT ----

    info!("Loading script from {:?}", opts.script);

    let mut si = ScriptInterpreter::new(&opts.script).wrap_err("Failed to load script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} messages\n",
        si.get_duration(),
        si.get_num_msgs()
    );

    // ---- FRAMES ----

    let tree = Arc::new(FrameTree::new(exec_params.frame_cache_time_s));

    for st in exec_params.static_transforms.iter() {
        tree.set_static(&st.parent, &st.child, st.to_isometry())
            .wrap_err_with(|| format!("Invalid static transform {} -> {}", st.parent, st.child))?;
        debug!("Static transform {} -> {} added", st.parent, st.child);
    }

    let resolver = FrameResolver::new(tree.clone());
    let store = Arc::new(DataStore::default());

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let gains = Arc::new(
        ParamStore::new(vel_comp_params.gains.clone()).wrap_err("Invalid initial VelComp gains")?,
    );

    info!(
        "Resolving the static offset, allowing up to {:.1} s",
        offset_resolution_budget(&vel_comp_params).as_secs_f64()
    );

    let mut vel_comp = VelComp::new(vel_comp_params, gains.clone());
    vel_comp
        .enable_archive(&session)
        .wrap_err("Failed to create the VelComp archive")?;
    vel_comp
        .init(OffsetSource {
            resolver: resolver.clone(),
            base_frame: exec_params.base_frame.clone(),
            mount_frame: exec_params.arm_base_frame.clone(),
        })
        .wrap_err("Failed to initialise VelComp")?;
    info!("VelComp init complete");

    let xformer = PathFrameTransformer::new(
        path_xform_params,
        resolver.clone(),
        &exec_params.arm_base_frame,
    );

    let planner = LinearPlanner::new(
        target_disp_params.planner.clone(),
        &exec_params.arm_base_frame,
    )
    .with_store(store.clone());
    let executor =
        SimExecutor::new(target_disp_params.executor.clone())
            .with_store(store.clone(), session::get_elapsed_seconds);
    let dispatcher = TargetDispatcher::new(
        Box::new(planner),
        Box::new(executor),
        &exec_params.arm_base_frame,
        target_disp_params.stop_after_success,
    );
    info!("TargetDispatcher init complete");

    info!("Module initialisation complete\n");

    // ---- START WORKERS ----

    let (base_vel_tx, base_vel_rx) = channel();
    let vel_comp_worker = VelCompWorker::new(
        vel_comp,
        base_vel_rx,
        store.clone(),
        &exec_params.arm_base_frame,
    );
    let vel_comp_jh = thread::spawn(move || vel_comp_worker.run(session::get_elapsed_seconds));

    let (intake, path_receiver) = PathIntake::channel();
    let dispatch_stop = Arc::new(AtomicBool::new(false));
    let dispatch_worker =
        DispatchWorker::new(xformer, dispatcher, path_receiver, target_disp_params);
    let worker_stop = dispatch_stop.clone();
    let dispatch_jh =
        thread::spawn(move || dispatch_worker.run(worker_stop, session::get_elapsed_seconds));

    // ---- MAIN LOOP ----

    let cycle_period = seconds_to_std(exec_params.cycle_period_s);

    let streams = Streams {
        tree,
        resolver,
        store,
        gains,
        base_vel_tx,
        intake,
        exec_params,
        replay_start_s: session::get_elapsed_seconds(),
    };

    info!("Beginning script replay\n");

    loop {
        let replay_time_s = session::get_elapsed_seconds() - streams.replay_start_s;

        match si.get_pending_msgs_at(replay_time_s) {
            PendingMsgs::None => (),
            PendingMsgs::Some(msgs) => {
                for msg in msgs {
                    streams.route(msg);
                }
            }
            // Exit if end of script reached
            PendingMsgs::EndOfScript => {
                info!("End of script reached, stopping");
                break;
            }
        }

        thread::sleep(cycle_period);
    }

    // ---- SHUTDOWN ----

    // Dropping the senders lets the workers finish what's pending then exit
    let Streams {
        base_vel_tx,
        intake,
        ..
    } = streams;
    drop(base_vel_tx);
    drop(intake);

    let vel_comp_summary = vel_comp_jh
        .join()
        .map_err(|_| eyre!("The VelComp worker panicked"))?;

    dispatch_stop.store(true, Ordering::Relaxed);
    let dispatch_summary = dispatch_jh
        .join()
        .map_err(|_| eyre!("The dispatch worker panicked"))?;

    session.save(
        "summary.json",
        ExecSummary {
            vel_comp: vel_comp_summary,
            dispatch: dispatch_summary,
        },
    );

    info!("End of execution");

    session.exit();

    Ok(())
}

impl Streams {
    /// Send a script message to the stream it belongs to.
    fn route(&self, msg: Msg) {
        let offset_s = self.replay_start_s;
        let kind = msg.kind();

        let result = match msg {
            Msg::Path(update) => {
                let mut path = Path::from(&update);
                path.stamp_s += offset_s;

                info!("New path of {} points", path.len());
                self.intake.submit(path).map_err(|e| e.to_string())
            }
            Msg::BaseVel(mut sample) => {
                sample.stamp_s += offset_s;
                self.base_vel_tx.send(sample).map_err(|e| e.to_string())
            }
            Msg::BasePose(mut sample) => {
                sample.header.stamp_s += offset_s;
                self.store
                    .ingest_base_pose(&sample, &self.tree, &self.exec_params.base_frame)
                    .map_err(|e| e.to_string())
            }
            Msg::EePose(mut sample) => {
                sample.header.stamp_s += offset_s;
                self.store
                    .ingest_ee_pose(
                        &sample,
                        &self.resolver,
                        &self.exec_params.arm_base_frame,
                        seconds_to_std(self.exec_params.ee_lookup_timeout_s),
                    )
                    .map_err(|e| e.to_string())
            }
            Msg::Param(update) => self
                .gains
                .set(&update.name, update.value)
                .map(|_| ())
                .map_err(|e| e.to_string()),
        };

        if let Err(e) = result {
            warn!("Could not handle {} message: {}", kind, e);
        }
    }
}
