//! Dispatch worker
//!
//! Runs the path to target pipeline on its own thread: takes the newest path
//! from the intake, transforms it into an arm target and dispatches it.
//! Failures only abandon the current path.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{info, warn};
use serde::Serialize;

use super::{
    CancelToken, DiagSink, Diagnostic, DispatchError, DispatchOutcome, ExecOutcome, Params,
    PathReceiver, SessionSink, TargetDispatcher, LOCAL_TARGET_DIAG, ORIENTED_PATH_DIAG,
    ORIGINAL_PATH_DIAG,
};
use crate::path_xform::{Path, PathFrameTransformer, PathXformError};
use util::time::seconds_to_std;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Processes paths from the intake until stopped.
pub struct DispatchWorker {
    xformer: PathFrameTransformer,
    dispatcher: TargetDispatcher,
    receiver: PathReceiver,
    params: Params,

    diag: Option<Arc<dyn DiagSink>>,
}

/// Counts of what happened to the paths received.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct DispatchSummary {
    pub paths: usize,
    pub invalid_paths: usize,
    pub frame_failures: usize,
    pub invalid_targets: usize,
    pub planning_failures: usize,
    pub unsupported: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub exec_failures: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DispatchWorker {
    pub fn new(
        xformer: PathFrameTransformer,
        dispatcher: TargetDispatcher,
        receiver: PathReceiver,
        params: Params,
    ) -> Self {
        let worker = Self {
            xformer,
            dispatcher,
            receiver,
            params,
            diag: None,
        };

        match worker.params.save_diagnostics {
            true => worker.with_diagnostics(Arc::new(SessionSink)),
            false => worker,
        }
    }

    /// Send the pipeline diagnostics, including the planned trajectories, to
    /// `sink`.
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagSink>) -> Self {
        self.dispatcher.set_diagnostics(sink.clone());
        self.diag = Some(sink);
        self
    }

    /// Run until `stop` is set or the intake is closed.
    ///
    /// `clock` gives the current session time.
    pub fn run<C>(mut self, stop: Arc<AtomicBool>, clock: C) -> DispatchSummary
    where
        C: Fn() -> f64,
    {
        let mut summary = DispatchSummary::default();
        let poll = seconds_to_std(self.params.idle_poll_period_s);

        while !stop.load(Ordering::Relaxed) {
            match self.receiver.recv_freshest(poll) {
                Ok(Some((path, cancel))) => {
                    self.handle(&path, &cancel, clock(), &mut summary)
                }
                Ok(None) => (),
                Err(_) => {
                    info!("Path intake closed");
                    break;
                }
            }
        }

        info!("Dispatch worker stopped: {:?}", summary);
        summary
    }

    /// Transform and dispatch a single path.
    pub fn handle(
        &mut self,
        path: &Path,
        cancel: &CancelToken,
        now_s: f64,
        summary: &mut DispatchSummary,
    ) {
        summary.paths += 1;

        self.save_diag(ORIGINAL_PATH_DIAG, || Diagnostic::OriginalPath(path.clone()));

        let output = match self.xformer.process(path, now_s) {
            Ok(o) => o,
            Err(PathXformError::Path(e)) => {
                warn!("Rejected path: {}", e);
                summary.invalid_paths += 1;
                return;
            }
            Err(PathXformError::Frame(e)) => {
                warn!("Abandoning path: {}", e);
                summary.frame_failures += 1;
                return;
            }
        };

        self.save_diag(LOCAL_TARGET_DIAG, || {
            Diagnostic::LocalTarget(output.target.clone())
        });
        self.save_diag(ORIENTED_PATH_DIAG, || {
            Diagnostic::OrientedPath(output.oriented.clone())
        });

        match self.dispatcher.dispatch(&output.target, cancel) {
            Ok(DispatchOutcome::Accepted(ExecOutcome::Completed)) => summary.completed += 1,
            Ok(DispatchOutcome::Accepted(ExecOutcome::Cancelled)) => summary.cancelled += 1,
            Ok(DispatchOutcome::PlanningFailed(_)) => summary.planning_failures += 1,
            Ok(DispatchOutcome::Unsupported(reason)) => {
                info!("Target not dispatched: {}", reason);
                summary.unsupported += 1;
            }
            Err(DispatchError::InvalidTarget(e)) => {
                warn!("Invalid target: {}", e);
                summary.invalid_targets += 1;
            }
            Err(e) => {
                warn!("Dispatch failed: {}", e);
                summary.exec_failures += 1;
            }
        }
    }

    fn save_diag<F>(&self, name: &str, diag: F)
    where
        F: FnOnce() -> Diagnostic,
    {
        if let Some(ref sink) = self.diag {
            sink.save(name, diag());
        }
    }
}
