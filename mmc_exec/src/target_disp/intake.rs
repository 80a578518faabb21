//! Path intake
//!
//! Paths are handed to the dispatch worker over a channel. Every submission
//! cancels the execution in progress, and the worker only ever acts on the
//! newest pending path.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{channel, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    time::Duration,
};

use log::debug;

use super::DispatchError;
use crate::path_xform::Path;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Sending side of the path channel.
///
/// Clones share the sender, so the generation stamped on a path always
/// follows the channel order.
#[derive(Clone)]
pub struct PathIntake {
    tx: Arc<Mutex<Sender<(u64, Path)>>>,
    generation: Arc<AtomicU64>,
}

/// Receiving side of the path channel.
pub struct PathReceiver {
    rx: Receiver<(u64, Path)>,
    generation: Arc<AtomicU64>,
}

/// Tells an execution whether a newer path has been submitted since it
/// started.
#[derive(Clone, Debug)]
pub struct CancelToken {
    generation: Arc<AtomicU64>,
    issued: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathIntake {
    /// Create a connected intake and receiver.
    pub fn channel() -> (PathIntake, PathReceiver) {
        let (tx, rx) = channel();
        let generation = Arc::new(AtomicU64::new(0));

        (
            PathIntake {
                tx: Arc::new(Mutex::new(tx)),
                generation: generation.clone(),
            },
            PathReceiver { rx, generation },
        )
    }

    /// Submit a new path, cancelling whatever is currently being executed.
    pub fn submit(&self, path: Path) -> Result<(), DispatchError> {
        // Held across the increment and the send
        let tx = self.tx.lock().map_err(|_| DispatchError::IntakeClosed)?;
        let issued = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        tx.send((issued, path))
            .map_err(|_| DispatchError::IntakeClosed)
    }
}

impl PathReceiver {
    /// Wait up to `timeout` for a path and return the newest one pending, with
    /// the token that cancels its execution.
    ///
    /// Returns `Ok(None)` on timeout.
    pub fn recv_freshest(
        &self,
        timeout: Duration,
    ) -> Result<Option<(Path, CancelToken)>, DispatchError> {
        let (mut issued, mut path) = match self.rx.recv_timeout(timeout) {
            Ok(p) => p,
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => return Err(DispatchError::IntakeClosed),
        };

        // Drop any older paths still pending
        let mut dropped = 0;
        while let Ok((i, p)) = self.rx.try_recv() {
            issued = i;
            path = p;
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Dropped {} superseded paths", dropped);
        }

        Ok(Some((
            path,
            CancelToken {
                generation: self.generation.clone(),
                issued,
            },
        )))
    }
}

impl CancelToken {
    /// A token which is never cancelled.
    pub fn never() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            issued: 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.issued
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector3;
    use std::thread;

    fn path(x: f64) -> Path {
        Path::new("map", 0.0, vec![Vector3::new(x, 0.0, 0.0)])
    }

    #[test]
    fn test_freshest_wins() {
        let (intake, receiver) = PathIntake::channel();

        for i in 0..5 {
            intake.submit(path(i as f64)).unwrap();
        }

        let (p, token) = receiver
            .recv_freshest(Duration::from_millis(10))
            .unwrap()
            .unwrap();
        assert_eq!(p.points_m[0].x, 4.0);
        assert!(!token.is_cancelled());

        assert!(receiver
            .recv_freshest(Duration::from_millis(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_new_path_cancels() {
        let (intake, receiver) = PathIntake::channel();
        intake.submit(path(1.0)).unwrap();

        let (_, token) = receiver
            .recv_freshest(Duration::from_millis(10))
            .unwrap()
            .unwrap();
        intake.submit(path(2.0)).unwrap();

        assert!(token.is_cancelled());
        assert!(!CancelToken::never().is_cancelled());
    }

    #[test]
    fn test_closed() {
        let (intake, receiver) = PathIntake::channel();
        drop(receiver);
        assert_eq!(intake.submit(path(0.0)), Err(DispatchError::IntakeClosed));

        let (intake, receiver) = PathIntake::channel();
        drop(intake);
        assert!(matches!(
            receiver.recv_freshest(Duration::from_millis(1)),
            Err(DispatchError::IntakeClosed)
        ));
    }

    #[test]
    fn test_concurrent_submitters() {
        let (intake, receiver) = PathIntake::channel();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let intake = intake.clone();
                thread::spawn(move || {
                    for i in 0..200 {
                        intake.submit(path((t * 1000 + i) as f64)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // The last path in the channel carries the newest generation
        let (_, token) = receiver
            .recv_freshest(Duration::from_millis(10))
            .unwrap()
            .unwrap();
        assert!(!token.is_cancelled());
        assert_eq!(token.issued, 800);
    }
}
