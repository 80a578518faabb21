//! Frame resolver
//!
//! Waits for transforms to become available in a [`TransformSource`], with an
//! explicit deadline so that a stalled frame graph can never hang the caller.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use log::trace;

use super::{
    FrameError, LookupError, LookupTime, PoseStamped, StampedTransform, TransformSource,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default period between two queries of the source while waiting.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Resolves transforms between named frames with a bounded wait.
///
/// The resolver performs no retries of its own beyond waiting for the
/// deadline, callers decide whether to retry or abandon the current cycle.
#[derive(Clone)]
pub struct FrameResolver {
    source: Arc<dyn TransformSource>,
    poll_period: Duration,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FrameResolver {
    pub fn new(source: Arc<dyn TransformSource>) -> Self {
        Self {
            source,
            poll_period: DEFAULT_POLL_PERIOD,
        }
    }

    /// Set the period between queries of the source while waiting.
    pub fn with_poll_period(mut self, poll_period: Duration) -> Self {
        self.poll_period = poll_period;
        self
    }

    /// Resolve the transform mapping `child` coordinates into `parent` at the
    /// given time, waiting at most `timeout` for it to become available.
    ///
    /// Unknown frames and requests newer than the source's data are waited on.
    /// Disconnected frames and requests older than the source's history fail
    /// immediately, since waiting can't fix them.
    pub fn resolve(
        &self,
        parent: &str,
        child: &str,
        at: LookupTime,
        timeout: Duration,
    ) -> Result<StampedTransform, FrameError> {
        let deadline = Instant::now() + timeout;

        loop {
            let pending = match self.source.lookup(parent, child, at) {
                Ok(t) => return Ok(t),
                Err(LookupError::NotConnected(_, _)) => {
                    return Err(FrameError::FrameUnavailable {
                        parent: parent.to_string(),
                        child: child.to_string(),
                    })
                }
                Err(LookupError::ExtrapolationPast {
                    requested_s,
                    oldest_s,
                    newest_s,
                }) => {
                    return Err(FrameError::FrameExtrapolation {
                        parent: parent.to_string(),
                        child: child.to_string(),
                        requested_s,
                        oldest_s,
                        newest_s,
                    })
                }
                Err(e) => e,
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(match pending {
                    LookupError::ExtrapolationFuture {
                        requested_s,
                        oldest_s,
                        newest_s,
                    } => FrameError::FrameExtrapolation {
                        parent: parent.to_string(),
                        child: child.to_string(),
                        requested_s,
                        oldest_s,
                        newest_s,
                    },
                    _ => FrameError::FrameTimeout {
                        parent: parent.to_string(),
                        child: child.to_string(),
                        timeout_s: timeout.as_secs_f64(),
                    },
                });
            }

            trace!("Waiting for {} -> {}: {}", parent, child, pending);

            thread::sleep(self.poll_period.min(deadline - now));
        }
    }

    /// Express a pose in another frame, using the transform at the pose's own
    /// stamp.
    pub fn transform_pose(
        &self,
        pose: &PoseStamped,
        target_frame: &str,
        timeout: Duration,
    ) -> Result<PoseStamped, FrameError> {
        if pose.frame_id == target_frame {
            return Ok(pose.clone());
        }

        let target_from_pose = self.resolve(
            target_frame,
            &pose.frame_id,
            LookupTime::At(pose.stamp_s),
            timeout,
        )?;

        Ok(pose.transformed(target_frame, &target_from_pose.transform))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Isometry3;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source which fails with the given error until `succeed_after` queries
    /// have been made.
    struct FakeSource {
        error: LookupError,
        succeed_after: Option<usize>,
        queries: AtomicUsize,
    }

    impl FakeSource {
        fn new(error: LookupError, succeed_after: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                error,
                succeed_after,
                queries: AtomicUsize::new(0),
            })
        }
    }

    impl TransformSource for FakeSource {
        fn lookup(
            &self,
            parent: &str,
            child: &str,
            _at: LookupTime,
        ) -> Result<StampedTransform, LookupError> {
            let n = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
            match self.succeed_after {
                Some(s) if n > s => Ok(StampedTransform {
                    parent: parent.into(),
                    child: child.into(),
                    stamp_s: 0.0,
                    transform: Isometry3::identity(),
                }),
                _ => Err(self.error.clone()),
            }
        }
    }

    fn resolver(source: Arc<FakeSource>) -> FrameResolver {
        FrameResolver::new(source).with_poll_period(Duration::from_millis(1))
    }

    #[test]
    fn test_timeout_when_never_available() {
        let source = FakeSource::new(LookupError::UnknownFrame("arm".into()), None);
        let start = Instant::now();

        let res = resolver(source.clone()).resolve(
            "map",
            "arm",
            LookupTime::Latest,
            Duration::from_millis(30),
        );

        assert!(matches!(res, Err(FrameError::FrameTimeout { .. })));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(source.queries.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn test_waits_until_available() {
        let source = FakeSource::new(LookupError::UnknownFrame("arm".into()), Some(3));

        let res = resolver(source.clone()).resolve(
            "map",
            "arm",
            LookupTime::Latest,
            Duration::from_secs(1),
        );

        assert!(res.is_ok());
        assert_eq!(source.queries.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_not_connected_fails_immediately() {
        let source = FakeSource::new(
            LookupError::NotConnected("map".into(), "arm".into()),
            None,
        );

        let res = resolver(source.clone()).resolve(
            "map",
            "arm",
            LookupTime::Latest,
            Duration::from_secs(10),
        );

        assert_eq!(
            res,
            Err(FrameError::FrameUnavailable {
                parent: "map".into(),
                child: "arm".into()
            })
        );
        assert_eq!(source.queries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_extrapolation() {
        let past = FakeSource::new(
            LookupError::ExtrapolationPast {
                requested_s: 0.0,
                oldest_s: 1.0,
                newest_s: 2.0,
            },
            None,
        );
        let res = resolver(past).resolve("map", "arm", LookupTime::At(0.0), Duration::from_secs(10));
        assert!(matches!(res, Err(FrameError::FrameExtrapolation { .. })));

        // Future requests are waited on, then reported as extrapolation
        let future = FakeSource::new(
            LookupError::ExtrapolationFuture {
                requested_s: 3.0,
                oldest_s: 1.0,
                newest_s: 2.0,
            },
            None,
        );
        let res = resolver(future.clone()).resolve(
            "map",
            "arm",
            LookupTime::At(3.0),
            Duration::from_millis(10),
        );
        assert!(matches!(res, Err(FrameError::FrameExtrapolation { .. })));
        assert!(future.queries.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn test_transform_pose() {
        use crate::frames::{FrameTree, Pose};
        use approx::assert_relative_eq;
        use nalgebra::{Translation3, UnitQuaternion, Vector3};

        let tree = Arc::new(FrameTree::new(5.0));
        tree.set_transform(
            "map",
            "arm_base",
            1.0,
            Isometry3::from_parts(Translation3::new(1.0, 1.0, 0.0), UnitQuaternion::identity()),
        )
        .unwrap();
        let resolver = FrameResolver::new(tree).with_poll_period(Duration::from_millis(1));

        let in_map = PoseStamped {
            frame_id: "map".into(),
            stamp_s: 1.0,
            pose: Pose::new(Vector3::new(1.5, 1.0, 0.4), UnitQuaternion::identity()),
        };

        let in_arm = resolver
            .transform_pose(&in_map, "arm_base", Duration::from_millis(10))
            .unwrap();
        assert_eq!(in_arm.frame_id, "arm_base");
        assert_relative_eq!(
            in_arm.pose.position_m,
            Vector3::new(0.5, 0.0, 0.4),
            epsilon = 1e-12
        );

        // Already in the right frame, no lookup needed
        assert_eq!(
            resolver
                .transform_pose(&in_arm, "arm_base", Duration::from_millis(0))
                .unwrap(),
            in_arm
        );
    }
}
