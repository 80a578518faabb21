//! Pose and velocity types
//!
//! Conversion from the wire types in `comms_if` happens here, so that invalid
//! data (non-finite values, attitudes which aren't rotations) is rejected at
//! the boundary.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::convert::TryFrom;

use comms_if::eqpt::{arm::ArmVelDems, Header, PoseData};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum deviation of an incoming attitude quaternion's norm from 1 before
/// it is rejected rather than normalised.
const MAX_QUAT_NORM_ERROR: f64 = 1e-3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A position and attitude. Meaningless without the frame it's expressed in,
/// see [`PoseStamped`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// The position in the parent frame
    pub position_m: Vector3<f64>,

    /// The attitude in the parent frame
    pub attitude_q: UnitQuaternion<f64>,
}

/// A pose tagged with its frame and the time it is valid at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub frame_id: String,
    pub stamp_s: f64,
    pub pose: Pose,
}

/// A 6 component velocity.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    /// Units: meters/second
    pub linear_ms: Vector3<f64>,

    /// Units: radians/second
    pub angular_rads: Vector3<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PoseError {
    #[error("The pose contains non-finite values")]
    NonFinite,

    #[error("The attitude quaternion is not a unit quaternion (norm = {0})")]
    NonUnitAttitude(f64),

    #[error("The pose has no frame id")]
    MissingFrame,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Pose {
    fn default() -> Self {
        Self {
            position_m: Vector3::zeros(),
            attitude_q: UnitQuaternion::identity(),
        }
    }
}

impl Pose {
    pub fn new(position_m: Vector3<f64>, attitude_q: UnitQuaternion<f64>) -> Self {
        Self {
            position_m,
            attitude_q,
        }
    }

    /// A pose at the given position with the tool pointing straight down, the
    /// fixed (roll, pitch, yaw) = (pi, 0, pi) attitude of the arm targets.
    pub fn tool_down(position_m: Vector3<f64>) -> Self {
        Self {
            position_m,
            attitude_q: UnitQuaternion::from_euler_angles(
                std::f64::consts::PI,
                0.0,
                std::f64::consts::PI,
            ),
        }
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self {
            position_m: iso.translation.vector,
            attitude_q: iso.rotation,
        }
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position_m), self.attitude_q)
    }

    /// Return the heading (angle to the positive X axis) in radians, in the
    /// range [-pi, pi].
    pub fn heading_rad(&self) -> f64 {
        self.attitude_q.euler_angles().2
    }
}

impl PoseStamped {
    /// Express this pose in another frame given the transform from this
    /// pose's frame into the target frame.
    pub fn transformed(&self, target_frame: &str, target_from_self: &Isometry3<f64>) -> Self {
        Self {
            frame_id: target_frame.to_string(),
            stamp_s: self.stamp_s,
            pose: Pose::from_isometry(&(target_from_self * self.pose.to_isometry())),
        }
    }

    /// Validate and convert a wire pose.
    pub fn from_wire(header: &Header, data: &PoseData) -> Result<Self, PoseError> {
        if header.frame_id.is_empty() {
            return Err(PoseError::MissingFrame);
        }
        if !header.stamp_s.is_finite() {
            return Err(PoseError::NonFinite);
        }

        Ok(Self {
            frame_id: header.frame_id.clone(),
            stamp_s: header.stamp_s,
            pose: Pose::try_from(data)?,
        })
    }
}

impl TryFrom<&PoseData> for Pose {
    type Error = PoseError;

    fn try_from(data: &PoseData) -> Result<Self, Self::Error> {
        if data
            .position_m
            .iter()
            .chain(data.attitude_q.iter())
            .any(|v| !v.is_finite())
        {
            return Err(PoseError::NonFinite);
        }

        let [x, y, z, w] = data.attitude_q;
        let q = Quaternion::new(w, x, y, z);
        let norm = q.norm();

        if (norm - 1.0).abs() > MAX_QUAT_NORM_ERROR {
            return Err(PoseError::NonUnitAttitude(norm));
        }

        Ok(Self {
            position_m: Vector3::from(data.position_m),
            attitude_q: UnitQuaternion::from_quaternion(q),
        })
    }
}

impl From<&Pose> for PoseData {
    fn from(pose: &Pose) -> Self {
        let q = pose.attitude_q.quaternion();
        Self {
            position_m: [pose.position_m.x, pose.position_m.y, pose.position_m.z],
            attitude_q: [q.i, q.j, q.k, q.w],
        }
    }
}

impl Default for Twist {
    fn default() -> Self {
        Self {
            linear_ms: Vector3::zeros(),
            angular_rads: Vector3::zeros(),
        }
    }
}

impl Twist {
    pub fn new(linear_ms: Vector3<f64>, angular_rads: Vector3<f64>) -> Self {
        Self {
            linear_ms,
            angular_rads,
        }
    }

    /// Convert into arm velocity demands for the given sample time.
    pub fn to_dems(&self, stamp_s: f64) -> ArmVelDems {
        ArmVelDems {
            stamp_s,
            linear_ms: [self.linear_ms.x, self.linear_ms.y, self.linear_ms.z],
            angular_rads: [
                self.angular_rads.x,
                self.angular_rads.y,
                self.angular_rads.z,
            ],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tool_down_points_down() {
        let pose = Pose::tool_down(Vector3::new(0.5, 0.0, 0.2));

        // The tool's z axis must point along -z of the parent frame
        let tool_z = pose.attitude_q * Vector3::z();
        assert_relative_eq!(tool_z, -Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_pose_from_wire() {
        let data = PoseData {
            position_m: [1.0, 2.0, 3.0],
            attitude_q: [0.0, 0.0, 0.0, 1.0],
        };
        let pose = Pose::try_from(&data).unwrap();
        assert_eq!(pose.position_m, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(PoseData::from(&pose), data);

        let bad_quat = PoseData {
            attitude_q: [0.0, 0.0, 0.0, 2.0],
            ..data
        };
        assert_eq!(
            Pose::try_from(&bad_quat),
            Err(PoseError::NonUnitAttitude(2.0))
        );

        let nan_pos = PoseData {
            position_m: [f64::NAN, 0.0, 0.0],
            ..data
        };
        assert_eq!(Pose::try_from(&nan_pos), Err(PoseError::NonFinite));
    }

    #[test]
    fn test_missing_frame_rejected() {
        let header = Header {
            frame_id: String::new(),
            stamp_s: 0.0,
        };
        assert_eq!(
            PoseStamped::from_wire(&header, &PoseData::default()),
            Err(PoseError::MissingFrame)
        );
    }

    #[test]
    fn test_transformed() {
        let ps = PoseStamped {
            frame_id: "map".into(),
            stamp_s: 1.0,
            pose: Pose::new(Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity()),
        };

        // Frame rotated by 90 deg about z, offset by 1 m in x
        let target_from_map = Isometry3::from_parts(
            Translation3::new(1.0, 0.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        );

        let out = ps.transformed("arm", &target_from_map);
        assert_eq!(out.frame_id, "arm");
        assert_relative_eq!(out.pose.position_m, Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(out.pose.heading_rad(), std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }
}
