//! Sensor pose representation.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::MapperError;

/// Allowed deviation of an incoming quaternion norm from 1.
const UNIT_NORM_TOLERANCE: f32 = 1e-3;

/// Sensor pose in the map frame: origin plus orientation.
///
/// Transforms camera-frame points into the map frame via
/// `p_map = orientation * p_cam + origin`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SensorPose {
    /// Sensor origin in the map frame, meters.
    pub origin: Vector3<f32>,
    /// Sensor orientation (camera frame → map frame).
    pub orientation: UnitQuaternion<f32>,
}

impl SensorPose {
    /// Create a pose from an origin and an already-unit orientation.
    #[inline]
    pub fn new(origin: Vector3<f32>, orientation: UnitQuaternion<f32>) -> Self {
        Self {
            origin,
            orientation,
        }
    }

    /// Identity pose: origin at zero, no rotation.
    #[inline]
    pub fn identity() -> Self {
        Self {
            origin: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }

    /// Build a pose from raw quaternion components `(w, x, y, z)`.
    ///
    /// Rejects quaternions whose norm deviates from 1 beyond a small
    /// tolerance; the map is not mutated on refusal.
    pub fn from_parts(
        origin: Vector3<f32>,
        w: f32,
        x: f32,
        y: f32,
        z: f32,
    ) -> Result<Self, MapperError> {
        let q = Quaternion::new(w, x, y, z);
        let norm = q.norm();
        if !norm.is_finite() || (norm - 1.0).abs() > UNIT_NORM_TOLERANCE {
            return Err(MapperError::InvalidInput(format!(
                "quaternion norm {:.4} not unit",
                norm
            )));
        }
        Ok(Self {
            origin,
            orientation: UnitQuaternion::new_normalize(q),
        })
    }

    /// Transform a camera-frame point into the map frame.
    #[inline]
    pub fn to_map(&self, p_cam: &Vector3<f32>) -> Vector3<f32> {
        self.orientation * p_cam + self.origin
    }

    /// Transform a map-frame point into the camera frame.
    #[inline]
    pub fn to_camera(&self, p_map: &Vector3<f32>) -> Vector3<f32> {
        self.orientation.inverse() * (p_map - self.origin)
    }

    /// Rotate a camera-frame direction into the map frame (no translation).
    #[inline]
    pub fn rotate_to_map(&self, dir_cam: &Vector3<f32>) -> Vector3<f32> {
        self.orientation * dir_cam
    }
}

impl Default for SensorPose {
    fn default() -> Self {
        Self::identity()
    }
}
