//! Keyframe scan preprocessing.
//!
//! Turns an organized RGB-D cloud into fusable scan points: estimates a
//! per-pixel normal from grid neighbors, orients it toward the sensor,
//! rejects grazing and out-of-range pixels, and computes the disk radius
//! each surviving pixel would cover.

use nalgebra::Vector3;

use crate::core::{CameraIntrinsics, OrganizedCloud, SensorPose};

/// One scan point that survived preprocessing.
#[derive(Clone, Copy, Debug)]
pub struct PreparedPoint {
    /// Source pixel column.
    pub u: u32,
    /// Source pixel row.
    pub v: u32,
    /// Position in the map frame.
    pub position: Vector3<f32>,
    /// Unit normal in the map frame, oriented toward the sensor.
    pub normal: Vector3<f32>,
    /// Camera-frame depth (meters).
    pub depth: f32,
    /// Disk radius covering one pixel's footprint (meters).
    pub radius: f32,
    /// Color channels.
    pub color: (u8, u8, u8),
}

/// Per-keyframe preprocessing counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreprocessStats {
    /// Pixels with non-finite position (no depth).
    pub missing: usize,
    /// Pixels dropped because a neighbor was missing or the normal was
    /// degenerate.
    pub dropped_normal: usize,
    /// Pixels dropped by the grazing-angle filter.
    pub dropped_grazing: usize,
    /// Pixels dropped by the depth range filter.
    pub dropped_depth: usize,
    /// Pixels that produced a scan point.
    pub valid: usize,
}

/// Output of [`ScanPreprocessor::prepare`]: surviving points in row-major
/// pixel order, plus drop counters.
#[derive(Clone, Debug)]
pub struct PreparedScan {
    /// Surviving scan points, row-major.
    pub points: Vec<PreparedPoint>,
    /// Drop counters.
    pub stats: PreprocessStats,
}

/// Configuration for scan preprocessing.
#[derive(Clone, Copy, Debug)]
pub struct PreprocessConfig {
    /// Minimum |z| of the camera-frame normal (grazing rejection).
    pub min_scan_znormal: f32,
    /// Minimum accepted depth (meters).
    pub min_depth: f32,
    /// Maximum accepted depth (meters).
    pub max_depth: f32,
}

/// Scan preprocessing stage.
#[derive(Clone, Copy, Debug)]
pub struct ScanPreprocessor {
    config: PreprocessConfig,
}

impl ScanPreprocessor {
    /// Create a preprocessor.
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Preprocess a keyframe.
    ///
    /// Pixels are visited row-major; a pixel that fails any step is
    /// dropped silently and counted.
    pub fn prepare(
        &self,
        cloud: &OrganizedCloud,
        pose: &SensorPose,
        camera: &CameraIntrinsics,
    ) -> PreparedScan {
        let mut points = Vec::new();
        let mut stats = PreprocessStats::default();

        for v in 0..cloud.height() {
            for u in 0..cloud.width() {
                let Some(center) = cloud.at(u, v) else {
                    continue;
                };
                if !center.is_finite() {
                    stats.missing += 1;
                    continue;
                }

                let Some(normal_cam) = estimate_normal(cloud, u, v) else {
                    stats.dropped_normal += 1;
                    continue;
                };

                // Orient toward the sensor (sensor sits at the camera-frame
                // origin, so the view ray is the point itself)
                let p_cam = center.position();
                let normal_cam = if normal_cam.dot(&p_cam) > 0.0 {
                    -normal_cam
                } else {
                    normal_cam
                };

                if normal_cam.z.abs() < self.config.min_scan_znormal {
                    stats.dropped_grazing += 1;
                    continue;
                }

                let depth = p_cam.z;
                if depth < self.config.min_depth || depth > self.config.max_depth {
                    stats.dropped_depth += 1;
                    continue;
                }

                // Disk large enough to cover one pixel's footprint on the
                // observed plane, worst-case diagonal
                let radius =
                    depth * std::f32::consts::SQRT_2 / (camera.alpha * normal_cam.z.abs());

                stats.valid += 1;
                points.push(PreparedPoint {
                    u,
                    v,
                    position: pose.to_map(&p_cam),
                    normal: pose.rotate_to_map(&normal_cam),
                    depth,
                    radius,
                    color: (center.r, center.g, center.b),
                });
            }
        }

        PreparedScan { points, stats }
    }
}

/// Estimate the camera-frame normal at `(u, v)` from grid neighbors.
///
/// Uses the cross product of the vectors to the `(u+1, v)` and `(u, v+1)`
/// neighbors; at the last column/row the backward neighbor substitutes
/// with corrected sign. Returns `None` when a neighbor is missing or the
/// cross product degenerates.
fn estimate_normal(cloud: &OrganizedCloud, u: u32, v: u32) -> Option<Vector3<f32>> {
    let center = cloud.at(u, v)?;

    let (ua, sign_u) = if u + 1 < cloud.width() {
        (u + 1, 1.0)
    } else if u > 0 {
        (u - 1, -1.0)
    } else {
        return None;
    };
    let (vb, sign_v) = if v + 1 < cloud.height() {
        (v + 1, 1.0)
    } else if v > 0 {
        (v - 1, -1.0)
    } else {
        return None;
    };

    let right = cloud.at(ua, v)?;
    let down = cloud.at(u, vb)?;
    if !right.is_finite() || !down.is_finite() {
        return None;
    }

    let du = (right.position() - center.position()) * sign_u;
    let dv = (down.position() - center.position()) * sign_v;
    let cross = du.cross(&dv);
    let norm = cross.norm();
    if !norm.is_finite() || norm < f32::MIN_POSITIVE {
        return None;
    }
    Some(cross / norm)
}
