//! Pinhole camera model: projection, inverse projection, frustum test.
//!
//! Coordinates follow the camera optical convention:
//! - X: right in the image
//! - Y: down in the image
//! - Z: forward (depth), positive in front of the sensor

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::MapperError;

/// Pinhole camera intrinsics.
///
/// `alpha`/`beta` are the focal lengths in pixels, `cx`/`cy` the principal
/// point. Provided once (from the first camera-info message); the mapper
/// ignores later values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length along image X, in pixels.
    pub alpha: f32,
    /// Focal length along image Y, in pixels.
    pub beta: f32,
    /// Principal point X, in pixels.
    pub cx: f32,
    /// Principal point Y, in pixels.
    pub cy: f32,
}

impl CameraIntrinsics {
    /// Create new intrinsics.
    #[inline]
    pub fn new(alpha: f32, beta: f32, cx: f32, cy: f32) -> Self {
        Self {
            alpha,
            beta,
            cx,
            cy,
        }
    }

    /// Check that the intrinsics describe a usable camera.
    ///
    /// Focal lengths must be finite and positive, the principal point finite.
    pub fn validate(&self) -> Result<(), MapperError> {
        let finite = self.alpha.is_finite()
            && self.beta.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite();
        if !finite || self.alpha <= 0.0 || self.beta <= 0.0 {
            return Err(MapperError::InvalidInput(format!(
                "non-positive or non-finite intrinsics (alpha={}, beta={}, cx={}, cy={})",
                self.alpha, self.beta, self.cx, self.cy
            )));
        }
        Ok(())
    }

    /// Project a camera-frame point to continuous pixel coordinates and depth.
    ///
    /// Returns `None` when the point is at or behind the image plane
    /// (`z <= 0`); frame bounds are not checked here.
    #[inline]
    pub fn project(&self, p: &Vector3<f32>) -> Option<(f32, f32, f32)> {
        if p.z <= 0.0 {
            return None;
        }
        let u = self.alpha * p.x / p.z + self.cx;
        let v = self.beta * p.y / p.z + self.cy;
        Some((u, v, p.z))
    }

    /// Project to the nearest integer pixel of a `width`×`height` image.
    ///
    /// Returns `None` when the point is behind the camera or the rounded
    /// pixel falls outside `[0, width) × [0, height)`.
    #[inline]
    pub fn project_to_pixel(
        &self,
        p: &Vector3<f32>,
        width: u32,
        height: u32,
    ) -> Option<(u32, u32, f32)> {
        let (u, v, z) = self.project(p)?;
        let ui = u.round();
        let vi = v.round();
        if ui < 0.0 || vi < 0.0 || ui >= width as f32 || vi >= height as f32 {
            return None;
        }
        Some((ui as u32, vi as u32, z))
    }

    /// Back-project pixel `(u, v)` at depth `z` into the camera frame.
    #[inline]
    pub fn unproject(&self, u: f32, v: f32, z: f32) -> Vector3<f32> {
        Vector3::new((u - self.cx) * z / self.alpha, (v - self.cy) * z / self.beta, z)
    }

    /// Frustum membership for a camera-frame point.
    ///
    /// Accepts points whose projection lands inside a `width`×`height` frame
    /// with depth in `[min_depth, max_depth]`.
    #[inline]
    pub fn in_frustum(
        &self,
        p: &Vector3<f32>,
        width: u32,
        height: u32,
        min_depth: f32,
        max_depth: f32,
    ) -> bool {
        match self.project(p) {
            Some((u, v, z)) => {
                z >= min_depth
                    && z <= max_depth
                    && u >= 0.0
                    && v >= 0.0
                    && u < width as f32
                    && v < height as f32
            }
            None => false,
        }
    }
}
