//! Surfel record: an oriented colored disk with a confidence count.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// A surface element stored in the map.
///
/// Invalid records keep their slot in the store but carry a non-finite
/// position; the spatial index never references them.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Surfel {
    /// Disk center in the map frame, meters.
    pub position: Vector3<f32>,
    /// Unit normal in the map frame.
    pub normal: Vector3<f32>,
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Disk radius, meters.
    pub radius: f32,
    /// Number of supporting observations.
    pub confidence: u32,
}

impl Surfel {
    /// Create a surfel from a first observation (confidence 1).
    pub fn from_observation(
        position: Vector3<f32>,
        normal: Vector3<f32>,
        color: (u8, u8, u8),
        radius: f32,
    ) -> Self {
        Self {
            position,
            normal,
            r: color.0,
            g: color.1,
            b: color.2,
            radius,
            confidence: 1,
        }
    }

    /// The invalid sentinel: non-finite position, zero everything else.
    pub fn invalid() -> Self {
        Self {
            position: Vector3::new(f32::NAN, f32::NAN, f32::NAN),
            normal: Vector3::zeros(),
            r: 0,
            g: 0,
            b: 0,
            radius: 0.0,
            confidence: 0,
        }
    }

    /// True when the position is finite (the record is live).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.position.x.is_finite() && self.position.y.is_finite() && self.position.z.is_finite()
    }

    /// True when confidence has reached the reliability threshold.
    #[inline]
    pub fn is_reliable(&self, confidence_threshold: u32) -> bool {
        self.confidence >= confidence_threshold
    }

    /// Color as a tuple.
    #[inline]
    pub fn color(&self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_observation_starts_at_confidence_one() {
        let s = Surfel::from_observation(
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
            (128, 64, 32),
            0.01,
        );
        assert_eq!(s.confidence, 1);
        assert!(s.is_valid());
        assert!(!s.is_reliable(5));
    }

    #[test]
    fn test_invalid_sentinel() {
        let s = Surfel::invalid();
        assert!(!s.is_valid());
        assert_eq!(s.confidence, 0);
    }

    #[test]
    fn test_reliability_threshold_boundary() {
        let mut s = Surfel::from_observation(
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, -1.0),
            (0, 0, 0),
            0.01,
        );
        s.confidence = 5;
        assert!(s.is_reliable(5));
        s.confidence = 4;
        assert!(!s.is_reliable(5));
    }
}
