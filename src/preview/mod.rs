//! Downsampled preview cloud generation.
//!
//! Collapses reliable surfels into a coarse colored point cloud for
//! visualization. Each preview voxel averages the first few reliable
//! surfels encountered in store order; the result is for display, not
//! measurement.

use std::collections::HashMap;

use nalgebra::Vector3;

use crate::octree::LeafCoord;
use crate::store::SurfelStore;

/// One point of the preview cloud.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreviewPoint {
    /// X coordinate, map frame, meters.
    pub x: f32,
    /// Y coordinate, map frame, meters.
    pub y: f32,
    /// Z coordinate, map frame, meters.
    pub z: f32,
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

/// Colored point cloud for preview display.
#[derive(Clone, Debug, Default)]
pub struct PreviewCloud {
    /// Preview points, one per occupied voxel. Order is
    /// implementation-defined.
    pub points: Vec<PreviewPoint>,
}

impl PreviewCloud {
    /// Number of preview points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when no voxel held a reliable surfel.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Running sums for one preview voxel.
#[derive(Clone, Copy, Debug, Default)]
struct VoxelAccum {
    count: u32,
    position_sum: Vector3<f32>,
    r_sum: u32,
    g_sum: u32,
    b_sum: u32,
}

/// Voxel-grid downsampler over the surfel store.
#[derive(Clone, Copy, Debug)]
pub struct PreviewGenerator {
    resolution: f32,
    samples_per_voxel: u32,
    confidence_threshold: u32,
}

impl PreviewGenerator {
    /// Create a generator.
    ///
    /// `samples_per_voxel` bounds how many reliable surfels contribute to
    /// each output point; surfels beyond the cap are skipped, keeping
    /// preview cost flat as map density grows.
    pub fn new(resolution: f32, samples_per_voxel: u32, confidence_threshold: u32) -> Self {
        Self {
            resolution,
            samples_per_voxel,
            confidence_threshold,
        }
    }

    /// Build a preview cloud from the store.
    ///
    /// Surfels are visited in store order, so the sampled subset per
    /// voxel is deterministic for a fixed map state.
    pub fn generate(&self, store: &SurfelStore) -> PreviewCloud {
        let mut voxels: HashMap<LeafCoord, VoxelAccum> = HashMap::new();

        for (_, surfel) in store.iter() {
            if !surfel.is_valid() || !surfel.is_reliable(self.confidence_threshold) {
                continue;
            }
            let key = LeafCoord::new(
                (surfel.position.x / self.resolution).floor() as i32,
                (surfel.position.y / self.resolution).floor() as i32,
                (surfel.position.z / self.resolution).floor() as i32,
            );
            let accum = voxels.entry(key).or_default();
            if accum.count >= self.samples_per_voxel {
                continue;
            }
            accum.count += 1;
            accum.position_sum += surfel.position;
            accum.r_sum += surfel.r as u32;
            accum.g_sum += surfel.g as u32;
            accum.b_sum += surfel.b as u32;
        }

        let points = voxels
            .values()
            .map(|accum| {
                let n = accum.count as f32;
                let mean = accum.position_sum / n;
                PreviewPoint {
                    x: mean.x,
                    y: mean.y,
                    z: mean.z,
                    r: (accum.r_sum / accum.count) as u8,
                    g: (accum.g_sum / accum.count) as u8,
                    b: (accum.b_sum / accum.count) as u8,
                }
            })
            .collect();

        PreviewCloud { points }
    }
}
