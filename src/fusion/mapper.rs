//! The surfel mapper façade.
//!
//! Owns the surfel store and the spatial index as one aggregate: every
//! mutation flows through [`SurfelMapper::integrate`] or
//! [`SurfelMapper::reset_map`], so the index invariant (a surfel's
//! position stays inside the leaf voxel holding its index) cannot be
//! broken by outside callers.

use std::path::Path;
use std::time::Instant;

use log::{debug, info, warn};
use nalgebra::Vector3;

use crate::config::MapperConfig;
use crate::core::{CameraIntrinsics, OrganizedCloud, SensorPose, Surfel};
use crate::error::MapperError;
use crate::logger::StatsLogger;
use crate::octree::Octree;
use crate::preview::{PreviewCloud, PreviewGenerator};
use crate::store::SurfelStore;

use super::preprocess::{PreparedPoint, PreprocessConfig, PreprocessStats, ScanPreprocessor};

/// Default stats log path used when `logging` is enabled and no logger
/// is injected.
const DEFAULT_STATS_PATH: &str = "surfel_mapper_stats.tsv";

/// Counters and timings for one integrated keyframe.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameSummary {
    /// Total pixels in the keyframe.
    pub cloud_pixels: usize,
    /// Preprocessing drop counters.
    pub preprocess: PreprocessStats,
    /// Scan points matched to an existing surfel and blended in.
    pub matched: usize,
    /// Scan points inserted as new surfels.
    pub inserted: usize,
    /// Updates whose blended position had to be clamped to the voxel.
    pub position_clamped: usize,
    /// Updates whose positional part was skipped (clamp would distort by
    /// more than half a voxel).
    pub position_skipped: usize,
    /// Surfels passing the frustum pre-pass (`None` when disabled).
    pub frustum_candidates: Option<usize>,
    /// Preprocessing wall time, seconds.
    pub preprocess_seconds: f64,
    /// Association/update wall time, seconds.
    pub fusion_seconds: f64,
}

/// Online surfel map built from posed RGB-D keyframes.
///
/// # Example
///
/// ```rust,no_run
/// use bindu_map::{MapperConfig, SurfelMapper};
/// use bindu_map::core::{CameraIntrinsics, OrganizedCloud, SensorPose};
///
/// let config = MapperConfig::default().with_scene_size(1_000_000);
/// let mut mapper = SurfelMapper::new(config);
/// mapper.set_camera(CameraIntrinsics::new(525.0, 525.0, 319.5, 239.5)).unwrap();
///
/// let cloud = OrganizedCloud::new(640, 480);
/// let summary = mapper.integrate(&cloud, &SensorPose::identity()).unwrap();
/// println!("inserted {} surfels", summary.inserted);
/// ```
#[derive(Debug)]
pub struct SurfelMapper {
    config: MapperConfig,
    camera: Option<CameraIntrinsics>,
    preprocessor: ScanPreprocessor,
    store: SurfelStore,
    octree: Octree,
    stats: StatsLogger,
}

impl SurfelMapper {
    /// Create a mapper.
    ///
    /// The surfel store is preallocated to `config.scene_size` records.
    /// With `config.logging` enabled, per-frame stats go to
    /// `surfel_mapper_stats.tsv` in the working directory; use
    /// [`SurfelMapper::with_stats_logger`] to direct them elsewhere.
    pub fn new(config: MapperConfig) -> Self {
        let stats = if config.logging {
            StatsLogger::create(Path::new(DEFAULT_STATS_PATH))
        } else {
            StatsLogger::disabled()
        };
        Self::with_stats_logger(config, stats)
    }

    /// Create a mapper writing stats through the given logger.
    pub fn with_stats_logger(config: MapperConfig, stats: StatsLogger) -> Self {
        let preprocessor = ScanPreprocessor::new(PreprocessConfig {
            min_scan_znormal: config.min_scan_znormal,
            min_depth: config.min_kinect_dist,
            max_depth: config.max_kinect_dist,
        });
        Self {
            preprocessor,
            store: SurfelStore::with_capacity(config.scene_size),
            octree: Octree::new(config.octree_resolution),
            camera: None,
            stats,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Latched camera intrinsics, if any.
    pub fn camera(&self) -> Option<&CameraIntrinsics> {
        self.camera.as_ref()
    }

    /// Number of allocated surfel records.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True when the map holds no surfels.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Latch camera intrinsics.
    ///
    /// The first valid intrinsics win; later calls are ignored (the
    /// sensor does not change mid-run). Invalid intrinsics are refused
    /// without latching.
    pub fn set_camera(&mut self, intrinsics: CameraIntrinsics) -> Result<(), MapperError> {
        intrinsics.validate()?;
        if self.camera.is_some() {
            debug!("camera intrinsics already set; ignoring new message");
            return Ok(());
        }
        info!(
            "camera intrinsics latched: alpha={} beta={} cx={} cy={}",
            intrinsics.alpha, intrinsics.beta, intrinsics.cx, intrinsics.cy
        );
        self.camera = Some(intrinsics);
        Ok(())
    }

    /// Fuse one posed keyframe into the map.
    ///
    /// Pixels are visited row-major. Each surviving scan point is matched
    /// against surfels bucketed at its map position (restricted to the
    /// camera frustum when `use_frustum` is on); the closest-in-depth
    /// candidate within `dmax` is blended in place, anything else inserts
    /// a new surfel with confidence 1.
    ///
    /// # Errors
    ///
    /// [`MapperError::NotReady`] before intrinsics arrive (nothing is
    /// consumed; buffer and retry). [`MapperError::OutOfCapacity`] when
    /// the store fills mid-frame: pixels fused before exhaustion stand,
    /// the rest of the frame is abandoned.
    pub fn integrate(
        &mut self,
        cloud: &OrganizedCloud,
        pose: &SensorPose,
    ) -> Result<FrameSummary, MapperError> {
        let camera = self.camera.ok_or(MapperError::NotReady)?;

        let mut summary = FrameSummary {
            cloud_pixels: cloud.len(),
            ..FrameSummary::default()
        };
        self.stats.begin_frame();

        let t_pre = Instant::now();
        let scan = self.preprocessor.prepare(cloud, pose, &camera);
        summary.preprocess = scan.stats;
        summary.preprocess_seconds = t_pre.elapsed().as_secs_f64();

        let t_fuse = Instant::now();
        // Surfels present before this frame; inserts made while scanning
        // the frame never become candidates for its remaining pixels.
        let frame_start_len = self.store.len();

        let frustum_mask = if self.config.use_frustum {
            let mask = self.frustum_mask(&camera, cloud, pose, frame_start_len);
            summary.frustum_candidates = Some(mask.iter().filter(|&&m| m).count());
            Some(mask)
        } else {
            None
        };

        let mut capacity_hit = false;
        for point in &scan.points {
            let matched = if self.config.use_update {
                self.find_match(&camera, cloud, pose, point, frame_start_len, &frustum_mask)
            } else {
                None
            };

            match matched {
                Some(index) => {
                    self.update_surfel(index, point, &mut summary);
                    summary.matched += 1;
                }
                None => {
                    let surfel = Surfel::from_observation(
                        point.position,
                        point.normal,
                        point.color,
                        point.radius,
                    );
                    match self.store.allocate(surfel) {
                        Ok(index) => {
                            self.octree.insert(index, &point.position);
                            summary.inserted += 1;
                        }
                        Err(_) => {
                            capacity_hit = true;
                            break;
                        }
                    }
                }
            }
        }
        summary.fusion_seconds = t_fuse.elapsed().as_secs_f64();

        self.log_summary(&summary);

        if capacity_hit {
            warn!(
                "surfel store full ({} records); keyframe partially integrated \
                 ({} matched, {} inserted)",
                self.store.capacity(),
                summary.matched,
                summary.inserted
            );
            return Err(MapperError::OutOfCapacity {
                capacity: self.store.capacity(),
            });
        }

        debug!(
            "keyframe fused: {} valid points, {} matched, {} inserted, {} surfels total",
            summary.preprocess.valid,
            summary.matched,
            summary.inserted,
            self.store.len()
        );
        Ok(summary)
    }

    /// Mark every surfel whose position falls inside the current camera
    /// frustum. The mask covers indices below `frame_start_len`.
    fn frustum_mask(
        &self,
        camera: &CameraIntrinsics,
        cloud: &OrganizedCloud,
        pose: &SensorPose,
        frame_start_len: usize,
    ) -> Vec<bool> {
        let mut mask = vec![false; frame_start_len];
        for (_, bucket) in self.octree.leaves() {
            for &index in bucket {
                let Some(surfel) = self.store.get(index) else {
                    continue;
                };
                let p_cam = pose.to_camera(&surfel.position);
                if camera.in_frustum(
                    &p_cam,
                    cloud.width(),
                    cloud.height(),
                    self.config.min_kinect_dist,
                    self.config.max_kinect_dist,
                ) {
                    mask[index as usize] = true;
                }
            }
        }
        mask
    }

    /// Find the surfel this scan point updates, if any.
    ///
    /// Candidates come from the leaf bucket at the scan point's map
    /// position, in insertion order. A candidate must reproject to the
    /// scan pixel; among those, the one nearest in depth wins (ties keep
    /// the earlier-inserted), and only within `dmax`.
    fn find_match(
        &self,
        camera: &CameraIntrinsics,
        cloud: &OrganizedCloud,
        pose: &SensorPose,
        point: &PreparedPoint,
        frame_start_len: usize,
        frustum_mask: &Option<Vec<bool>>,
    ) -> Option<u32> {
        let mut best: Option<(u32, f32)> = None;

        for &index in self.octree.leaf_bucket(&point.position) {
            if (index as usize) >= frame_start_len {
                continue;
            }
            if let Some(mask) = frustum_mask {
                if !mask[index as usize] {
                    continue;
                }
            }
            let Some(surfel) = self.store.get(index) else {
                continue;
            };
            let p_cam = pose.to_camera(&surfel.position);
            let Some((u, v, depth)) =
                camera.project_to_pixel(&p_cam, cloud.width(), cloud.height())
            else {
                continue;
            };
            if u != point.u || v != point.v {
                continue;
            }
            let gap = (depth - point.depth).abs();
            match best {
                Some((_, best_gap)) if gap >= best_gap => {}
                _ => best = Some((index, gap)),
            }
        }

        match best {
            Some((index, gap)) if gap < self.config.dmax => Some(index),
            _ => None,
        }
    }

    /// Blend a scan point into an existing surfel.
    ///
    /// The positional blend is clamped so the surfel stays inside the
    /// leaf voxel holding its index; when clamping would move the result
    /// more than half a voxel off the blend target, the positional part
    /// is skipped entirely. Normal, color, radius and confidence always
    /// update.
    fn update_surfel(&mut self, index: u32, point: &PreparedPoint, summary: &mut FrameSummary) {
        let Some(coord) = self
            .store
            .get(index)
            .map(|s| self.octree.leaf_coord(&s.position))
        else {
            return;
        };
        let (vox_min, vox_max) = self.octree.voxel_bounds(coord);
        let resolution = self.octree.resolution();
        // Keep the clamped position strictly below the upper voxel face
        let margin = resolution * 1e-4;

        let Some(surfel) = self.store.get_mut(index) else {
            return;
        };
        let k = surfel.confidence as f32;
        let inv = 1.0 / (k + 1.0);

        let blended = (surfel.position * k + point.position) * inv;
        let clamped = Vector3::new(
            blended.x.clamp(vox_min.x, vox_max.x - margin),
            blended.y.clamp(vox_min.y, vox_max.y - margin),
            blended.z.clamp(vox_min.z, vox_max.z - margin),
        );
        let distortion = (clamped - blended).amax();
        if distortion > resolution * 0.5 {
            summary.position_skipped += 1;
        } else {
            if clamped != blended {
                summary.position_clamped += 1;
            }
            surfel.position = clamped;
        }

        let normal_sum = surfel.normal * k + point.normal;
        if normal_sum.norm() > f32::MIN_POSITIVE {
            surfel.normal = normal_sum.normalize();
        }

        surfel.r = ((k * surfel.r as f32 + point.color.0 as f32) * inv).round() as u8;
        surfel.g = ((k * surfel.g as f32 + point.color.1 as f32) * inv).round() as u8;
        surfel.b = ((k * surfel.b as f32 + point.color.2 as f32) * inv).round() as u8;

        surfel.radius = surfel.radius.min(point.radius);
        surfel.confidence += 1;
    }

    fn log_summary(&mut self, summary: &FrameSummary) {
        if !self.stats.is_enabled() {
            return;
        }
        self.stats.log("cloud_pixels", summary.cloud_pixels);
        self.stats.log("pixels_missing", summary.preprocess.missing);
        self.stats
            .log("dropped_normal", summary.preprocess.dropped_normal);
        self.stats
            .log("dropped_grazing", summary.preprocess.dropped_grazing);
        self.stats
            .log("dropped_depth", summary.preprocess.dropped_depth);
        self.stats.log("points_valid", summary.preprocess.valid);
        self.stats.log("matched", summary.matched);
        self.stats.log("inserted", summary.inserted);
        self.stats.log("position_clamped", summary.position_clamped);
        self.stats.log("position_skipped", summary.position_skipped);
        if let Some(candidates) = summary.frustum_candidates {
            self.stats.log("frustum_candidates", candidates);
        }
        self.stats.log("preprocess_s", summary.preprocess_seconds);
        self.stats.log("fusion_s", summary.fusion_seconds);
        self.stats.log("surfel_count", self.store.len());
        self.stats.flush();
    }

    /// Indices of reliable surfels inside the axis-aligned box
    /// `[bb_min, bb_max]` (inclusive). Order is unspecified.
    pub fn bounding_box_indices(
        &self,
        bb_min: &Vector3<f32>,
        bb_max: &Vector3<f32>,
    ) -> Vec<u32> {
        self.octree
            .range_indices(bb_min, bb_max)
            .into_iter()
            .filter(|&index| {
                self.store.get(index).is_some_and(|s| {
                    s.is_valid()
                        && s.is_reliable(self.config.confidence_threshold)
                        && s.position.x >= bb_min.x
                        && s.position.x <= bb_max.x
                        && s.position.y >= bb_min.y
                        && s.position.y <= bb_max.y
                        && s.position.z >= bb_min.z
                        && s.position.z <= bb_max.z
                })
            })
            .collect()
    }

    /// Every index currently referenced by the spatial index (used by
    /// external savers). Order is unspecified.
    pub fn all_indices(&self) -> Vec<u32> {
        self.octree.all_indices()
    }

    /// Shared access to a surfel record.
    pub fn surfel(&self, index: u32) -> Option<&Surfel> {
        self.store.get(index)
    }

    /// Read-only view of the spatial index.
    pub fn octree(&self) -> &Octree {
        &self.octree
    }

    /// Generate the downsampled preview cloud.
    pub fn preview_cloud(&self) -> PreviewCloud {
        PreviewGenerator::new(
            self.config.preview_resolution,
            self.config.preview_color_samples_in_voxel,
            self.config.confidence_threshold,
        )
        .generate(&self.store)
    }

    /// Remove every surfel and release spatial index memory.
    ///
    /// Idempotent; camera intrinsics stay latched.
    pub fn reset_map(&mut self) {
        self.store.reset();
        self.octree.clear();
        info!("map reset; store and spatial index emptied");
    }
}
