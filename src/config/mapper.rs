//! Mapper configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::defaults;
use super::error::ConfigLoadError;

/// Configuration for the surfel mapper.
///
/// Field names match the parameter names the mapping node reads, so a
/// deployment YAML can be shared between both.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Depth tolerance for matching a scan pixel to an existing surfel
    /// (meters). Default: 0.005
    #[serde(default = "defaults::dmax")]
    pub dmax: f32,

    /// Reliable minimum sensor reading distance (meters). Scan points
    /// closer than this are rejected. Default: 0.8
    #[serde(default = "defaults::min_kinect_dist")]
    pub min_kinect_dist: f32,

    /// Reliable maximum sensor reading distance (meters). Scan points
    /// farther than this are rejected. Default: 4.0
    #[serde(default = "defaults::max_kinect_dist")]
    pub max_kinect_dist: f32,

    /// Leaf size of the spatial index (meters). Default: 0.2
    #[serde(default = "defaults::octree_resolution")]
    pub octree_resolution: f32,

    /// Voxel size of the downsampled preview cloud (meters). Default: 0.2
    #[serde(default = "defaults::preview_resolution")]
    pub preview_resolution: f32,

    /// Number of reliable surfels averaged per preview voxel. Default: 3
    #[serde(default = "defaults::preview_color_samples_in_voxel")]
    pub preview_color_samples_in_voxel: u32,

    /// Confidence count at which a surfel becomes reliable. Default: 5
    #[serde(default = "defaults::confidence_threshold")]
    pub confidence_threshold: u32,

    /// Minimum |z| component of a camera-frame scan normal; pixels seen
    /// at grazing angles are rejected. Default: 0.2
    #[serde(default = "defaults::min_scan_znormal")]
    pub min_scan_znormal: f32,

    /// Pre-filter update candidates by the camera frustum. Default: true
    #[serde(default = "defaults::use_frustum")]
    pub use_frustum: bool,

    /// Preallocated surfel store capacity. Default: 3e7
    #[serde(default = "defaults::scene_size")]
    pub scene_size: usize,

    /// Write per-frame stats records. Default: true
    #[serde(default = "defaults::logging")]
    pub logging: bool,

    /// Update matched surfels in place; when false every valid pixel
    /// inserts a new surfel. Default: true
    #[serde(default = "defaults::use_update")]
    pub use_update: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            dmax: defaults::dmax(),
            min_kinect_dist: defaults::min_kinect_dist(),
            max_kinect_dist: defaults::max_kinect_dist(),
            octree_resolution: defaults::octree_resolution(),
            preview_resolution: defaults::preview_resolution(),
            preview_color_samples_in_voxel: defaults::preview_color_samples_in_voxel(),
            confidence_threshold: defaults::confidence_threshold(),
            min_scan_znormal: defaults::min_scan_znormal(),
            use_frustum: defaults::use_frustum(),
            scene_size: defaults::scene_size(),
            logging: defaults::logging(),
            use_update: defaults::use_update(),
        }
    }
}

impl MapperConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io(e.to_string()))?;
        Self::from_yaml(&contents)
    }

    /// Parse from a YAML string and validate.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigLoadError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check option values for consistency.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if !(self.dmax > 0.0) {
            return Err(ConfigLoadError::Invalid(format!(
                "dmax must be positive, got {}",
                self.dmax
            )));
        }
        if !(self.octree_resolution > 0.0) {
            return Err(ConfigLoadError::Invalid(format!(
                "octree_resolution must be positive, got {}",
                self.octree_resolution
            )));
        }
        if !(self.preview_resolution > 0.0) {
            return Err(ConfigLoadError::Invalid(format!(
                "preview_resolution must be positive, got {}",
                self.preview_resolution
            )));
        }
        if self.min_kinect_dist < 0.0 || self.max_kinect_dist <= self.min_kinect_dist {
            return Err(ConfigLoadError::Invalid(format!(
                "kinect distance range [{}, {}] is empty",
                self.min_kinect_dist, self.max_kinect_dist
            )));
        }
        if self.scene_size == 0 {
            return Err(ConfigLoadError::Invalid("scene_size must be nonzero".into()));
        }
        if self.preview_color_samples_in_voxel == 0 {
            return Err(ConfigLoadError::Invalid(
                "preview_color_samples_in_voxel must be nonzero".into(),
            ));
        }
        Ok(())
    }

    /// Builder-style setter for the depth match tolerance.
    pub fn with_dmax(mut self, meters: f32) -> Self {
        self.dmax = meters;
        self
    }

    /// Builder-style setter for the sensor depth range.
    pub fn with_depth_range(mut self, min: f32, max: f32) -> Self {
        self.min_kinect_dist = min;
        self.max_kinect_dist = max;
        self
    }

    /// Builder-style setter for the spatial index leaf size.
    pub fn with_octree_resolution(mut self, meters: f32) -> Self {
        self.octree_resolution = meters;
        self
    }

    /// Builder-style setter for the confidence threshold.
    pub fn with_confidence_threshold(mut self, threshold: u32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Builder-style setter for the store capacity.
    pub fn with_scene_size(mut self, capacity: usize) -> Self {
        self.scene_size = capacity;
        self
    }

    /// Builder-style setter for the frustum pre-pass.
    pub fn with_use_frustum(mut self, enabled: bool) -> Self {
        self.use_frustum = enabled;
        self
    }

    /// Builder-style setter for in-place surfel updates.
    pub fn with_use_update(mut self, enabled: bool) -> Self {
        self.use_update = enabled;
        self
    }

    /// Builder-style setter for stats logging.
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }
}
