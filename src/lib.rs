//! # Bindu-Map: Surfel-Based RGB-D Mapping Core
//!
//! An online 3D reconstruction engine that fuses registered RGB-D
//! keyframes into a persistent map of oriented disks (surfels) held in a
//! spatially indexed, preallocated store.
//!
//! ## Features
//!
//! - **Incremental fusion**: per-pixel update-or-insert driven by depth,
//!   radius, and a confidence count
//! - **Arena-indexed map**: surfels live in one contiguous store; the
//!   octree holds `u32` handles only, so serialization stays trivial
//! - **Visibility filtering**: frustum pre-pass, grazing-angle and depth
//!   range rejection
//! - **Deterministic output**: row-major pixel order plus insertion-order
//!   candidate buckets make fusion reproducible for a fixed input stream
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bindu_map::{MapperConfig, SurfelMapper};
//! use bindu_map::core::{CameraIntrinsics, OrganizedCloud, SensorPose};
//!
//! let config = MapperConfig::default();
//! let mut mapper = SurfelMapper::new(config);
//!
//! // Intrinsics arrive once, before the first keyframe
//! mapper.set_camera(CameraIntrinsics::new(525.0, 525.0, 319.5, 239.5)).unwrap();
//!
//! // Fuse a posed keyframe
//! let cloud = OrganizedCloud::new(640, 480);
//! let pose = SensorPose::identity();
//! let summary = mapper.integrate(&cloud, &pose).unwrap();
//! println!("matched {}, inserted {}", summary.matched, summary.inserted);
//! ```
//!
//! ## Coordinate Frames
//!
//! Keyframe clouds are in the camera optical frame (X right, Y down,
//! Z forward); the sensor pose maps them into the fixed map frame where
//! surfels live. Poses are provided externally; the core does no pose
//! estimation.
//!
//! ## Architecture
//!
//! - [`core`]: camera model, sensor pose, organized cloud, surfel record
//! - [`config`]: configuration loading
//! - [`store`]: preallocated surfel arena
//! - [`octree`]: spatial index over surfel positions
//! - [`fusion`]: scan preprocessing and the mapper façade
//! - [`preview`]: voxel-grid preview downsampler
//! - [`path`]: pose path lookup and keyframe buffering
//! - [`logger`]: per-frame stats records
//!
//! ## Data Flow
//!
//! ```text
//!    ┌──────────────┐    ┌──────────────┐
//!    │   Keyframe   │    │  Pose Path   │
//!    │ (RGB-D grid) │    │ (timestamped)│
//!    └──────┬───────┘    └──────┬───────┘
//!           │ buffered          │ ms-rounded lookup
//!           ▼                   ▼
//!        ┌──────────────────────────┐
//!        │      KeyframeQueue       │
//!        └────────────┬─────────────┘
//!                     │ (cloud, pose)
//!                     ▼
//!        ┌──────────────────────────┐
//!        │     ScanPreprocessor     │  normals, orientation,
//!        │                          │  grazing/depth filters, radii
//!        └────────────┬─────────────┘
//!                     │ scan points (row-major)
//!                     ▼
//!        ┌──────────────────────────┐
//!        │       SurfelMapper       │  per-pixel association:
//!        │  ┌────────┐ ┌─────────┐  │  leaf bucket → reproject →
//!        │  │ Store  │ │ Octree  │  │  nearest depth → update
//!        │  └────────┘ └─────────┘  │  or insert
//!        └────────────┬─────────────┘
//!                     │
//!        ┌────────────┼─────────────┐
//!        ▼            ▼             ▼
//!   bounding-box   preview     stats logger
//!     queries    downsampler   (per frame)
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod fusion;
pub mod logger;
pub mod octree;
pub mod path;
pub mod preview;
pub mod store;

// Re-export main types at crate root
pub use config::{ConfigLoadError, MapperConfig};
pub use error::{MapperError, Result};
pub use fusion::{FrameSummary, SurfelMapper};
pub use logger::{StatValue, StatsLogger};
pub use path::{DrainOutcome, Keyframe, KeyframeQueue, PathLookupError, PosePath, TimedPose};
pub use preview::{PreviewCloud, PreviewPoint};
