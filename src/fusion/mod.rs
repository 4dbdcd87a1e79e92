//! Keyframe fusion: scan preprocessing, per-pixel association, and the
//! mapper façade tying store and spatial index together.

mod mapper;
mod preprocess;

pub use mapper::{FrameSummary, SurfelMapper};
pub use preprocess::{
    PreparedPoint, PreparedScan, PreprocessConfig, PreprocessStats, ScanPreprocessor,
};
