//! Error types for the mapping core.

use thiserror::Error;

/// Errors surfaced by the public mapper surface.
///
/// Numeric degeneracies inside the fusion pipeline (non-finite normals,
/// zero-depth divides) are not errors; the affected pixel is dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapperError {
    /// A keyframe arrived before camera intrinsics. The caller should
    /// buffer the keyframe and retry once intrinsics are set.
    #[error("camera intrinsics not received yet")]
    NotReady,

    /// The surfel store is full. The keyframe is partially integrated:
    /// pixels processed before exhaustion stand, nothing is rolled back.
    #[error("surfel store capacity exhausted ({capacity} surfels)")]
    OutOfCapacity {
        /// Configured store capacity (`scene_size`).
        capacity: usize,
    },

    /// Malformed input (non-unit quaternion, non-positive intrinsics).
    /// Refused without mutating the map.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, MapperError>;
