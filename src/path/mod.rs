//! Pose path lookup and keyframe buffering.
//!
//! Keyframes and odometry poses arrive on separate streams whose stamps
//! agree only to the millisecond, so lookups compare millisecond-rounded
//! stamps. A keyframe whose stamp cannot be resolved against the current
//! path yet is buffered and retried in arrival order.

use std::collections::VecDeque;

use log::debug;
use thiserror::Error;

use crate::core::{OrganizedCloud, SensorPose, Stamp};
use crate::error::MapperError;
use crate::fusion::{FrameSummary, SurfelMapper};

/// Why a stamp could not be resolved against a path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathLookupError {
    /// The path holds no poses.
    #[error("pose path is empty")]
    EmptyPath,

    /// The stamp falls outside the path's time span.
    #[error("stamp {stamp:?} outside path span [{first:?}, {last:?}]")]
    OutOfRange {
        /// The queried stamp (rounded).
        stamp: Stamp,
        /// First path stamp (rounded).
        first: Stamp,
        /// Last path stamp (rounded).
        last: Stamp,
    },
}

/// A pose with its stamp.
#[derive(Clone, Copy, Debug)]
pub struct TimedPose {
    /// When the pose was estimated.
    pub stamp: Stamp,
    /// The sensor pose in the map frame.
    pub pose: SensorPose,
}

/// A time-ordered sequence of sensor poses.
#[derive(Clone, Debug, Default)]
pub struct PosePath {
    poses: Vec<TimedPose>,
}

impl PosePath {
    /// Create an empty path.
    pub fn new() -> Self {
        Self { poses: Vec::new() }
    }

    /// Build a path from poses, sorting them by stamp.
    pub fn from_poses(mut poses: Vec<TimedPose>) -> Self {
        poses.sort_by_key(|p| p.stamp);
        Self { poses }
    }

    /// Append a pose, keeping the path sorted.
    pub fn push(&mut self, timed: TimedPose) {
        let at = self
            .poses
            .partition_point(|p| p.stamp <= timed.stamp);
        self.poses.insert(at, timed);
    }

    /// Number of poses.
    #[inline]
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// True when the path holds no poses.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Nearest pose to `stamp`, comparing millisecond-rounded stamps.
    ///
    /// Bisects the path, then picks the closer of the two bracketing
    /// poses (the later one on a tie).
    pub fn pose_at(&self, stamp: Stamp) -> Result<SensorPose, PathLookupError> {
        if self.poses.is_empty() {
            return Err(PathLookupError::EmptyPath);
        }
        let rounded = stamp.round_to_millis();
        let first = self.poses[0].stamp.round_to_millis();
        let last = self.poses[self.poses.len() - 1].stamp.round_to_millis();
        if first > rounded || last < rounded {
            return Err(PathLookupError::OutOfRange {
                stamp: rounded,
                first,
                last,
            });
        }

        // Bisect on rounded stamps
        let mut i = 0;
        let mut j = self.poses.len() - 1;
        while i + 1 < j {
            let k = (i + j) / 2;
            if self.poses[k].stamp.round_to_millis() <= rounded {
                i = k;
            } else {
                j = k;
            }
        }

        let dist_i = rounded.abs_diff(self.poses[i].stamp.round_to_millis());
        let dist_j = rounded.abs_diff(self.poses[j].stamp.round_to_millis());
        let k = if dist_i < dist_j { i } else { j };
        Ok(self.poses[k].pose)
    }
}

/// A keyframe awaiting integration: stamp plus organized cloud.
#[derive(Clone, Debug)]
pub struct Keyframe {
    /// Capture stamp (matched against the pose path).
    pub stamp: Stamp,
    /// The organized RGB-D cloud, camera frame.
    pub cloud: OrganizedCloud,
}

/// Result of draining the keyframe queue.
#[derive(Debug, Default)]
pub struct DrainOutcome {
    /// Summaries of the keyframes integrated this drain, in order.
    pub integrated: Vec<FrameSummary>,
    /// Error that stopped the drain, if any. `NotReady` and lookup
    /// misses are not errors; those keyframes stay queued.
    pub error: Option<MapperError>,
    /// Keyframes still buffered after the drain.
    pub pending: usize,
}

/// Arrival-order buffer of keyframes awaiting pose alignment.
///
/// Keyframes are consumed strictly in arrival order: the drain stops at
/// the first keyframe that cannot be aligned, so a late path message can
/// never reorder integration.
#[derive(Clone, Debug, Default)]
pub struct KeyframeQueue {
    frames: VecDeque<Keyframe>,
}

impl KeyframeQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
        }
    }

    /// Buffer a keyframe.
    pub fn push(&mut self, keyframe: Keyframe) {
        self.frames.push_back(keyframe);
    }

    /// Number of buffered keyframes.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when nothing is buffered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Integrate every leading keyframe whose stamp resolves against
    /// `path`, in arrival order.
    ///
    /// Stops (keeping the keyframe) on a failed pose lookup or on
    /// [`MapperError::NotReady`]; stops (dropping the keyframe, which
    /// was already consumed or refused) on any other mapper error.
    pub fn drain_ready(&mut self, path: &PosePath, mapper: &mut SurfelMapper) -> DrainOutcome {
        let mut outcome = DrainOutcome::default();

        while let Some(front) = self.frames.front() {
            let pose = match path.pose_at(front.stamp) {
                Ok(pose) => pose,
                Err(e) => {
                    debug!("keyframe at {:?} not alignable yet: {}", front.stamp, e);
                    break;
                }
            };
            match mapper.integrate(&front.cloud, &pose) {
                Ok(summary) => {
                    outcome.integrated.push(summary);
                    self.frames.pop_front();
                }
                Err(MapperError::NotReady) => break,
                Err(e) => {
                    self.frames.pop_front();
                    outcome.error = Some(e);
                    break;
                }
            }
        }

        outcome.pending = self.frames.len();
        outcome
    }
}
