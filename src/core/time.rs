//! Keyframe and path timestamps.
//!
//! Keyframe producers and odometry paths may stamp the same instant a few
//! microseconds apart. Lookups therefore compare stamps truncated to the
//! nearest millisecond, rounding a remainder above 0.5 ms upward with
//! carry into the seconds field.

use serde::{Deserialize, Serialize};

const NSEC_PER_MSEC: u32 = 1_000_000;
const NSEC_PER_SEC: u32 = 1_000_000_000;

/// A second/nanosecond timestamp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stamp {
    /// Whole seconds.
    pub sec: u64,
    /// Nanoseconds within the second (`< 1_000_000_000`).
    pub nsec: u32,
}

impl Stamp {
    /// Create a stamp. `nsec` overflow is carried into `sec`.
    pub fn new(sec: u64, nsec: u32) -> Self {
        Self {
            sec: sec + (nsec / NSEC_PER_SEC) as u64,
            nsec: nsec % NSEC_PER_SEC,
        }
    }

    /// Round to the nearest millisecond.
    ///
    /// A sub-millisecond remainder above 0.5 ms rounds up; hitting a full
    /// second carries into `sec`.
    pub fn round_to_millis(self) -> Self {
        let rem = self.nsec % NSEC_PER_MSEC;
        let mut sec = self.sec;
        let mut nsec = self.nsec - rem;
        if rem > NSEC_PER_MSEC / 2 {
            nsec += NSEC_PER_MSEC;
            if nsec == NSEC_PER_SEC {
                sec += 1;
                nsec = 0;
            }
        }
        Self { sec, nsec }
    }

    /// Total nanoseconds since the epoch of `sec = 0`.
    #[inline]
    pub fn as_nanos(self) -> u128 {
        self.sec as u128 * NSEC_PER_SEC as u128 + self.nsec as u128
    }

    /// Absolute distance to another stamp, in nanoseconds.
    #[inline]
    pub fn abs_diff(self, other: Stamp) -> u128 {
        let a = self.as_nanos();
        let b = other.as_nanos();
        if a >= b {
            a - b
        } else {
            b - a
        }
    }
}
