//! Per-frame stats records.
//!
//! The fusion engine appends `(field, value)` records for every integrated
//! keyframe: counters, timings, store occupancy. The writer is append-only
//! and never in the correctness path; a failed write is swallowed and
//! reported once per session through the `log` facade.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::warn;

/// A typed stats value.
///
/// One variant per scalar type the engine records; fields of mixed types
/// share a single record stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StatValue {
    /// Signed counter.
    Int(i64),
    /// Unsigned counter.
    UInt(u64),
    /// Single-precision measurement.
    Float(f32),
    /// Double-precision measurement (timings).
    Double(f64),
    /// Free-form text.
    Text(String),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Int(v) => write!(f, "{}", v),
            StatValue::UInt(v) => write!(f, "{}", v),
            StatValue::Float(v) => write!(f, "{}", v),
            StatValue::Double(v) => write!(f, "{}", v),
            StatValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for StatValue {
    fn from(v: i64) -> Self {
        StatValue::Int(v)
    }
}

impl From<i32> for StatValue {
    fn from(v: i32) -> Self {
        StatValue::Int(v as i64)
    }
}

impl From<u64> for StatValue {
    fn from(v: u64) -> Self {
        StatValue::UInt(v)
    }
}

impl From<u32> for StatValue {
    fn from(v: u32) -> Self {
        StatValue::UInt(v as u64)
    }
}

impl From<usize> for StatValue {
    fn from(v: usize) -> Self {
        StatValue::UInt(v as u64)
    }
}

impl From<f32> for StatValue {
    fn from(v: f32) -> Self {
        StatValue::Float(v)
    }
}

impl From<f64> for StatValue {
    fn from(v: f64) -> Self {
        StatValue::Double(v)
    }
}

impl From<&str> for StatValue {
    fn from(v: &str) -> Self {
        StatValue::Text(v.to_string())
    }
}

impl From<String> for StatValue {
    fn from(v: String) -> Self {
        StatValue::Text(v)
    }
}

/// Append-only writer of per-frame stats records.
///
/// Records are TSV lines `frame<TAB>field<TAB>value`. A disabled logger
/// accepts records and drops them.
#[derive(Debug)]
pub struct StatsLogger {
    sink: Option<BufWriter<File>>,
    frame: u64,
    write_failed: bool,
}

impl StatsLogger {
    /// A logger that drops every record.
    pub fn disabled() -> Self {
        Self {
            sink: None,
            frame: 0,
            write_failed: false,
        }
    }

    /// Open `path` for appending.
    ///
    /// On failure the logger comes up disabled and warns once; mapping is
    /// never blocked on stats output.
    pub fn create(path: &Path) -> Self {
        match File::options().create(true).append(true).open(path) {
            Ok(file) => Self {
                sink: Some(BufWriter::new(file)),
                frame: 0,
                write_failed: false,
            },
            Err(e) => {
                warn!("stats log {:?} could not be opened: {}", path, e);
                Self::disabled()
            }
        }
    }

    /// True when records are actually written somewhere.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Current frame counter.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Advance to the next frame. Subsequent records carry the new number.
    pub fn begin_frame(&mut self) {
        self.frame += 1;
    }

    /// Append one record for the current frame.
    pub fn log(&mut self, field: &str, value: impl Into<StatValue>) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let value = value.into();
        if writeln!(sink, "{}\t{}\t{}", self.frame, field, value).is_err() && !self.write_failed {
            self.write_failed = true;
            warn!("stats log write failed; further records this session may be lost");
        }
    }

    /// Flush buffered records to disk. Failures are swallowed.
    pub fn flush(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            if sink.flush().is_err() && !self.write_failed {
                self.write_failed = true;
                warn!("stats log flush failed; further records this session may be lost");
            }
        }
    }
}

impl Drop for StatsLogger {
    fn drop(&mut self) {
        self.flush();
    }
}
