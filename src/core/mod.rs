//! Fundamental types: camera model, sensor pose, organized keyframe cloud,
//! surfel record, timestamps.

mod camera;
mod cloud;
mod pose;
mod surfel;
mod time;

pub use camera::CameraIntrinsics;
pub use cloud::{CloudPoint, OrganizedCloud};
pub use pose::SensorPose;
pub use surfel::Surfel;
pub use time::Stamp;
