//! Default values for mapper configuration fields.

pub fn dmax() -> f32 {
    0.005
}

pub fn min_kinect_dist() -> f32 {
    0.8
}

pub fn max_kinect_dist() -> f32 {
    4.0
}

pub fn octree_resolution() -> f32 {
    0.2
}

pub fn preview_resolution() -> f32 {
    0.2
}

pub fn preview_color_samples_in_voxel() -> u32 {
    3
}

pub fn confidence_threshold() -> u32 {
    5
}

pub fn min_scan_znormal() -> f32 {
    0.2
}

pub fn use_frustum() -> bool {
    true
}

pub fn scene_size() -> usize {
    30_000_000
}

pub fn logging() -> bool {
    true
}

pub fn use_update() -> bool {
    true
}
