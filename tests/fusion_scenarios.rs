//! End-to-end fusion scenarios driving the public mapper surface.

use approx::assert_relative_eq;
use nalgebra::Vector3;

use bindu_map::core::{CameraIntrinsics, CloudPoint, OrganizedCloud, SensorPose};
use bindu_map::{MapperConfig, MapperError, SurfelMapper};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn make_camera() -> CameraIntrinsics {
    CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0)
}

fn make_mapper(config: MapperConfig) -> SurfelMapper {
    let mut mapper = SurfelMapper::new(config.with_logging(false));
    mapper.set_camera(make_camera()).unwrap();
    mapper
}

fn test_config() -> MapperConfig {
    MapperConfig::default().with_scene_size(100_000)
}

/// A cloud with a fronto-parallel plane patch at the given depth.
fn plane_patch(u0: u32, v0: u32, w: u32, h: u32, depth: f32, color: (u8, u8, u8)) -> OrganizedCloud {
    let camera = make_camera();
    let mut cloud = OrganizedCloud::new(WIDTH, HEIGHT);
    for v in v0..v0 + h {
        for u in u0..u0 + w {
            let p = camera.unproject(u as f32, v as f32, depth);
            cloud.set(u, v, CloudPoint::new(p.x, p.y, p.z, color.0, color.1, color.2));
        }
    }
    cloud
}

/// Check the spatial index invariants: every indexed surfel is finite and
/// discoverable through the leaf bucket at its own position.
fn assert_index_consistent(mapper: &SurfelMapper) {
    for index in mapper.all_indices() {
        let surfel = mapper.surfel(index).expect("indexed surfel allocated");
        assert!(surfel.is_valid(), "index {} references invalid surfel", index);
        let bucket = mapper.octree().leaf_bucket(&surfel.position);
        assert!(
            bucket.contains(&index),
            "index {} is not discoverable at its own position",
            index
        );
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_empty_ingest_leaves_map_empty() {
    let mut mapper = make_mapper(test_config());
    let cloud = OrganizedCloud::new(WIDTH, HEIGHT);

    let summary = mapper.integrate(&cloud, &SensorPose::identity()).unwrap();

    assert_eq!(summary.preprocess.valid, 0);
    assert_eq!(summary.inserted, 0);
    assert_eq!(mapper.len(), 0);
    assert!(mapper.all_indices().is_empty());
}

#[test]
fn test_single_pixel_inserts_one_surfel() {
    let mut mapper = make_mapper(test_config());

    // The center pixel needs finite right/down neighbors for its normal;
    // the neighbors themselves lack support and drop out
    let camera = make_camera();
    let mut cloud = OrganizedCloud::new(WIDTH, HEIGHT);
    for &(u, v) in &[(320u32, 240u32), (321, 240), (320, 241)] {
        let p = camera.unproject(u as f32, v as f32, 1.0);
        cloud.set(u, v, CloudPoint::new(p.x, p.y, p.z, 128, 64, 32));
    }

    let summary = mapper.integrate(&cloud, &SensorPose::identity()).unwrap();

    assert_eq!(summary.inserted, 1);
    assert_eq!(mapper.len(), 1);

    let surfel = mapper.surfel(0).unwrap();
    assert_relative_eq!(surfel.position, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
    assert_eq!(surfel.confidence, 1);
    assert_relative_eq!(surfel.radius, std::f32::consts::SQRT_2 / 500.0, epsilon = 1e-6);
    assert_eq!(surfel.color(), (128, 64, 32));
    assert_index_consistent(&mapper);
}

#[test]
fn test_in_tolerance_depth_updates_existing_surfel() {
    let mut mapper = make_mapper(test_config());
    let camera = make_camera();

    // Depths sit inside one 0.2 m leaf so the match is not at the mercy
    // of a voxel boundary
    for depth in [1.05f32, 1.052] {
        let mut cloud = OrganizedCloud::new(WIDTH, HEIGHT);
        for &(u, v) in &[(320u32, 240u32), (321, 240), (320, 241)] {
            let p = camera.unproject(u as f32, v as f32, depth);
            cloud.set(u, v, CloudPoint::new(p.x, p.y, p.z, 128, 64, 32));
        }
        mapper.integrate(&cloud, &SensorPose::identity()).unwrap();
    }

    assert_eq!(mapper.len(), 1, "second observation must update, not insert");
    let surfel = mapper.surfel(0).unwrap();
    assert_eq!(surfel.confidence, 2);
    // Confidence-weighted midpoint of 1.05 and 1.052
    assert_relative_eq!(surfel.position.z, 1.051, epsilon = 1e-5);
    assert_index_consistent(&mapper);
}

#[test]
fn test_out_of_tolerance_depth_inserts_second_surfel() {
    let mut mapper = make_mapper(test_config());
    let camera = make_camera();

    for depth in [1.0f32, 1.5] {
        let mut cloud = OrganizedCloud::new(WIDTH, HEIGHT);
        for &(u, v) in &[(320u32, 240u32), (321, 240), (320, 241)] {
            let p = camera.unproject(u as f32, v as f32, depth);
            cloud.set(u, v, CloudPoint::new(p.x, p.y, p.z, 10, 20, 30));
        }
        mapper.integrate(&cloud, &SensorPose::identity()).unwrap();
    }

    assert_eq!(mapper.len(), 2);
    assert_eq!(mapper.surfel(0).unwrap().confidence, 1);
    assert_eq!(mapper.surfel(1).unwrap().confidence, 1);
    assert_index_consistent(&mapper);
}

#[test]
fn test_grazing_plane_inserts_nothing() {
    let mut mapper = make_mapper(test_config());

    // Surface with |n_z| = 0.1, below the 0.2 threshold: z falls steeply
    // along x
    let nz = 0.1f32;
    let nx = (1.0 - nz * nz).sqrt();
    let slope = nx / nz;
    let mut cloud = OrganizedCloud::new(WIDTH, HEIGHT);
    for v in 0..8u32 {
        for u in 0..8u32 {
            let x = u as f32 * 0.01;
            let y = v as f32 * 0.01;
            let z = 2.0 - slope * x;
            cloud.set(u, v, CloudPoint::new(x, y, z, 50, 50, 50));
        }
    }

    let summary = mapper.integrate(&cloud, &SensorPose::identity()).unwrap();

    assert_eq!(summary.preprocess.valid, 0);
    assert!(summary.preprocess.dropped_grazing > 0);
    assert_eq!(mapper.len(), 0);
}

#[test]
fn test_capacity_overflow_is_partial_and_consistent() {
    let config = MapperConfig::default().with_scene_size(10);
    let mut mapper = make_mapper(config);

    // 6x6 patch: 36 insertable pixels against a store of 10
    let cloud = plane_patch(300, 230, 6, 6, 1.0, (80, 80, 80));
    let err = mapper.integrate(&cloud, &SensorPose::identity()).unwrap_err();

    assert_eq!(err, MapperError::OutOfCapacity { capacity: 10 });
    assert_eq!(mapper.len(), 10);
    assert_eq!(mapper.all_indices().len(), 10);
    assert_index_consistent(&mapper);
}

#[test]
fn test_keyframe_before_intrinsics_is_refused() {
    let mut mapper = SurfelMapper::new(test_config().with_logging(false));
    let cloud = OrganizedCloud::new(WIDTH, HEIGHT);

    let err = mapper.integrate(&cloud, &SensorPose::identity()).unwrap_err();
    assert_eq!(err, MapperError::NotReady);
    assert_eq!(mapper.len(), 0);
}

#[test]
fn test_second_intrinsics_message_is_ignored() {
    let mut mapper = make_mapper(test_config());
    mapper
        .set_camera(CameraIntrinsics::new(100.0, 100.0, 10.0, 10.0))
        .unwrap();
    let camera = mapper.camera().unwrap();
    assert_eq!(camera.alpha, 500.0);
}

// ---------------------------------------------------------------------------
// Laws
// ---------------------------------------------------------------------------

#[test]
fn test_reset_map_is_idempotent() {
    let mut mapper = make_mapper(test_config());
    let cloud = plane_patch(310, 230, 8, 8, 1.0, (70, 70, 70));
    mapper.integrate(&cloud, &SensorPose::identity()).unwrap();
    assert!(mapper.len() > 0);

    mapper.reset_map();
    assert_eq!(mapper.len(), 0);
    assert!(mapper.all_indices().is_empty());

    mapper.reset_map();
    assert_eq!(mapper.len(), 0);
    assert!(mapper.all_indices().is_empty());

    // The map keeps working after reset
    mapper.integrate(&cloud, &SensorPose::identity()).unwrap();
    assert!(mapper.len() > 0);
}

#[test]
fn test_repeated_identical_ingests_converge() {
    let mut mapper = make_mapper(test_config());
    let cloud = plane_patch(310, 230, 8, 8, 1.0, (70, 70, 70));
    let pose = SensorPose::identity();

    let first = mapper.integrate(&cloud, &pose).unwrap();
    let count_after_first = mapper.len();
    assert_eq!(first.inserted, count_after_first);

    let positions: Vec<Vector3<f32>> = (0..mapper.len() as u32)
        .map(|i| mapper.surfel(i).unwrap().position)
        .collect();

    for round in 2..=4u32 {
        let summary = mapper.integrate(&cloud, &pose).unwrap();
        assert_eq!(summary.inserted, 0, "round {} must only update", round);
        assert_eq!(summary.matched, count_after_first);
        assert_eq!(mapper.len(), count_after_first);
        for (i, expected) in positions.iter().enumerate() {
            let surfel = mapper.surfel(i as u32).unwrap();
            // Identical observations blend to themselves, up to the
            // voxel-clamp margin at leaf boundaries
            assert_relative_eq!(surfel.position, *expected, epsilon = 1e-3);
            assert_eq!(surfel.confidence, round);
        }
    }
    assert_index_consistent(&mapper);
}

#[test]
fn test_insert_only_mode_inserts_every_valid_pixel() {
    let config = test_config().with_use_update(false);
    let mut mapper = make_mapper(config);
    let cloud = plane_patch(310, 230, 8, 8, 1.0, (70, 70, 70));
    let pose = SensorPose::identity();

    let first = mapper.integrate(&cloud, &pose).unwrap();
    assert_eq!(first.inserted, first.preprocess.valid);
    assert_eq!(first.matched, 0);

    // A second identical keyframe duplicates every surfel
    let second = mapper.integrate(&cloud, &pose).unwrap();
    assert_eq!(second.inserted, second.preprocess.valid);
    assert_eq!(mapper.len(), first.inserted + second.inserted);
}

#[test]
fn test_frustum_filtering_matches_exhaustive_path() {
    let run = |use_frustum: bool| -> SurfelMapper {
        let config = test_config().with_use_frustum(use_frustum);
        let mut mapper = make_mapper(config);
        let pose = SensorPose::identity();
        // Two overlapping patches at nearby depths, then a revisit
        for (depth, u0) in [(1.0f32, 310u32), (1.004, 312), (1.0, 310)] {
            let cloud = plane_patch(u0, 230, 8, 8, depth, (90, 90, 90));
            mapper.integrate(&cloud, &pose).unwrap();
        }
        mapper
    };

    let with_frustum = run(true);
    let without_frustum = run(false);

    assert_eq!(with_frustum.len(), without_frustum.len());
    for i in 0..with_frustum.len() as u32 {
        let a = with_frustum.surfel(i).unwrap();
        let b = without_frustum.surfel(i).unwrap();
        assert_eq!(a.position, b.position, "surfel {} position differs", i);
        assert_eq!(a.normal, b.normal);
        assert_eq!(a.color(), b.color());
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.radius, b.radius);
    }
}

#[test]
fn test_confidence_threshold_gates_bounding_box_queries() {
    // Threshold 2: surfels become reliable on their second observation
    let config = test_config().with_confidence_threshold(2);
    let mut mapper = make_mapper(config);
    let cloud = plane_patch(310, 230, 8, 8, 1.0, (70, 70, 70));
    let pose = SensorPose::identity();

    let bb_min = Vector3::new(-1.0, -1.0, 0.0);
    let bb_max = Vector3::new(1.0, 1.0, 2.0);

    mapper.integrate(&cloud, &pose).unwrap();
    assert!(
        mapper.bounding_box_indices(&bb_min, &bb_max).is_empty(),
        "confidence-1 surfels are not reliable yet"
    );

    mapper.integrate(&cloud, &pose).unwrap();
    let reliable = mapper.bounding_box_indices(&bb_min, &bb_max);
    assert_eq!(reliable.len(), mapper.len());
}

#[test]
fn test_bounding_box_query_respects_bounds() {
    let mut mapper = make_mapper(test_config().with_confidence_threshold(1));
    let pose = SensorPose::identity();
    mapper
        .integrate(&plane_patch(310, 230, 8, 8, 1.0, (70, 70, 70)), &pose)
        .unwrap();
    mapper
        .integrate(&plane_patch(310, 230, 8, 8, 3.0, (70, 70, 70)), &pose)
        .unwrap();

    // Only the near plane falls inside this box
    let near = mapper.bounding_box_indices(
        &Vector3::new(-1.0, -1.0, 0.5),
        &Vector3::new(1.0, 1.0, 1.5),
    );
    assert!(!near.is_empty());
    for index in &near {
        let z = mapper.surfel(*index).unwrap().position.z;
        assert!(z >= 0.5 && z <= 1.5);
    }

    let far_only = mapper.bounding_box_indices(
        &Vector3::new(-2.0, -2.0, 2.5),
        &Vector3::new(2.0, 2.0, 3.5),
    );
    for index in &far_only {
        let z = mapper.surfel(*index).unwrap().position.z;
        assert!(z >= 2.5 && z <= 3.5);
    }
    assert_eq!(near.len() + far_only.len(), mapper.len());
}

#[test]
fn test_preview_cloud_covers_reliable_surfels() {
    let config = test_config().with_confidence_threshold(1);
    let mut mapper = make_mapper(config);
    let cloud = plane_patch(280, 210, 60, 40, 1.5, (200, 100, 50));
    mapper.integrate(&cloud, &SensorPose::identity()).unwrap();

    let preview = mapper.preview_cloud();
    assert!(!preview.is_empty());
    // Downsampling collapses many surfels into few voxels
    assert!(preview.len() <= mapper.len());
    for p in &preview.points {
        assert_relative_eq!(p.z, 1.5, epsilon = 0.05);
        assert_eq!((p.r, p.g, p.b), (200, 100, 50));
    }
}

#[test]
fn test_confidence_never_decreases() {
    let mut mapper = make_mapper(test_config());
    let pose = SensorPose::identity();
    let mut confidences: Vec<u32> = Vec::new();

    for depth in [1.0f32, 1.001, 1.002, 1.4, 1.003] {
        let cloud = plane_patch(310, 230, 8, 8, depth, (70, 70, 70));
        mapper.integrate(&cloud, &pose).unwrap();

        let current: Vec<u32> = (0..confidences.len() as u32)
            .map(|i| mapper.surfel(i).unwrap().confidence)
            .collect();
        for (before, after) in confidences.iter().zip(current.iter()) {
            assert!(after >= before, "confidence decreased: {} -> {}", before, after);
        }
        confidences = (0..mapper.len() as u32)
            .map(|i| mapper.surfel(i).unwrap().confidence)
            .collect();
    }
}
