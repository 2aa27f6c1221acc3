use nalgebra as na;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rgbd_block_fusion::block_key::{BlockKey, BLOCK_BIAS};
use rgbd_block_fusion::camera::CameraIntrinsics;
use rgbd_block_fusion::projection::{GeometryProjector, MIN_VALID_DEPTH};
use rgbd_block_fusion::types::Pose;

const MAX_DISTANCE: f64 = 10.0;

/// Whether `v` sits within `eps` of a block border along one axis.
fn near_border(v: f64, block_size: f64, eps: f64) -> bool {
    let t = (v - BLOCK_BIAS) / block_size;
    (t - t.round()).abs() < eps
}

#[test]
fn test_random_rigid_poses_project_like_the_inverse_isometry() {
    let mut rng = ChaCha8Rng::seed_from_u64(23);
    let cam = CameraIntrinsics::new(525.0, 520.0, 319.5, 239.5, 640, 480);
    let block_size = 2.56;

    for _ in 0..2000 {
        let rotation = na::UnitQuaternion::from_euler_angles(
            rng.random_range(-3.1..3.1),
            rng.random_range(-1.5..1.5),
            rng.random_range(-3.1..3.1),
        );
        let translation = na::Translation3::new(
            rng.random_range(-20.0..20.0),
            rng.random_range(-20.0..20.0),
            rng.random_range(-20.0..20.0),
        );
        let tcw = na::Isometry3::from_parts(translation, rotation);
        let pose = Pose::from_world_to_camera(tcw.to_homogeneous());
        let projector = GeometryProjector::new(&cam, &pose, MAX_DISTANCE);

        let u = rng.random_range(0..cam.width);
        let v = rng.random_range(0..cam.height);
        let d = rng.random_range(MIN_VALID_DEPTH * 2.0..=MAX_DISTANCE);

        let p_cam = na::Point3::new(
            d * (u as f64 - cam.cx) / cam.fx,
            d * (v as f64 - cam.cy) / cam.fy,
            d,
        );
        let expected = tcw.inverse() * p_cam;

        let p = projector.project(u, v, d).unwrap();
        assert!((p - expected).norm() < 1e-9, "{} vs {}", p, expected);

        let on_border = (0..3).any(|axis| near_border(expected[axis], block_size, 1e-9));
        if !on_border {
            assert_eq!(
                BlockKey::encode(&p, block_size),
                BlockKey::encode(&expected, block_size)
            );
        }
    }
}
