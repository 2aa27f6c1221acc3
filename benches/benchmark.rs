use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::Luma;
use nalgebra as na;
use rgbd_block_fusion::camera::CameraIntrinsics;
use rgbd_block_fusion::categorize::FrameCategorizer;
use rgbd_block_fusion::fusion::{FusionFrame, FusionVolume, TsdfVolume, VolumeParams};
use rgbd_block_fusion::projection::GeometryProjector;
use rgbd_block_fusion::types::{DepthImage, Pose};

fn intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::new(525.0, 525.0, 319.5, 239.5, 640, 480)
}

fn tilted_pose() -> Pose {
    let axis = na::Unit::new_normalize(na::Vector3::new(1.0, 1.0, 0.5));
    let twc = na::Isometry3::from_parts(
        na::Translation3::new(0.5, -0.2, 1.0),
        na::UnitQuaternion::from_axis_angle(&axis, 0.2),
    );
    Pose::from_camera_to_world(twc.to_homogeneous())
}

fn ramp_depth() -> DepthImage {
    DepthImage::from_fn(640, 480, |x, y| Luma([1.0 + (x + y) as f32 * 0.01]))
}

fn bench_project(c: &mut Criterion) {
    let projector = GeometryProjector::new(&intrinsics(), &tilted_pose(), 10.0);
    c.bench_function("project_pixel", |b| {
        b.iter(|| projector.project(black_box(200), black_box(100), black_box(2.5)))
    });
}

fn bench_categorize(c: &mut Criterion) {
    let categorizer = FrameCategorizer::new(intrinsics(), 5.12, 5, 10.0);
    let depth = ramp_depth();
    let pose = tilted_pose();
    c.bench_function("categorize_vga_frame", |b| {
        b.iter(|| categorizer.categorize(black_box(&depth), black_box(&pose)))
    });
}

fn bench_integrate(c: &mut Criterion) {
    let params = VolumeParams {
        voxel_size: 0.02,
        voxel_dim: 256,
        truncation: 0.08,
        max_depth: 10.0,
    };
    let frame = FusionFrame {
        id: 0,
        color: image::RgbImage::new(640, 480),
        depth: ramp_depth(),
        twc: tilted_pose().camera_to_world(),
    };
    c.bench_function("tsdf_integrate_vga_frame", |b| {
        b.iter(|| {
            let mut volume = TsdfVolume::new([-2.0, -2.0, 0.0], &intrinsics(), &params);
            volume.integrate(black_box(&frame))
        })
    });
}

criterion_group!(benches, bench_project, bench_categorize, bench_integrate);
criterion_main!(benches);
