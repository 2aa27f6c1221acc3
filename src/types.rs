use image::{ImageBuffer, Luma, RgbImage};
use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Metric depth, one `f32` per pixel in meters, 0 where invalid.
pub type DepthImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Depth as stored on disk: 16-bit fixed point.
pub type RawDepthImage = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Millimeters per meter in stored depth images.
pub const STORED_DEPTH_FACTOR: f64 = 1000.0;

/// Rigid camera pose.
///
/// The pose is held as world-to-camera (`Tcw`), the form frames are captured,
/// stored and loaded in. Everything that places pixels in the world asks for
/// [`Pose::camera_to_world`], which is the single place the inversion happens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    tcw: na::Matrix4<f64>,
}

impl Pose {
    pub fn identity() -> Pose {
        Pose {
            tcw: na::Matrix4::identity(),
        }
    }

    pub fn from_world_to_camera(tcw: na::Matrix4<f64>) -> Pose {
        Pose { tcw }
    }

    /// Builds a pose from a camera-to-world transform (e.g. a camera placed
    /// in a synthetic scene).
    pub fn from_camera_to_world(twc: na::Matrix4<f64>) -> Pose {
        Pose {
            tcw: rigid_inverse(&twc),
        }
    }

    pub fn world_to_camera(&self) -> na::Matrix4<f64> {
        self.tcw
    }

    pub fn camera_to_world(&self) -> na::Matrix4<f64> {
        rigid_inverse(&self.tcw)
    }

    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = self.tcw[(r, c)];
            }
        }
        rows
    }

    pub fn from_rows(rows: &[[f64; 4]; 4]) -> Pose {
        Pose {
            tcw: na::Matrix4::from_fn(|r, c| rows[r][c]),
        }
    }
}

/// `[R t; 0 1]⁻¹ = [Rᵀ -Rᵀt; 0 1]`.
fn rigid_inverse(m: &na::Matrix4<f64>) -> na::Matrix4<f64> {
    let r = m.fixed_view::<3, 3>(0, 0).transpose();
    let t = -(r * m.fixed_view::<3, 1>(0, 3));
    let mut inv = na::Matrix4::identity();
    inv.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
    inv.fixed_view_mut::<3, 1>(0, 3).copy_from(&t);
    inv
}

/// On-disk pose file body, row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseRecord {
    pub tcw: [[f64; 4]; 4],
}

impl From<&Pose> for PoseRecord {
    fn from(pose: &Pose) -> Self {
        PoseRecord { tcw: pose.to_rows() }
    }
}

impl From<&PoseRecord> for Pose {
    fn from(record: &PoseRecord) -> Self {
        Pose::from_rows(&record.tcw)
    }
}

/// One posed RGB-D capture.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: u64,
    pub color: RgbImage,
    pub depth: DepthImage,
    pub pose: Pose,
}

/// Converts raw depth in `factor` units per meter to meters.
pub fn depth_from_raw(raw: &RawDepthImage, factor: f64) -> DepthImage {
    let scale = (1.0 / factor) as f32;
    DepthImage::from_fn(raw.width(), raw.height(), |x, y| {
        Luma([raw.get_pixel(x, y)[0] as f32 * scale])
    })
}

/// Converts metric depth to stored millimeters. Values outside the `u16`
/// range saturate, negative and NaN values become 0 (invalid).
pub fn depth_to_millimeters(depth: &DepthImage) -> RawDepthImage {
    let factor = STORED_DEPTH_FACTOR as f32;
    RawDepthImage::from_fn(depth.width(), depth.height(), |x, y| {
        let d = depth.get_pixel(x, y)[0] * factor;
        // `as` saturates and maps NaN to 0
        Luma([d.round() as u16])
    })
}

/// Swaps the first and third channel in place, BGR <-> RGB.
pub fn swap_red_blue(img: &mut RgbImage) {
    for p in img.pixels_mut() {
        p.0.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_to_world_inverts_world_to_camera() {
        let rot = na::Rotation3::from_euler_angles(0.1, -0.4, 0.7);
        let iso = na::Isometry3::from_parts(na::Translation3::new(1.0, -2.0, 0.5), rot.into());
        let pose = Pose::from_world_to_camera(iso.to_homogeneous());
        let prod = pose.world_to_camera() * pose.camera_to_world();
        assert!((prod - na::Matrix4::identity()).norm() < 1e-12);
    }

    #[test]
    fn millimeter_conversion_saturates_and_zeroes_invalid() {
        let depth = DepthImage::from_raw(4, 1, vec![1.2346, -1.0, f32::NAN, 100.0]).unwrap();
        let mm = depth_to_millimeters(&depth);
        assert_eq!(mm.get_pixel(0, 0)[0], 1235);
        assert_eq!(mm.get_pixel(1, 0)[0], 0);
        assert_eq!(mm.get_pixel(2, 0)[0], 0);
        assert_eq!(mm.get_pixel(3, 0)[0], u16::MAX);
        let back = depth_from_raw(&mm, STORED_DEPTH_FACTOR);
        assert!((back.get_pixel(0, 0)[0] - 1.235).abs() < 1e-6);
    }
}
