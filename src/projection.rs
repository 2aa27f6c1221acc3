//! Depth pixel to world point back-projection.

use nalgebra as na;

use crate::camera::CameraIntrinsics;
use crate::types::Pose;

/// Depth at or below this is treated as "no measurement".
pub const MIN_VALID_DEPTH: f64 = 1e-4;

/// Back-projects depth pixels of one frame into world space.
///
/// Holds `K⁻¹` and the camera-to-world rotation and translation so the per
/// pixel work is two matrix-vector products.
#[derive(Debug, Clone)]
pub struct GeometryProjector {
    k_inv: na::Matrix3<f64>,
    rotation: na::Matrix3<f64>,
    translation: na::Vector3<f64>,
    max_accurate_distance: f64,
}

impl GeometryProjector {
    pub fn new(
        intrinsics: &CameraIntrinsics,
        pose: &Pose,
        max_accurate_distance: f64,
    ) -> GeometryProjector {
        Self::from_parts(intrinsics.k_inv(), &pose.camera_to_world(), max_accurate_distance)
    }

    /// `twc` is camera-to-world.
    pub fn from_parts(
        k_inv: na::Matrix3<f64>,
        twc: &na::Matrix4<f64>,
        max_accurate_distance: f64,
    ) -> GeometryProjector {
        GeometryProjector {
            k_inv,
            rotation: twc.fixed_view::<3, 3>(0, 0).into_owned(),
            translation: twc.fixed_view::<3, 1>(0, 3).into_owned(),
            max_accurate_distance,
        }
    }

    /// Whether `depth` is a measurement the sensor is accurate for.
    pub fn is_valid_depth(&self, depth: f64) -> bool {
        depth > MIN_VALID_DEPTH && depth <= self.max_accurate_distance
    }

    /// `R · (d · K⁻¹ · [col, row, 1]ᵀ) + t`, or `None` for invalid depth.
    pub fn project(&self, col: u32, row: u32, depth: f64) -> Option<na::Point3<f64>> {
        if !self.is_valid_depth(depth) {
            return None;
        }
        let ray = self.k_inv * na::Vector3::new(col as f64, row as f64, 1.0);
        let p_cam = ray * depth;
        Some(na::Point3::from(self.rotation * p_cam + self.translation))
    }
}
