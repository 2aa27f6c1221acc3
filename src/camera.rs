use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Pinhole intrinsics of the depth-registered color camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: u32, height: u32) -> CameraIntrinsics {
        CameraIntrinsics {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    /// Camera matrix `K`.
    pub fn k(&self) -> na::Matrix3<f64> {
        na::Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Closed form `K⁻¹`; `fx` and `fy` are validated non-zero by the settings.
    pub fn k_inv(&self) -> na::Matrix3<f64> {
        na::Matrix3::new(
            1.0 / self.fx,
            0.0,
            -self.cx / self.fx,
            0.0,
            1.0 / self.fy,
            -self.cy / self.fy,
            0.0,
            0.0,
            1.0,
        )
    }

    /// `[fx, fy, cx, cy]` in single precision, the layout volume backends take.
    pub fn params_f32(&self) -> [f32; 4] {
        [self.fx as f32, self.fy as f32, self.cx as f32, self.cy as f32]
    }
}
