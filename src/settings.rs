use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::camera::CameraIntrinsics;
use crate::error::{Error, Result};
use crate::io::object_from_json;

/// How the fusion pipeline hands frames from the loader to its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffPolicy {
    /// Single slot, a newer frame overwrites an unconsumed one.
    #[default]
    LatestWins,
    /// Single slot, the producer waits until the worker took the previous frame.
    Blocking,
}

/// Reconstruction settings, read once at startup.
///
/// Keys follow the calibration files these sequences are recorded with, e.g.
/// `"Camera.fx"` or `"Voxel.Size.Offline"`. Camera and voxel entries are
/// required, everything else falls back to [`Settings::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "Camera.fx")]
    pub fx: f64,
    #[serde(rename = "Camera.fy")]
    pub fy: f64,
    #[serde(rename = "Camera.cx")]
    pub cx: f64,
    #[serde(rename = "Camera.cy")]
    pub cy: f64,
    #[serde(rename = "Camera.width")]
    pub width: u32,
    #[serde(rename = "Camera.height")]
    pub height: u32,
    /// 1 when color images are stored RGB, 0 when stored BGR.
    #[serde(rename = "Camera.RGB", default = "default_rgb")]
    pub rgb_order: u8,
    /// Raw input depth units per meter.
    #[serde(rename = "DepthMapFactor", default = "default_depth_factor")]
    pub depth_map_factor: f64,

    #[serde(rename = "Voxel.Size.Offline")]
    pub voxel_size: f64,
    #[serde(rename = "Voxel.Dim.x")]
    pub voxel_dim: u32,
    #[serde(rename = "Voxel.TruncationFactor", default = "default_truncation_factor")]
    pub truncation_factor: f64,

    #[serde(rename = "Categorize.Precision", default = "default_precision")]
    pub precision: usize,
    #[serde(
        rename = "Categorize.MaxAccurateDistance",
        default = "default_max_accurate_distance"
    )]
    pub max_accurate_distance: f64,

    #[serde(rename = "Reconstruct.OriginBound", default = "default_origin_bound")]
    pub origin_bound: f64,
    #[serde(rename = "Reconstruct.MinFrames", default = "default_min_frames")]
    pub min_frames: usize,
    #[serde(rename = "Reconstruct.Handoff", default)]
    pub handoff: HandoffPolicy,
}

fn default_rgb() -> u8 {
    1
}
fn default_depth_factor() -> f64 {
    1000.0
}
fn default_truncation_factor() -> f64 {
    4.0
}
fn default_precision() -> usize {
    5
}
fn default_max_accurate_distance() -> f64 {
    10.0
}
fn default_origin_bound() -> f64 {
    9.0
}
fn default_min_frames() -> usize {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fx: 525.0,
            fy: 525.0,
            cx: 319.5,
            cy: 239.5,
            width: 640,
            height: 480,
            rgb_order: default_rgb(),
            depth_map_factor: default_depth_factor(),
            voxel_size: 0.01,
            voxel_dim: 512,
            truncation_factor: default_truncation_factor(),
            precision: default_precision(),
            max_accurate_distance: default_max_accurate_distance(),
            origin_bound: default_origin_bound(),
            min_frames: default_min_frames(),
            handoff: HandoffPolicy::default(),
        }
    }
}

impl Settings {
    /// Reads and validates a settings file. Any missing or nonsensical
    /// calibration entry is an error; the caller cannot proceed without it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Settings> {
        let path = path.as_ref();
        let settings: Settings = object_from_json(path)
            .map_err(|e| Error::Settings(format!("{}: {}", path.display(), e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("Camera.fx", self.fx),
            ("Camera.fy", self.fy),
            ("DepthMapFactor", self.depth_map_factor),
            ("Voxel.Size.Offline", self.voxel_size),
            ("Voxel.TruncationFactor", self.truncation_factor),
            ("Categorize.MaxAccurateDistance", self.max_accurate_distance),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(Error::Settings(format!("{} must be positive, got {}", name, v)));
            }
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::Settings(format!(
                "camera size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.voxel_dim == 0 {
            return Err(Error::Settings("Voxel.Dim.x must be non-zero".to_string()));
        }
        if self.precision == 0 {
            return Err(Error::Settings("Categorize.Precision must be non-zero".to_string()));
        }
        if self.rgb_order > 1 {
            return Err(Error::Settings(format!(
                "Camera.RGB must be 0 or 1, got {}",
                self.rgb_order
            )));
        }
        Ok(())
    }

    pub fn intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::new(self.fx, self.fy, self.cx, self.cy, self.width, self.height)
    }

    /// Edge length of one reconstruction block in world units.
    pub fn block_size(&self) -> f64 {
        self.voxel_size * self.voxel_dim as f64
    }

    pub fn is_bgr(&self) -> bool {
        self.rgb_order == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_is_voxel_size_times_dim() {
        let settings = Settings {
            voxel_size: 0.02,
            voxel_dim: 256,
            ..Default::default()
        };
        assert!((settings.block_size() - 5.12).abs() < 1e-9);
    }

    #[test]
    fn optional_keys_fall_back_to_defaults() {
        let json = r#"{
            "Camera.fx": 500.0, "Camera.fy": 500.0, "Camera.cx": 320.0, "Camera.cy": 240.0,
            "Camera.width": 640, "Camera.height": 480,
            "Voxel.Size.Offline": 0.01, "Voxel.Dim.x": 512
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.precision, 5);
        assert_eq!(settings.min_frames, 3);
        assert_eq!(settings.handoff, HandoffPolicy::LatestWins);
        assert!((settings.max_accurate_distance - 10.0).abs() < 1e-12);
        assert!(!settings.is_bgr());
        settings.validate().unwrap();
    }

    #[test]
    fn missing_calibration_key_is_rejected() {
        let json = r#"{ "Camera.fx": 500.0, "Voxel.Size.Offline": 0.01, "Voxel.Dim.x": 512 }"#;
        assert!(serde_json::from_str::<Settings>(json).is_err());
    }

    #[test]
    fn zero_precision_is_rejected() {
        let settings = Settings {
            precision: 0,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(Error::Settings(_))));
    }
}
