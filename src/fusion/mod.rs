//! Volumetric fusion of one block's frames.
//!
//! The fusion engine itself is a capability pair: a [`FusionBackend`] creates
//! a [`FusionVolume`] anchored at a block origin, the volume integrates frames
//! and exports one artifact. [`pipeline::FusionPipeline`] runs a volume on a
//! worker thread; [`tsdf::TsdfBackend`] is the CPU engine the binaries use.

pub mod pipeline;
pub mod tsdf;

use std::path::{Path, PathBuf};

use image::RgbImage;
use nalgebra as na;
use serde::Serialize;

use crate::camera::CameraIntrinsics;
use crate::error::EngineError;
use crate::settings::Settings;
use crate::types::{swap_red_blue, DepthImage, Frame};

pub use pipeline::{FusionPipeline, PipelineState, PipelineStats};
pub use tsdf::{TsdfBackend, TsdfVolume};

/// Frame as the fusion engine consumes it: RGB color, metric depth and a
/// camera-to-world pose.
#[derive(Debug, Clone)]
pub struct FusionFrame {
    pub id: u64,
    pub color: RgbImage,
    pub depth: DepthImage,
    pub twc: na::Matrix4<f64>,
}

impl FusionFrame {
    /// `bgr` reorders color channels of frames recorded in BGR order.
    pub fn from_frame(frame: Frame, bgr: bool) -> FusionFrame {
        let Frame {
            id,
            mut color,
            depth,
            pose,
        } = frame;
        if bgr {
            swap_red_blue(&mut color);
        }
        FusionFrame {
            id,
            color,
            depth,
            twc: pose.camera_to_world(),
        }
    }
}

/// Size of the voxel grid allocated for one block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeParams {
    pub voxel_size: f64,
    /// Voxels per axis.
    pub voxel_dim: u32,
    /// Half width of the truncation band, world units.
    pub truncation: f64,
    pub max_depth: f64,
}

impl VolumeParams {
    pub fn from_settings(settings: &Settings) -> VolumeParams {
        VolumeParams {
            voxel_size: settings.voxel_size,
            voxel_dim: settings.voxel_dim,
            truncation: settings.voxel_size * settings.truncation_factor,
            max_depth: settings.max_accurate_distance,
        }
    }

    /// Edge length of the volume.
    pub fn extent(&self) -> f64 {
        self.voxel_size * self.voxel_dim as f64
    }
}

pub trait FusionVolume: Send + 'static {
    fn integrate(&mut self, frame: &FusionFrame) -> Result<(), EngineError>;

    /// Writes the reconstruction of this volume to `output_dir` as one file
    /// named after `name` and returns its path.
    fn extract_artifact(&self, output_dir: &Path, name: &str) -> Result<PathBuf, EngineError>;
}

pub trait FusionBackend {
    type Volume: FusionVolume;

    fn create(
        &self,
        origin: [f64; 3],
        intrinsics: &CameraIntrinsics,
        params: &VolumeParams,
    ) -> Result<Self::Volume, EngineError>;
}
