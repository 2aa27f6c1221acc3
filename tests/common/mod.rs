#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use image::{Luma, Rgb, RgbImage};
use parking_lot::Mutex;
use rgbd_block_fusion::camera::CameraIntrinsics;
use rgbd_block_fusion::error::EngineError;
use rgbd_block_fusion::fusion::{FusionBackend, FusionFrame, FusionVolume, VolumeParams};
use rgbd_block_fusion::settings::HandoffPolicy;
use rgbd_block_fusion::types::{DepthImage, Frame, Pose};
use rgbd_block_fusion::Settings;

/// What the recording engine saw.
#[derive(Debug, Default)]
pub struct EngineLog {
    pub created: Vec<[f64; 3]>,
    pub integrated: Vec<u64>,
    pub first_pixels: Vec<[u8; 3]>,
    pub translations: Vec<[f64; 3]>,
    pub artifacts: Vec<String>,
}

/// Fusion engine stand-in that records calls, optionally slowly or failing.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    pub log: Arc<Mutex<EngineLog>>,
    pub delay: Duration,
    pub fail_on: Option<u64>,
}

impl RecordingBackend {
    pub fn slow(delay: Duration) -> RecordingBackend {
        RecordingBackend {
            delay,
            ..Default::default()
        }
    }

    pub fn failing_on(id: u64) -> RecordingBackend {
        RecordingBackend {
            fail_on: Some(id),
            ..Default::default()
        }
    }
}

pub struct RecordingVolume {
    log: Arc<Mutex<EngineLog>>,
    delay: Duration,
    fail_on: Option<u64>,
}

impl FusionBackend for RecordingBackend {
    type Volume = RecordingVolume;

    fn create(
        &self,
        origin: [f64; 3],
        _intrinsics: &CameraIntrinsics,
        _params: &VolumeParams,
    ) -> Result<RecordingVolume, EngineError> {
        self.log.lock().created.push(origin);
        Ok(RecordingVolume {
            log: Arc::clone(&self.log),
            delay: self.delay,
            fail_on: self.fail_on,
        })
    }
}

impl FusionVolume for RecordingVolume {
    fn integrate(&mut self, frame: &FusionFrame) -> Result<(), EngineError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail_on == Some(frame.id) {
            return Err("simulated GPU memory exhaustion".into());
        }
        let mut log = self.log.lock();
        log.integrated.push(frame.id);
        log.first_pixels.push(frame.color.get_pixel(0, 0).0);
        log.translations
            .push([frame.twc[(0, 3)], frame.twc[(1, 3)], frame.twc[(2, 3)]]);
        Ok(())
    }

    fn extract_artifact(&self, output_dir: &Path, name: &str) -> Result<PathBuf, EngineError> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(format!("{}.txt", name));
        let ids = format!("{:?}", self.log.lock().integrated);
        std::fs::write(&path, ids)?;
        self.log.lock().artifacts.push(name.to_string());
        Ok(path)
    }
}

pub fn intrinsics(width: u32, height: u32) -> CameraIntrinsics {
    CameraIntrinsics::new(
        width as f64,
        width as f64,
        (width as f64 - 1.0) / 2.0,
        (height as f64 - 1.0) / 2.0,
        width,
        height,
    )
}

/// Frame of a fronto-parallel wall at `depth` meters.
pub fn wall_frame(id: u64, width: u32, height: u32, depth: f32, pose: Pose) -> Frame {
    Frame {
        id,
        color: RgbImage::from_fn(width, height, |x, y| Rgb([10 * x as u8, 10 * y as u8, id as u8])),
        depth: DepthImage::from_pixel(width, height, Luma([depth])),
        pose,
    }
}

pub fn fusion_frame(id: u64) -> FusionFrame {
    FusionFrame::from_frame(wall_frame(id, 4, 4, 1.0, Pose::identity()), false)
}

/// Writes `frames` as a recording: `RGB/`, millimeter `depth/` and `tcw/`.
pub fn write_recording(root: &Path, frames: &[Frame]) {
    use rgbd_block_fusion::data_loader::{
        frame_file, write_pose, DEPTH_DIR, IMAGE_EXT, POSE_DIR, POSE_EXT, RGB_DIR,
    };
    use rgbd_block_fusion::types::depth_to_millimeters;

    for sub in [RGB_DIR, DEPTH_DIR, POSE_DIR] {
        std::fs::create_dir_all(root.join(sub)).unwrap();
    }
    for frame in frames {
        frame
            .color
            .save(frame_file(root, RGB_DIR, frame.id, IMAGE_EXT))
            .unwrap();
        depth_to_millimeters(&frame.depth)
            .save(frame_file(root, DEPTH_DIR, frame.id, IMAGE_EXT))
            .unwrap();
        write_pose(&frame_file(root, POSE_DIR, frame.id, POSE_EXT), &frame.pose).unwrap();
    }
}

/// 8x8 camera, 2 m blocks of 8 voxels.
pub fn small_settings() -> Settings {
    Settings {
        fx: 8.0,
        fy: 8.0,
        cx: 3.5,
        cy: 3.5,
        width: 8,
        height: 8,
        voxel_size: 0.25,
        voxel_dim: 8,
        precision: 1,
        handoff: HandoffPolicy::Blocking,
        ..Default::default()
    }
}
