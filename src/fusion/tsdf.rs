//! Sparse CPU TSDF volume.
//!
//! Voxels are allocated on demand in a hash map. Each valid depth pixel
//! updates the voxels its ray crosses inside the truncation band around the
//! measured surface, with a running weighted average of the truncated signed
//! distance and of the color.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};

use super::{FusionBackend, FusionFrame, FusionVolume, VolumeParams};
use crate::camera::CameraIntrinsics;
use crate::error::EngineError;
use crate::ply::{write_point_cloud, ColoredPoint};
use crate::projection::MIN_VALID_DEPTH;

/// Voxels with `|tsdf|` below this are exported as surface points.
pub const SURFACE_THRESHOLD: f32 = 0.3;

const MAX_WEIGHT: f32 = 100.0;

#[derive(Debug, Clone, Copy)]
pub struct Voxel {
    /// -1 behind the surface, 1 in front of it.
    pub tsdf: f32,
    pub weight: f32,
    pub color: [f32; 3],
}

impl Default for Voxel {
    fn default() -> Self {
        Self {
            tsdf: 1.0,
            weight: 0.0,
            color: [0.0; 3],
        }
    }
}

/// Creates [`TsdfVolume`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsdfBackend;

impl FusionBackend for TsdfBackend {
    type Volume = TsdfVolume;

    fn create(
        &self,
        origin: [f64; 3],
        intrinsics: &CameraIntrinsics,
        params: &VolumeParams,
    ) -> Result<TsdfVolume, EngineError> {
        if params.voxel_dim == 0 || params.voxel_size <= 0.0 || params.truncation <= 0.0 {
            return Err(format!("invalid volume parameters {:?}", params).into());
        }
        Ok(TsdfVolume::new(origin, intrinsics, params))
    }
}

#[derive(Debug)]
pub struct TsdfVolume {
    origin: Vec3,
    voxel_size: f32,
    dim: i32,
    truncation: f32,
    max_depth: f32,
    intrinsics: [f32; 4],
    voxels: HashMap<(i32, i32, i32), Voxel>,
    frame_count: usize,
}

impl TsdfVolume {
    pub fn new(origin: [f64; 3], intrinsics: &CameraIntrinsics, params: &VolumeParams) -> Self {
        Self {
            origin: Vec3::new(origin[0] as f32, origin[1] as f32, origin[2] as f32),
            voxel_size: params.voxel_size as f32,
            dim: params.voxel_dim.min(i32::MAX as u32) as i32,
            truncation: params.truncation as f32,
            max_depth: params.max_depth as f32,
            intrinsics: intrinsics.params_f32(),
            voxels: HashMap::new(),
            frame_count: 0,
        }
    }

    /// Voxel index of a world position, `None` outside the volume.
    pub fn world_to_voxel(&self, pos: Vec3) -> Option<(i32, i32, i32)> {
        let rel = (pos - self.origin) / self.voxel_size;
        let (x, y, z) = (
            rel.x.floor() as i32,
            rel.y.floor() as i32,
            rel.z.floor() as i32,
        );
        let inside = |v: i32| v >= 0 && v < self.dim;
        if inside(x) && inside(y) && inside(z) {
            Some((x, y, z))
        } else {
            None
        }
    }

    /// Center of a voxel in world space.
    pub fn voxel_to_world(&self, ix: i32, iy: i32, iz: i32) -> Vec3 {
        self.origin + (Vec3::new(ix as f32, iy as f32, iz as f32) + 0.5) * self.voxel_size
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn num_voxels(&self) -> usize {
        self.voxels.len()
    }

    pub fn voxel(&self, ix: i32, iy: i32, iz: i32) -> Option<&Voxel> {
        self.voxels.get(&(ix, iy, iz))
    }

    /// Voxels close to the fused surface, as colored points.
    pub fn surface_points(&self, threshold: f32) -> Vec<ColoredPoint> {
        let mut points: Vec<_> = self
            .voxels
            .iter()
            .filter(|(_, v)| v.weight > 0.0 && v.tsdf.abs() < threshold)
            .map(|(&(x, y, z), v)| ColoredPoint {
                position: self.voxel_to_world(x, y, z).to_array(),
                color: v.color.map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8),
            })
            .collect();
        // hash order is not stable between runs
        points.sort_by(|a, b| {
            a.position
                .partial_cmp(&b.position)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        points
    }

    fn integrate_pixel(&mut self, twc: &Mat4, ray: Vec3, depth: f32, color: [u8; 3]) {
        let steps = (self.truncation / self.voxel_size).ceil() as i32;
        let rgb = color.map(|c| c as f32 / 255.0);
        for k in -steps..=steps {
            let sample_depth = depth + k as f32 * self.voxel_size;
            if sample_depth <= 0.0 {
                continue;
            }
            let world = twc.transform_point3(ray * sample_depth);
            let Some(idx) = self.world_to_voxel(world) else {
                continue;
            };
            let sdf = depth - sample_depth;
            let tsdf = (sdf / self.truncation).clamp(-1.0, 1.0);

            let voxel = self.voxels.entry(idx).or_default();
            let w = 1.0;
            let total = voxel.weight + w;
            voxel.tsdf = (voxel.tsdf * voxel.weight + tsdf * w) / total;
            for (c, n) in voxel.color.iter_mut().zip(rgb) {
                *c = (*c * voxel.weight + n * w) / total;
            }
            voxel.weight = total.min(MAX_WEIGHT);
        }
    }
}

impl FusionVolume for TsdfVolume {
    fn integrate(&mut self, frame: &FusionFrame) -> Result<(), EngineError> {
        if frame.color.dimensions() != frame.depth.dimensions() {
            return Err(format!(
                "frame {}: color {:?} and depth {:?} differ in size",
                frame.id,
                frame.color.dimensions(),
                frame.depth.dimensions()
            )
            .into());
        }
        let twc_cols: Vec<f32> = frame.twc.as_slice().iter().map(|&v| v as f32).collect();
        let twc = Mat4::from_cols_slice(&twc_cols);
        let [fx, fy, cx, cy] = self.intrinsics;

        for (x, y, d) in frame.depth.enumerate_pixels() {
            let depth = d[0];
            if !(depth as f64 > MIN_VALID_DEPTH && depth <= self.max_depth) {
                continue;
            }
            let ray = Vec3::new((x as f32 - cx) / fx, (y as f32 - cy) / fy, 1.0);
            let color = frame.color.get_pixel(x, y).0;
            self.integrate_pixel(&twc, ray, depth, color);
        }
        self.frame_count += 1;
        log::trace!(
            "integrated frame {} ({} voxels allocated)",
            frame.id,
            self.voxels.len()
        );
        Ok(())
    }

    fn extract_artifact(&self, output_dir: &Path, name: &str) -> Result<PathBuf, EngineError> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(format!("{}.ply", name));
        let points = self.surface_points(SURFACE_THRESHOLD);
        write_point_cloud(&path, &points)?;
        log::info!(
            "wrote {} surface points from {} frames to {}",
            points.len(),
            self.frame_count,
            path.display()
        );
        Ok(path)
    }
}
