use std::path::{Path, PathBuf};

use glob::glob;
use image::RgbImage;
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::io::{object_from_json, object_to_json};
use crate::types::{depth_from_raw, Frame, Pose, PoseRecord, RawDepthImage};

/// Color images, one `<id>.png` per frame.
pub const RGB_DIR: &str = "RGB";
/// 16-bit depth images, one `<id>.png` per frame.
pub const DEPTH_DIR: &str = "depth";
/// World-to-camera poses, one `<id>.json` per frame.
pub const POSE_DIR: &str = "tcw";

pub const IMAGE_EXT: &str = "png";
pub const POSE_EXT: &str = "json";

/// Parses the frame id from a file path.
///
/// Assumes the filename (without extension) is the integer frame id.
fn path_to_frame_id(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.parse().ok()
}

/// Sorted ids of all `*.{ext}` files in `dir` named by an integer id.
/// A missing directory holds no frames.
pub fn frame_ids_in(dir: &Path, ext: &str) -> Result<Vec<u64>> {
    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        ext
    );
    let paths = glob(&pattern).map_err(|e| Error::MissingData(e.to_string()))?;
    let mut ids: Vec<u64> = paths
        .filter_map(|p| p.ok())
        .filter_map(|p| path_to_frame_id(&p))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

pub fn frame_file(dir: &Path, sub: &str, id: u64, ext: &str) -> PathBuf {
    dir.join(sub).join(format!("{}.{}", id, ext))
}

fn require(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::MissingData(path.display().to_string()))
    }
}

pub fn read_color(path: &Path) -> Result<RgbImage> {
    require(path)?;
    Ok(image::open(path)?.into_rgb8())
}

pub fn read_raw_depth(path: &Path) -> Result<RawDepthImage> {
    require(path)?;
    Ok(image::open(path)?.into_luma16())
}

pub fn read_pose(path: &Path) -> Result<Pose> {
    require(path)?;
    let record: PoseRecord = object_from_json(path)?;
    Ok(Pose::from(&record))
}

pub fn write_pose(path: &Path, pose: &Pose) -> Result<()> {
    object_to_json(path, &PoseRecord::from(pose))
}

/// Reads frame `id` from a directory holding `RGB/`, `depth/` and `tcw/`.
/// `depth_factor` is the number of raw depth units per meter.
pub fn load_frame(dir: &Path, id: u64, depth_factor: f64) -> Result<Frame> {
    let color = read_color(&frame_file(dir, RGB_DIR, id, IMAGE_EXT))?;
    let raw = read_raw_depth(&frame_file(dir, DEPTH_DIR, id, IMAGE_EXT))?;
    let pose = read_pose(&frame_file(dir, POSE_DIR, id, POSE_EXT))?;
    if color.dimensions() != raw.dimensions() {
        return Err(Error::MissingData(format!(
            "frame {} in {}: color is {:?} but depth is {:?}",
            id,
            dir.display(),
            color.dimensions(),
            raw.dimensions()
        )));
    }
    Ok(Frame {
        id,
        color,
        depth: depth_from_raw(&raw, depth_factor),
        pose,
    })
}

/// Ids of the recorded input frames under `root`, keyed by the depth images.
pub fn input_frame_ids(root: &Path) -> Result<Vec<u64>> {
    let depth_dir = root.join(DEPTH_DIR);
    if !depth_dir.is_dir() {
        return Err(Error::MissingData(format!(
            "{} is not a directory",
            depth_dir.display()
        )));
    }
    frame_ids_in(&depth_dir, IMAGE_EXT)
}

/// Loads the recorded input frames under `root` in parallel and hands each
/// to `f`, showing progress. Frames with a missing or unreadable file are
/// logged and skipped; `f` decides what to do with the others.
pub fn for_each_input_frame<F, T>(root: &Path, depth_factor: f64, f: F) -> Result<Vec<T>>
where
    F: Fn(Frame) -> T + Send + Sync,
    T: Send,
{
    let ids = input_frame_ids(root)?;
    log::info!("found {} frames under {}", ids.len(), root.display());
    let mut results: Vec<(u64, T)> = ids
        .par_iter()
        .progress_count(ids.len() as u64)
        .filter_map(|&id| match load_frame(root, id, depth_factor) {
            Ok(frame) => Some((id, f(frame))),
            Err(e) => {
                log::warn!("skipping frame {}: {}", id, e);
                None
            }
        })
        .collect();
    results.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(results.into_iter().map(|(_, t)| t).collect())
}
