//! Per-block frame storage.
//!
//! Categorization writes frame copies keyed by `(block name, frame id)`;
//! reconstruction lists blocks and reads their frames back. [`BlockStore`]
//! is that small key-value contract, so the directory layout can be swapped
//! for another store without touching either side.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::data_loader::{
    frame_file, frame_ids_in, load_frame, write_pose, DEPTH_DIR, IMAGE_EXT, POSE_DIR, POSE_EXT,
    RGB_DIR,
};
use crate::error::{Error, Result};
use crate::types::{depth_to_millimeters, Frame, STORED_DEPTH_FACTOR};

/// Name of the per-block tree under a frames root.
pub const CATEGORIZED_DIR: &str = "frames_categorized";

pub trait BlockStore: Send + Sync {
    /// Stores `frame` under `block`, replacing an earlier copy with the same id.
    fn put_frame(&self, block: &str, frame: &Frame) -> Result<()>;

    /// Names of all blocks, sorted.
    fn list_blocks(&self) -> Result<Vec<String>>;

    /// Ids of the frames stored under `block`, ascending.
    fn list_frames(&self, block: &str) -> Result<Vec<u64>>;

    fn get_frame(&self, block: &str, id: u64) -> Result<Frame>;
}

/// One directory per block, each with `RGB/`, `depth/` and `tcw/`.
///
/// Depth is written as 16-bit millimeters, so a frame read back carries depth
/// quantized to 1 mm.
#[derive(Debug, Clone)]
pub struct DirectoryBlockStore {
    root: PathBuf,
}

impl DirectoryBlockStore {
    pub fn new(root: impl Into<PathBuf>) -> DirectoryBlockStore {
        DirectoryBlockStore { root: root.into() }
    }

    /// Store at `<frames_root>/frames_categorized`.
    pub fn under_frames_root(frames_root: &Path) -> DirectoryBlockStore {
        Self::new(frames_root.join(CATEGORIZED_DIR))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn block_dir(&self, block: &str) -> PathBuf {
        self.root.join(block)
    }

    fn create_block_dirs(&self, block: &str) -> Result<PathBuf> {
        let dir = self.block_dir(block);
        for sub in [RGB_DIR, DEPTH_DIR, POSE_DIR] {
            let sub_dir = dir.join(sub);
            if !sub_dir.is_dir() {
                log::debug!("creating folder: {}", sub_dir.display());
                std::fs::create_dir_all(&sub_dir)?;
            }
        }
        Ok(dir)
    }
}

impl BlockStore for DirectoryBlockStore {
    fn put_frame(&self, block: &str, frame: &Frame) -> Result<()> {
        let dir = self.create_block_dirs(block)?;
        frame
            .color
            .save(frame_file(&dir, RGB_DIR, frame.id, IMAGE_EXT))?;
        depth_to_millimeters(&frame.depth).save(frame_file(&dir, DEPTH_DIR, frame.id, IMAGE_EXT))?;
        write_pose(&frame_file(&dir, POSE_DIR, frame.id, POSE_EXT), &frame.pose)
    }

    fn list_blocks(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(Error::MissingData(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn list_frames(&self, block: &str) -> Result<Vec<u64>> {
        frame_ids_in(&self.block_dir(block).join(RGB_DIR), IMAGE_EXT)
    }

    fn get_frame(&self, block: &str, id: u64) -> Result<Frame> {
        load_frame(&self.block_dir(block), id, STORED_DEPTH_FACTOR)
    }
}

/// Keeps frames in memory, unquantized. Handy for tests and for short
/// sequences that never need to hit the disk.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<BTreeMap<String, HashMap<u64, Frame>>>,
}

impl MemoryBlockStore {
    pub fn new() -> MemoryBlockStore {
        Self::default()
    }
}

impl BlockStore for MemoryBlockStore {
    fn put_frame(&self, block: &str, frame: &Frame) -> Result<()> {
        self.blocks
            .write()
            .entry(block.to_string())
            .or_default()
            .insert(frame.id, frame.clone());
        Ok(())
    }

    fn list_blocks(&self) -> Result<Vec<String>> {
        Ok(self.blocks.read().keys().cloned().collect())
    }

    fn list_frames(&self, block: &str) -> Result<Vec<u64>> {
        let blocks = self.blocks.read();
        let mut ids: Vec<u64> = blocks
            .get(block)
            .map(|frames| frames.keys().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        Ok(ids)
    }

    fn get_frame(&self, block: &str, id: u64) -> Result<Frame> {
        self.blocks
            .read()
            .get(block)
            .and_then(|frames| frames.get(&id))
            .cloned()
            .ok_or_else(|| Error::MissingData(format!("frame {} in block {}", id, block)))
    }
}
