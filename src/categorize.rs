//! Assignment of frames to the reconstruction blocks they observe.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;

use crate::block_key::BlockKey;
use crate::block_store::BlockStore;
use crate::camera::CameraIntrinsics;
use crate::data_loader::for_each_input_frame;
use crate::error::Result;
use crate::projection::GeometryProjector;
use crate::settings::Settings;
use crate::types::{DepthImage, Frame, Pose};

/// Blocks touched by one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Categorization {
    pub keys: BTreeSet<BlockKey>,
    /// Sampled pixels with a usable depth.
    pub valid_samples: usize,
}

/// Summary of one categorization run, written next to the block tree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategorizeReport {
    pub block_size: f64,
    pub frames_seen: usize,
    /// Frames without a single usable depth sample.
    pub frames_dropped: usize,
    /// Frames that could not be written to the store.
    pub frames_failed: usize,
    /// Frame count per block name.
    pub blocks: BTreeMap<String, usize>,
}

/// Decides which blocks a frame observes and files a copy of the frame under
/// each of them.
#[derive(Debug, Clone)]
pub struct FrameCategorizer {
    intrinsics: CameraIntrinsics,
    block_size: f64,
    precision: usize,
    max_accurate_distance: f64,
}

impl FrameCategorizer {
    pub fn new(
        intrinsics: CameraIntrinsics,
        block_size: f64,
        precision: usize,
        max_accurate_distance: f64,
    ) -> FrameCategorizer {
        FrameCategorizer {
            intrinsics,
            block_size,
            precision: precision.max(1),
            max_accurate_distance,
        }
    }

    pub fn from_settings(settings: &Settings) -> FrameCategorizer {
        Self::new(
            settings.intrinsics(),
            settings.block_size(),
            settings.precision,
            settings.max_accurate_distance,
        )
    }

    pub fn block_size(&self) -> f64 {
        self.block_size
    }

    /// Projects every `precision`-th row and column of `depth` and adds the
    /// block of each valid sample to `keys`. Returns the number of valid samples.
    pub fn categorize_into(
        &self,
        depth: &DepthImage,
        pose: &Pose,
        keys: &mut BTreeSet<BlockKey>,
    ) -> usize {
        let projector =
            GeometryProjector::new(&self.intrinsics, pose, self.max_accurate_distance);
        let mut valid = 0;
        for row in (0..depth.height()).step_by(self.precision) {
            for col in (0..depth.width()).step_by(self.precision) {
                let d = depth.get_pixel(col, row)[0] as f64;
                if let Some(p) = projector.project(col, row, d) {
                    keys.insert(BlockKey::encode(&p, self.block_size));
                    valid += 1;
                }
            }
        }
        log::trace!("{} valid samples in {} blocks", valid, keys.len());
        valid
    }

    pub fn categorize(&self, depth: &DepthImage, pose: &Pose) -> Categorization {
        let mut keys = BTreeSet::new();
        let valid_samples = self.categorize_into(depth, pose, &mut keys);
        Categorization {
            keys,
            valid_samples,
        }
    }

    /// Writes `frame` into the storage of every block in `keys`.
    pub fn dispatch<S: BlockStore + ?Sized>(
        &self,
        store: &S,
        frame: &Frame,
        keys: &BTreeSet<BlockKey>,
    ) -> Result<()> {
        for key in keys {
            let name = key.name(self.block_size);
            log::debug!("frame {} -> block {}", frame.id, name);
            store.put_frame(&name, frame)?;
        }
        Ok(())
    }

    /// Categorizes one frame and files it.
    pub fn categorize_frame<S: BlockStore + ?Sized>(
        &self,
        store: &S,
        frame: &Frame,
    ) -> Result<Categorization> {
        let categorization = self.categorize(&frame.depth, &frame.pose);
        if categorization.keys.is_empty() {
            log::info!("frame {}: no valid depth, dropped", frame.id);
        } else {
            log::info!(
                "frame {}: {} blocks",
                frame.id,
                categorization.keys.len()
            );
        }
        self.dispatch(store, frame, &categorization.keys)?;
        Ok(categorization)
    }

    /// Categorizes every recorded frame under `frames_root` into `store`.
    pub fn categorize_recording<S: BlockStore + ?Sized>(
        &self,
        frames_root: &Path,
        depth_factor: f64,
        store: &S,
    ) -> Result<CategorizeReport> {
        let results = for_each_input_frame(frames_root, depth_factor, |frame| {
            let id = frame.id;
            self.categorize_frame(store, &frame).map_err(|e| {
                log::warn!("frame {}: {}", id, e);
                e
            })
        })?;

        let mut report = CategorizeReport {
            block_size: self.block_size,
            ..Default::default()
        };
        for result in results {
            report.frames_seen += 1;
            match result {
                Ok(c) if c.keys.is_empty() => report.frames_dropped += 1,
                Ok(c) => {
                    for key in c.keys {
                        *report.blocks.entry(key.name(self.block_size)).or_default() += 1;
                    }
                }
                Err(_) => report.frames_failed += 1,
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_skips_pixels() {
        let cam = CameraIntrinsics::new(1.0, 1.0, 0.0, 0.0, 10, 10);
        let categorizer = FrameCategorizer::new(cam, 10.0, 5, 10.0);
        let depth = DepthImage::from_pixel(10, 10, image::Luma([1.0]));
        let c = categorizer.categorize(&depth, &Pose::identity());
        // rows and cols 0 and 5
        assert_eq!(c.valid_samples, 4);
    }
}
