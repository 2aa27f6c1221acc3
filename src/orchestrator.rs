//! Block-by-block reconstruction driver.
//!
//! Walks the categorized blocks in name order and runs a fresh
//! [`FusionPipeline`] per block: start at the block origin, stream the block's
//! frames, stop, save the artifact, clear. Blocks are independent; whatever
//! goes wrong in one is recorded in the report and the next block proceeds.

use std::path::{Path, PathBuf};

use indicatif::ProgressIterator;
use serde::Serialize;

use crate::block_key::BlockKey;
use crate::block_store::BlockStore;
use crate::camera::CameraIntrinsics;
use crate::error::{Error, Result};
use crate::fusion::{FusionBackend, FusionFrame, FusionPipeline, PipelineStats, VolumeParams};
use crate::settings::{HandoffPolicy, Settings};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BlockOutcome {
    Reconstructed {
        artifact: PathBuf,
        stats: PipelineStats,
        /// Frames listed for the block that could not be loaded.
        skipped_frames: usize,
    },
    MalformedKey,
    OutOfBounds {
        origin: [f64; 3],
    },
    /// Listed frames, or frames actually loaded when files went missing.
    TooFewFrames {
        frames: usize,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockReport {
    pub block: String,
    #[serde(flatten)]
    pub outcome: BlockOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconstructionReport {
    pub blocks: Vec<BlockReport>,
}

impl ReconstructionReport {
    pub fn reconstructed(&self) -> impl Iterator<Item = &BlockReport> {
        self.blocks
            .iter()
            .filter(|b| matches!(b.outcome, BlockOutcome::Reconstructed { .. }))
    }

    pub fn outcome(&self, block: &str) -> Option<&BlockOutcome> {
        self.blocks
            .iter()
            .find(|b| b.block == block)
            .map(|b| &b.outcome)
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Blocks with an origin coordinate beyond this magnitude are ignored.
    pub origin_bound: f64,
    pub min_frames: usize,
    pub bgr_input: bool,
    pub handoff: HandoffPolicy,
    pub output_dir: PathBuf,
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings, output_dir: impl Into<PathBuf>) -> Self {
        OrchestratorConfig {
            origin_bound: settings.origin_bound,
            min_frames: settings.min_frames,
            bgr_input: settings.is_bgr(),
            handoff: settings.handoff,
            output_dir: output_dir.into(),
        }
    }
}

pub struct Orchestrator<'a, S: BlockStore + ?Sized, B: FusionBackend> {
    store: &'a S,
    backend: &'a B,
    intrinsics: CameraIntrinsics,
    volume_params: VolumeParams,
    config: OrchestratorConfig,
}

impl<'a, S: BlockStore + ?Sized, B: FusionBackend> Orchestrator<'a, S, B> {
    pub fn new(
        store: &'a S,
        backend: &'a B,
        intrinsics: CameraIntrinsics,
        volume_params: VolumeParams,
        config: OrchestratorConfig,
    ) -> Self {
        Orchestrator {
            store,
            backend,
            intrinsics,
            volume_params,
            config,
        }
    }

    pub fn from_settings(
        store: &'a S,
        backend: &'a B,
        settings: &Settings,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::new(
            store,
            backend,
            settings.intrinsics(),
            VolumeParams::from_settings(settings),
            OrchestratorConfig::from_settings(settings, output_dir),
        )
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Reconstructs every block in the store. Only failing to enumerate the
    /// blocks at all is an error.
    pub fn run(&self) -> Result<ReconstructionReport> {
        let names = self.store.list_blocks()?;
        log::info!("{} blocks to reconstruct", names.len());
        let blocks = names
            .into_iter()
            .map(|name| {
                let outcome = self.process_block(&name);
                BlockReport {
                    block: name,
                    outcome,
                }
            })
            .collect();
        Ok(ReconstructionReport { blocks })
    }

    pub fn process_block(&self, name: &str) -> BlockOutcome {
        let origin = match BlockKey::decode(name) {
            Ok(origin) => origin,
            Err(e) => {
                log::warn!("skipping block: {}", e);
                return BlockOutcome::MalformedKey;
            }
        };
        if origin.iter().any(|v| v.abs() > self.config.origin_bound) {
            log::debug!("block {} lies outside the reconstruction bound", name);
            return BlockOutcome::OutOfBounds { origin };
        }
        let ids = match self.store.list_frames(name) {
            Ok(ids) => ids,
            Err(e) => {
                log::warn!("block {}: cannot list frames: {}", name, e);
                return BlockOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };
        if ids.len() < self.config.min_frames {
            log::info!(
                "block {}: {} frames, need at least {}",
                name,
                ids.len(),
                self.config.min_frames
            );
            return BlockOutcome::TooFewFrames { frames: ids.len() };
        }

        log::info!("reconstructing block {} from {} frames", name, ids.len());
        match self.fuse_block(name, origin, &ids) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("block {} abandoned: {}", name, e);
                BlockOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Runs one block through a fresh pipeline. The artifact is only saved
    /// when enough frames were loaded and at least one was integrated.
    fn fuse_block(&self, name: &str, origin: [f64; 3], ids: &[u64]) -> Result<BlockOutcome> {
        let mut pipeline = FusionPipeline::new(
            self.backend,
            self.intrinsics,
            self.volume_params,
            self.config.handoff,
        );
        pipeline.start(origin)?;
        let (loaded, skipped_frames) = self.stream_frames(&mut pipeline, name, ids);
        pipeline.request_stop()?;
        let stopped = pipeline.wait_stopped();
        let stats = pipeline.stats();
        let outcome = stopped.and_then(|_| {
            if loaded < self.config.min_frames || stats.integrated == 0 {
                log::info!(
                    "block {}: only {} of {} frames could be loaded, nothing saved",
                    name,
                    loaded,
                    ids.len()
                );
                return Ok(BlockOutcome::TooFewFrames { frames: loaded });
            }
            let artifact = pipeline.save_artifact(&self.config.output_dir, name)?;
            Ok(BlockOutcome::Reconstructed {
                artifact,
                stats,
                skipped_frames,
            })
        });
        pipeline.clear()?;
        outcome
    }

    /// Loads the block's frames in id order and pushes them. Returns how many
    /// frames were pushed and how many could not be loaded.
    fn stream_frames(
        &self,
        pipeline: &mut FusionPipeline<'_, B>,
        name: &str,
        ids: &[u64],
    ) -> (usize, usize) {
        let mut loaded = 0;
        let mut skipped = 0;
        for &id in ids.iter().progress_count(ids.len() as u64) {
            if !pipeline.is_running() {
                // the worker ended early, its error surfaces on join
                break;
            }
            let frame = match self.store.get_frame(name, id) {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("block {}: skipping frame {}: {}", name, id, e);
                    skipped += 1;
                    continue;
                }
            };
            log::debug!("block {}: pushing frame {}", name, id);
            match pipeline.push_frame(FusionFrame::from_frame(frame, self.config.bgr_input)) {
                Ok(()) => loaded += 1,
                Err(Error::NotRunning) => break,
                Err(e) => {
                    log::warn!("block {}: frame {}: {}", name, id, e);
                    break;
                }
            }
        }
        (loaded, skipped)
    }
}
