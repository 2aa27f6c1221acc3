//! Background fusion worker with a single-slot frame hand-off.
//!
//! The loader thread pushes frames, the worker thread integrates them into
//! the block's volume. State crossing the thread boundary:
//! - the hand-off slot, a `Mutex<Option<FusionFrame>>` with a condvar,
//! - the stop request, an `AtomicBool`,
//! - the pipeline state, its own `Mutex`.
//!
//! No code path holds two of these locks at once.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;

use super::{FusionBackend, FusionFrame, FusionVolume, VolumeParams};
use crate::camera::CameraIntrinsics;
use crate::error::{EngineError, Error, Result};
use crate::settings::HandoffPolicy;

/// Longest time a waiting side sleeps before re-checking flags.
const IDLE_BACKOFF: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub pushed: usize,
    pub integrated: usize,
    /// Frames pushed but never integrated: overwritten in the slot, left in
    /// it when the worker exited, or rejected by the engine.
    /// `pushed == integrated + dropped` once the worker is joined.
    pub dropped: usize,
}

struct Shared {
    slot: Mutex<Option<FusionFrame>>,
    slot_changed: Condvar,
    stop_requested: AtomicBool,
    state: Mutex<PipelineState>,
    integrated: AtomicUsize,
    dropped: AtomicUsize,
}

impl Shared {
    fn new() -> Shared {
        Shared {
            slot: Mutex::new(None),
            slot_changed: Condvar::new(),
            stop_requested: AtomicBool::new(false),
            state: Mutex::new(PipelineState::Idle),
            integrated: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.lock() = state;
    }
}

type WorkerExit<V> = (V, std::result::Result<(), EngineError>);

/// Integrates one block's frames on a background thread.
///
/// `Idle → Running → Stopping → Stopped`, then `clear` returns to `Idle`.
/// The volume is created on `start`, lives on the worker while running and
/// comes back to the pipeline when the worker is joined.
pub struct FusionPipeline<'b, B: FusionBackend> {
    backend: &'b B,
    intrinsics: CameraIntrinsics,
    params: VolumeParams,
    policy: HandoffPolicy,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<WorkerExit<B::Volume>>>,
    volume: Option<B::Volume>,
    pushed: usize,
}

impl<'b, B: FusionBackend> FusionPipeline<'b, B> {
    pub fn new(
        backend: &'b B,
        intrinsics: CameraIntrinsics,
        params: VolumeParams,
        policy: HandoffPolicy,
    ) -> FusionPipeline<'b, B> {
        FusionPipeline {
            backend,
            intrinsics,
            params,
            policy,
            shared: Arc::new(Shared::new()),
            worker: None,
            volume: None,
            pushed: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            pushed: self.pushed,
            integrated: self.shared.integrated.load(Ordering::SeqCst),
            dropped: self.shared.dropped.load(Ordering::SeqCst),
        }
    }

    /// Allocates a fresh volume anchored at `origin` and spawns the worker.
    pub fn start(&mut self, origin: [f64; 3]) -> Result<()> {
        match self.state() {
            PipelineState::Running | PipelineState::Stopping => return Err(Error::AlreadyRunning),
            PipelineState::Stopped => return Err(Error::NotCleared),
            PipelineState::Idle => {}
        }
        let volume = self
            .backend
            .create(origin, &self.intrinsics, &self.params)
            .map_err(Error::Engine)?;

        self.shared = Arc::new(Shared::new());
        self.shared.set_state(PipelineState::Running);
        self.pushed = 0;

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("fusion-worker".to_string())
            .spawn(move || run_worker(shared, volume));
        match handle {
            Ok(handle) => {
                self.worker = Some(handle);
                log::debug!("fusion worker started at {:?}", origin);
                Ok(())
            }
            Err(e) => {
                self.shared.set_state(PipelineState::Idle);
                Err(Error::Io(e))
            }
        }
    }

    /// Hands `frame` to the worker.
    ///
    /// With [`HandoffPolicy::LatestWins`] this never blocks: a frame the
    /// worker has not taken yet is replaced and counted as dropped. With
    /// [`HandoffPolicy::Blocking`] it waits until the slot is free.
    pub fn push_frame(&mut self, frame: FusionFrame) -> Result<()> {
        if self.state() != PipelineState::Running {
            return Err(Error::NotRunning);
        }
        self.pushed += 1;
        let replaced = {
            let mut slot = self.shared.slot.lock();
            if self.policy == HandoffPolicy::Blocking {
                self.wait_for_free_slot(&mut slot);
            }
            slot.replace(frame)
        };
        self.shared.slot_changed.notify_all();
        if let Some(old) = replaced {
            self.shared.dropped.fetch_add(1, Ordering::SeqCst);
            log::trace!("frame {} overwritten before integration", old.id);
        }
        Ok(())
    }

    fn wait_for_free_slot(&self, slot: &mut MutexGuard<'_, Option<FusionFrame>>) {
        while slot.is_some() {
            let worker_alive = MutexGuard::unlocked(slot, || {
                matches!(
                    self.shared.state(),
                    PipelineState::Running | PipelineState::Stopping
                )
            });
            if !worker_alive {
                return;
            }
            self.shared.slot_changed.wait_for(slot, IDLE_BACKOFF);
        }
    }

    /// Asks the worker to stop once it has integrated what it holds.
    /// Returns immediately; use [`FusionPipeline::wait_stopped`] to join.
    pub fn request_stop(&mut self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                PipelineState::Idle => return Err(Error::NotRunning),
                PipelineState::Running => {
                    self.shared.stop_requested.store(true, Ordering::SeqCst);
                    *state = PipelineState::Stopping;
                }
                PipelineState::Stopping | PipelineState::Stopped => {}
            }
        }
        self.shared.slot_changed.notify_all();
        Ok(())
    }

    /// Joins the worker after [`FusionPipeline::request_stop`]. Returns the
    /// engine error that ended the worker early, if any.
    pub fn wait_stopped(&mut self) -> Result<()> {
        let Some(handle) = self.worker.take() else {
            return match self.state() {
                PipelineState::Stopped => Ok(()),
                _ => Err(Error::NotRunning),
            };
        };
        if self.state() == PipelineState::Running {
            self.worker = Some(handle);
            return Err(Error::StopNotRequested);
        }
        let joined = handle.join();
        self.shared.set_state(PipelineState::Stopped);
        if let Some(left) = self.shared.slot.lock().take() {
            self.shared.dropped.fetch_add(1, Ordering::SeqCst);
            log::debug!("frame {} was never taken by the worker", left.id);
        }
        match joined {
            Ok((volume, outcome)) => {
                self.volume = Some(volume);
                outcome.map_err(Error::Engine)
            }
            Err(_) => Err(Error::WorkerPanicked),
        }
    }

    /// Exports the block's artifact. Only valid once the worker was joined.
    pub fn save_artifact(&self, output_dir: &Path, name: &str) -> Result<PathBuf> {
        if self.state() != PipelineState::Stopped {
            return Err(Error::NotStopped);
        }
        let volume = self.volume.as_ref().ok_or(Error::NotStopped)?;
        volume
            .extract_artifact(output_dir, name)
            .map_err(Error::Engine)
    }

    /// Releases the volume and returns to `Idle`.
    pub fn clear(&mut self) -> Result<()> {
        match self.state() {
            PipelineState::Running | PipelineState::Stopping => return Err(Error::AlreadyRunning),
            PipelineState::Idle | PipelineState::Stopped => {}
        }
        if self.worker.is_some() {
            if let Err(e) = self.wait_stopped() {
                log::debug!("discarding worker result on clear: {}", e);
            }
        }
        self.volume = None;
        self.shared = Arc::new(Shared::new());
        self.pushed = 0;
        Ok(())
    }
}

impl<B: FusionBackend> Drop for FusionPipeline<'_, B> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.request_stop();
            let _ = self.wait_stopped();
        }
    }
}

/// Worker loop: take the slot, integrate, repeat. After a stop request the
/// frame still waiting in the slot is integrated before the worker exits.
fn run_worker<V: FusionVolume>(shared: Arc<Shared>, mut volume: V) -> WorkerExit<V> {
    let outcome = loop {
        let stop = shared.stop_requested.load(Ordering::SeqCst);
        let next = {
            let mut slot = shared.slot.lock();
            if slot.is_none() && !stop {
                shared.slot_changed.wait_for(&mut slot, IDLE_BACKOFF);
            }
            slot.take()
        };
        match next {
            Some(frame) => {
                shared.slot_changed.notify_all();
                if let Err(e) = volume.integrate(&frame) {
                    log::warn!("integration of frame {} failed: {}", frame.id, e);
                    shared.dropped.fetch_add(1, Ordering::SeqCst);
                    break Err(e);
                }
                shared.integrated.fetch_add(1, Ordering::SeqCst);
            }
            None if stop => break Ok(()),
            None => {}
        }
    };
    shared.set_state(PipelineState::Stopped);
    shared.slot_changed.notify_all();
    (volume, outcome)
}
