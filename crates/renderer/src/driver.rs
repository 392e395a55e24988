//! Generic frame driver.
//!
//! [`FrameDriver`] implements [`Renderer`] for any [`GpuBackend`]. It owns the
//! frame state machine and the fixed per-frame order:
//!
//! acquire target -> create command buffer -> begin frame -> record draws ->
//! end frame -> submit -> present
//!
//! Stale presentation targets are rebuilt here and reported as skipped
//! frames, so they never reach the caller.

use std::time::Duration;

use forge_core::{Error, Result};
use forge_platform::Window;
use forge_rhi::types::Extent2D;
use tracing::{debug, error, info, warn};

use crate::backend::{Acquired, GpuBackend, PresentStatus};
use crate::contract::{FrameOutcome, Renderer, SkipReason};
use crate::select::BackendKind;
use crate::state::FrameState;

/// Drives a [`GpuBackend`] through the frame lifecycle.
pub struct FrameDriver<B: GpuBackend> {
    backend: B,
    state: FrameState,
    extent: Extent2D,
    pending_resize: Option<Extent2D>,
    idle_timeout: Duration,
    frame_index: u64,
}

impl<B: GpuBackend> FrameDriver<B> {
    /// Wrap an inert backend. `idle_timeout` bounds the wait in `cleanup`.
    pub fn new(backend: B, idle_timeout: Duration) -> Self {
        Self {
            backend,
            state: FrameState::Uninitialized,
            extent: Extent2D::default(),
            pending_resize: None,
            idle_timeout,
            frame_index: 0,
        }
    }

    pub fn backend_impl(&self) -> &B {
        &self.backend
    }

    /// Current presentation extent.
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    /// Frames that reached submission.
    pub fn frames_submitted(&self) -> u64 {
        self.frame_index
    }

    fn transition(&mut self, next: FrameState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal frame transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    fn apply_pending_resize(&mut self) -> Result<()> {
        let Some(extent) = self.pending_resize.take() else {
            return Ok(());
        };
        if extent == self.extent {
            return Ok(());
        }
        debug!(
            width = extent.width,
            height = extent.height,
            "Applying deferred resize"
        );
        self.extent = extent;
        self.backend.handle_resize(extent)
    }

    fn rebuild_stale_target(&mut self) -> Result<FrameOutcome> {
        debug!(backend = %B::KIND, "Presentation target stale, rebuilding");
        match self.backend.handle_resize(self.extent) {
            Ok(()) | Err(Error::PresentationTargetStale) => {
                Ok(FrameOutcome::Skipped(SkipReason::TargetStale))
            }
            Err(e) => Err(e),
        }
    }

    fn encode(&mut self, cb: &mut B::CommandBuffer, target: &B::Target) -> Result<()> {
        self.backend.begin_frame(cb, target)?;
        self.backend.record_draws(cb)?;
        self.backend.end_frame(cb)
    }

    /// Hand an unpresented target back to the backend, then report `cause`.
    fn abandon_frame(
        &mut self,
        target: B::Target,
        cb: Option<B::CommandBuffer>,
        cause: Error,
    ) -> Result<FrameOutcome> {
        debug!(backend = %B::KIND, "Abandoning frame: {}", cause);
        match self.backend.abort_frame(target, cb) {
            Err(e) if e.is_fatal() && !cause.is_fatal() => Err(e),
            Err(e) => {
                warn!(backend = %B::KIND, "Frame abort incomplete: {}", e);
                Err(cause)
            }
            Ok(()) => Err(cause),
        }
    }

    fn run_frame(&mut self) -> Result<FrameOutcome> {
        self.apply_pending_resize()?;
        if self.extent.is_empty() {
            return Ok(FrameOutcome::Skipped(SkipReason::TargetUnavailable));
        }

        let target = match self.backend.acquire_target()? {
            Acquired::Target(target) => target,
            Acquired::Unavailable => {
                debug!("No presentation target available, skipping frame");
                return Ok(FrameOutcome::Skipped(SkipReason::TargetUnavailable));
            }
            Acquired::Stale => return self.rebuild_stale_target(),
        };

        self.transition(FrameState::Recording);
        let mut cb = match self.backend.create_command_buffer() {
            Ok(cb) => cb,
            Err(e) => return self.abandon_frame(target, None, e),
        };
        if let Err(e) = self.encode(&mut cb, &target) {
            return self.abandon_frame(target, Some(cb), e);
        }
        if let Err(e) = self.backend.submit_command_buffer(cb, &target) {
            return self.abandon_frame(target, None, e);
        }
        self.transition(FrameState::Submitted);
        self.frame_index += 1;

        match self.backend.present(target)? {
            PresentStatus::Presented => {
                self.transition(FrameState::Presented);
                self.transition(FrameState::Ready);
                Ok(FrameOutcome::Presented)
            }
            PresentStatus::Stale => {
                self.transition(FrameState::Ready);
                self.rebuild_stale_target()
            }
        }
    }
}

impl<B: GpuBackend> Renderer for FrameDriver<B> {
    fn backend(&self) -> BackendKind {
        B::KIND
    }

    fn state(&self) -> FrameState {
        self.state
    }

    fn initialize(&mut self, window: &Window) -> Result<()> {
        match self.state {
            FrameState::Uninitialized | FrameState::Cleaned => {}
            FrameState::Lost => {
                return Err(Error::Usage(
                    "renderer lost its device; cleanup before initializing again".into(),
                ));
            }
            _ => return Ok(()),
        }

        let Some(surface) = window.native_handle() else {
            return Err(Error::BackendInit(
                "window has no native surface to present to".into(),
            ));
        };
        let extent = Extent2D::new(window.width(), window.height());

        match self.backend.acquire_resources(&surface, extent) {
            Ok(device) => {
                info!(
                    backend = %B::KIND,
                    device = %device.name,
                    tile_based = device.tile_based,
                    width = extent.width,
                    height = extent.height,
                    "Renderer initialized"
                );
                self.extent = extent;
                self.pending_resize = None;
                self.transition(FrameState::Ready);
                Ok(())
            }
            Err(e) => {
                warn!(backend = %B::KIND, "Renderer initialization failed: {}", e);
                self.backend.release_resources();
                Err(match e {
                    Error::BackendInit(_) => e,
                    other => Error::BackendInit(other.to_string()),
                })
            }
        }
    }

    fn render(&mut self) -> Result<FrameOutcome> {
        match self.state {
            FrameState::Ready => {}
            FrameState::Lost => {
                return Err(Error::DeviceLost(
                    "renderer cannot draw after device loss".into(),
                ));
            }
            _ => return Ok(FrameOutcome::NotReady),
        }

        let result = match self.run_frame() {
            Err(Error::PresentationTargetStale) => {
                if self.state != FrameState::Ready {
                    self.transition(FrameState::Ready);
                }
                self.rebuild_stale_target()
            }
            other => other,
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_fatal() => {
                error!(backend = %B::KIND, "Fatal error during frame: {}", e);
                self.transition(FrameState::Lost);
                Err(e)
            }
            Err(e) => {
                warn!(backend = %B::KIND, "Frame aborted: {}", e);
                if self.state != FrameState::Ready {
                    self.transition(FrameState::Ready);
                }
                Err(e)
            }
        }
    }

    fn notify_resize(&mut self, width: u32, height: u32) {
        self.pending_resize = Some(Extent2D::new(width, height));
    }

    fn cleanup(&mut self) -> Result<()> {
        if !self.state.holds_resources() {
            return Ok(());
        }

        let waited = self.backend.wait_idle(self.idle_timeout);
        if let Err(e) = &waited {
            error!(backend = %B::KIND, "Idle wait failed during cleanup: {}", e);
        }
        self.backend.release_resources();
        self.pending_resize = None;
        self.transition(FrameState::Cleaned);
        info!(backend = %B::KIND, "Renderer cleaned up");
        waited
    }
}

impl<B: GpuBackend> Drop for FrameDriver<B> {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            error!("Renderer cleanup on drop failed: {}", e);
        }
    }
}
