//! The backend-independent renderer contract.

use forge_core::Result;
use forge_platform::Window;

use crate::select::BackendKind;
use crate::state::FrameState;

/// Why a frame was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No presentable target right now (zero-sized window, none free).
    TargetUnavailable,
    /// The target no longer matched the surface and has been rebuilt.
    TargetStale,
}

/// What one call to [`Renderer::render`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A full frame was submitted and presented.
    Presented,
    /// The frame was skipped; rendering can continue.
    Skipped(SkipReason),
    /// The renderer holds no GPU resources; nothing was done.
    NotReady,
}

/// A GPU backend as seen by the engine.
///
/// No fence, command buffer or target type crosses this boundary.
pub trait Renderer {
    /// Which backend family this renderer drives.
    fn backend(&self) -> BackendKind;

    fn state(&self) -> FrameState;

    /// Acquire device, queue and presentation surface for `window`.
    ///
    /// Idempotent once it has succeeded. After a failure nothing is held and
    /// the call may be retried.
    fn initialize(&mut self, window: &Window) -> Result<()>;

    /// Execute one full frame.
    ///
    /// A stale presentation target is recovered internally and reported as
    /// [`FrameOutcome::Skipped`]. Calling before `initialize` returns
    /// [`FrameOutcome::NotReady`].
    fn render(&mut self) -> Result<FrameOutcome>;

    /// Record a new surface size. Applied at the start of the next frame.
    fn notify_resize(&mut self, width: u32, height: u32);

    /// Wait for in-flight work (bounded) and release every GPU resource.
    ///
    /// Safe to call in any state and any number of times.
    fn cleanup(&mut self) -> Result<()>;
}
