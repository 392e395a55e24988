//! Backend-internal decomposition of a frame.
//!
//! [`FrameDriver`](crate::FrameDriver) sequences these stages; each backend
//! only implements them. Resource models differ freely behind the associated
//! types.

use std::time::Duration;

use forge_core::Result;
use forge_platform::SurfaceHandle;
use forge_rhi::types::{DeviceInfo, Extent2D};

use crate::select::BackendKind;

/// How a backend's command buffers are reclaimed after submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferLifetime {
    /// The driver releases a buffer once it completes; it is never reused.
    SelfReleasing,
    /// Buffers live in a pool and are reset for reuse once their fence signals.
    Pooled,
}

/// Result of asking for the next presentation target.
#[derive(Debug)]
pub enum Acquired<T> {
    Target(T),
    /// Nothing to render into right now.
    Unavailable,
    /// The target no longer matches the surface.
    Stale,
}

/// Result of presenting a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    /// The target no longer matches the surface.
    Stale,
}

/// One graphics API's implementation of the frame stages.
pub trait GpuBackend {
    /// Recorded work for one frame.
    type CommandBuffer;
    /// The presentable image being rendered into.
    type Target;

    const KIND: BackendKind;
    const COMMAND_BUFFER_LIFETIME: CommandBufferLifetime;

    /// Create device, queue, command storage and presentation surface.
    ///
    /// On error the driver calls [`release_resources`](Self::release_resources)
    /// to drop whatever was created.
    fn acquire_resources(&mut self, surface: &SurfaceHandle, extent: Extent2D)
    -> Result<DeviceInfo>;

    fn acquire_target(&mut self) -> Result<Acquired<Self::Target>>;

    fn create_command_buffer(&mut self) -> Result<Self::CommandBuffer>;

    /// Open a pass on `target` and set viewport and scissor.
    fn begin_frame(&mut self, cb: &mut Self::CommandBuffer, target: &Self::Target) -> Result<()>;

    fn record_draws(&mut self, cb: &mut Self::CommandBuffer) -> Result<()>;

    /// Close the pass and finish encoding.
    fn end_frame(&mut self, cb: &mut Self::CommandBuffer) -> Result<()>;

    fn submit_command_buffer(&mut self, cb: Self::CommandBuffer, target: &Self::Target)
    -> Result<()>;

    fn present(&mut self, target: Self::Target) -> Result<PresentStatus>;

    /// Give back a frame that failed between acquiring `target` and
    /// presenting it, so the next frame starts from clean sync state.
    ///
    /// `cb` is the command buffer if the failure left it with the caller.
    fn abort_frame(&mut self, target: Self::Target, cb: Option<Self::CommandBuffer>)
    -> Result<()>;

    /// Rebuild the presentation target for a new surface size.
    fn handle_resize(&mut self, extent: Extent2D) -> Result<()>;

    /// Wait for all submitted work, failing after `timeout`.
    fn wait_idle(&mut self, timeout: Duration) -> Result<()>;

    /// Release everything in reverse acquisition order. Must tolerate
    /// partially acquired state and repeated calls.
    fn release_resources(&mut self);
}
