//! Driver seam for explicit-sync, swapchain-based graphics APIs (Vulkan-style).
//!
//! Every object is created and destroyed explicitly. The caller is
//! responsible for fences, semaphores and swapchain recreation.

use std::time::Duration;

use forge_platform::SurfaceHandle;

use crate::command::CommandList;
use crate::error::RhiResult;
use crate::handle::{CommandBufferId, CommandPoolId, FenceId, SemaphoreId, SurfaceId, SwapchainId};
use crate::types::{DeviceInfo, Extent2D};

/// A created swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainInfo {
    pub handle: SwapchainId,
    pub extent: Extent2D,
    pub image_count: u32,
}

/// Result of a successful image acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    pub index: u32,
    /// The swapchain still works but no longer matches the surface exactly.
    pub suboptimal: bool,
}

/// One queue submission.
#[derive(Debug, Clone, Copy)]
pub struct SubmitInfo<'a> {
    pub command_buffer: CommandBufferId,
    pub commands: &'a CommandList,
    /// Waited on before color output.
    pub wait: SemaphoreId,
    /// Signaled when rendering finishes.
    pub signal: SemaphoreId,
    /// Signaled when the submission completes on the GPU.
    pub fence: FenceId,
}

/// Operations a Vulkan-style backend needs from its driver.
///
/// A driver value represents one instance and at most one logical device.
pub trait VulkanDriver {
    fn create_instance(&mut self, app_name: &str, enable_validation: bool) -> RhiResult<()>;

    fn create_surface(&mut self, surface: &SurfaceHandle) -> RhiResult<SurfaceId>;

    /// Pick a physical device that can present to `surface` and open it.
    fn create_device(&mut self, surface: SurfaceId) -> RhiResult<DeviceInfo>;

    /// Create a swapchain. `old` is retired by the driver once replaced.
    fn create_swapchain(
        &mut self,
        surface: SurfaceId,
        extent: Extent2D,
        old: Option<SwapchainId>,
    ) -> RhiResult<SwapchainInfo>;

    fn destroy_swapchain(&mut self, swapchain: SwapchainId);

    fn create_command_pool(&mut self) -> RhiResult<CommandPoolId>;

    fn allocate_command_buffer(&mut self, pool: CommandPoolId) -> RhiResult<CommandBufferId>;

    fn reset_command_buffer(&mut self, buffer: CommandBufferId) -> RhiResult<()>;

    /// Destroy a pool together with every buffer allocated from it.
    fn destroy_command_pool(&mut self, pool: CommandPoolId);

    fn create_semaphore(&mut self) -> RhiResult<SemaphoreId>;

    fn destroy_semaphore(&mut self, semaphore: SemaphoreId);

    fn create_fence(&mut self, signaled: bool) -> RhiResult<FenceId>;

    fn wait_for_fence(&mut self, fence: FenceId, timeout: Duration) -> RhiResult<()>;

    fn reset_fence(&mut self, fence: FenceId) -> RhiResult<()>;

    fn destroy_fence(&mut self, fence: FenceId);

    /// Acquire the next presentable image, signaling `signal` when it is ready.
    ///
    /// Returns [`RhiError::OutOfDate`](crate::RhiError::OutOfDate) when the
    /// swapchain must be recreated.
    fn acquire_next_image(
        &mut self,
        swapchain: SwapchainId,
        signal: SemaphoreId,
        timeout: Duration,
    ) -> RhiResult<AcquiredImage>;

    fn queue_submit(&mut self, submit: &SubmitInfo<'_>) -> RhiResult<()>;

    /// Queue an image for presentation. `Ok(true)` means suboptimal.
    fn queue_present(
        &mut self,
        swapchain: SwapchainId,
        image_index: u32,
        wait: SemaphoreId,
    ) -> RhiResult<bool>;

    /// Wait for all queued work to finish, up to `timeout`.
    fn device_wait_idle(&mut self, timeout: Duration) -> RhiResult<()>;

    fn destroy_device(&mut self);

    fn destroy_surface(&mut self, surface: SurfaceId);

    fn destroy_instance(&mut self);
}
