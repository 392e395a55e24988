//! Per-frame synchronization for explicit-sync drivers.

use tracing::debug;

use crate::error::RhiResult;
use crate::handle::{FenceId, SemaphoreId};
use crate::vulkan::VulkanDriver;

/// Maximum number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Synchronization objects owned by one frame slot.
///
/// `image_available` is signaled when the acquired image is ready to be
/// rendered into. `in_flight` is signaled when the slot's submission has
/// finished executing. The fence is created signaled so the first wait on a
/// fresh slot returns immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSync {
    image_available: SemaphoreId,
    in_flight: FenceId,
}

impl FrameSync {
    /// Create the objects for one frame slot.
    ///
    /// On failure nothing created by this call is left alive.
    pub fn create<D: VulkanDriver + ?Sized>(driver: &mut D) -> RhiResult<Self> {
        let image_available = driver.create_semaphore()?;
        let in_flight = match driver.create_fence(true) {
            Ok(fence) => fence,
            Err(e) => {
                driver.destroy_semaphore(image_available);
                return Err(e);
            }
        };
        debug!(?image_available, ?in_flight, "Created frame sync objects");
        Ok(Self {
            image_available,
            in_flight,
        })
    }

    pub fn image_available(&self) -> SemaphoreId {
        self.image_available
    }

    pub fn in_flight(&self) -> FenceId {
        self.in_flight
    }

    /// Destroy both objects. The slot must be idle.
    pub fn destroy<D: VulkanDriver + ?Sized>(self, driver: &mut D) {
        driver.destroy_fence(self.in_flight);
        driver.destroy_semaphore(self.image_available);
    }
}
