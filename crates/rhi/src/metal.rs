//! Driver seam for implicit-sync, layer-based graphics APIs (Metal-style).
//!
//! The device keeps work ordered on a single command queue. Command buffers
//! are one-shot and released by the driver once they complete, and the
//! presentation layer vends drawables on demand.

use std::time::Duration;

use forge_platform::SurfaceHandle;

use crate::command::CommandList;
use crate::error::RhiResult;
use crate::handle::{CommandBufferId, DrawableId, LayerId, QueueId};
use crate::types::{DeviceInfo, Extent2D};

/// Operations a Metal-style backend needs from its driver.
pub trait MetalDriver {
    /// Open the system default device.
    fn create_system_default_device(&mut self) -> RhiResult<DeviceInfo>;

    fn new_command_queue(&mut self) -> RhiResult<QueueId>;

    /// Attach a presentation layer to the window behind `surface`.
    fn attach_layer(&mut self, surface: &SurfaceHandle, extent: Extent2D) -> RhiResult<LayerId>;

    /// Change the drawable size of a layer.
    fn resize_layer(&mut self, layer: LayerId, extent: Extent2D) -> RhiResult<()>;

    /// Ask the layer for its next drawable.
    ///
    /// `Ok(None)` means none is available right now; the caller should skip
    /// the frame rather than block.
    fn next_drawable(&mut self, layer: LayerId) -> RhiResult<Option<DrawableId>>;

    /// A fresh one-shot command buffer on `queue`.
    fn command_buffer(&mut self, queue: QueueId) -> RhiResult<CommandBufferId>;

    /// Schedule `drawable` to be shown once `buffer` completes.
    fn present_drawable(&mut self, buffer: CommandBufferId, drawable: DrawableId) -> RhiResult<()>;

    /// Commit a recorded buffer for execution.
    fn commit(&mut self, buffer: CommandBufferId, commands: &CommandList) -> RhiResult<()>;

    /// Block until `buffer` has completed, up to `timeout`.
    fn wait_until_completed(&mut self, buffer: CommandBufferId, timeout: Duration)
    -> RhiResult<()>;

    /// Drop a command buffer that was never committed.
    fn discard_command_buffer(&mut self, buffer: CommandBufferId);

    /// Return a drawable that will not be presented.
    fn discard_drawable(&mut self, drawable: DrawableId);

    fn release_layer(&mut self, layer: LayerId);

    fn release_queue(&mut self, queue: QueueId);

    fn release_device(&mut self);
}
