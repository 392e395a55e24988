//! Metal-style backend adapter.
//!
//! Work is ordered on a single queue and command buffers release themselves
//! once they complete, so the adapter keeps no per-frame sync objects. It
//! only remembers the buffers it committed, bounded to
//! [`MAX_FRAMES_IN_FLIGHT`], to throttle the CPU and to drain on cleanup.

use std::collections::VecDeque;
use std::time::Duration;

use forge_core::{Error, RendererConfig, Result};
use forge_platform::SurfaceHandle;
use forge_rhi::RhiError;
use forge_rhi::command::CommandList;
use forge_rhi::handle::{CommandBufferId, DrawableId, LayerId, QueueId};
use forge_rhi::metal::MetalDriver;
use forge_rhi::sync::MAX_FRAMES_IN_FLIGHT;
use forge_rhi::types::{DeviceInfo, Extent2D, Rect2D, Viewport};
use tracing::{debug, info};

use crate::backend::{Acquired, CommandBufferLifetime, GpuBackend, PresentStatus};
use crate::select::BackendKind;

/// A one-shot command buffer and the commands encoded into it.
#[derive(Debug)]
pub struct MetalCommandBuffer {
    handle: CommandBufferId,
    commands: CommandList,
}

/// The drawable a frame renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetalTarget(DrawableId);

/// Metal-style implementation of the frame stages.
#[derive(Debug)]
pub struct MetalBackend<D: MetalDriver> {
    driver: D,
    config: RendererConfig,
    device: Option<DeviceInfo>,
    queue: Option<QueueId>,
    layer: Option<LayerId>,
    extent: Extent2D,
    in_flight: VecDeque<CommandBufferId>,
}

impl<D: MetalDriver> MetalBackend<D> {
    pub fn new(driver: D, config: RendererConfig) -> Self {
        Self {
            driver,
            config,
            device: None,
            queue: None,
            layer: None,
            extent: Extent2D::default(),
            in_flight: VecDeque::with_capacity(MAX_FRAMES_IN_FLIGHT),
        }
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    /// Committed buffers not yet known to be complete.
    pub fn frames_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn queue(&self) -> Result<QueueId> {
        self.queue
            .ok_or_else(|| Error::Render("Metal command queue not created".into()))
    }

    fn layer(&self) -> Result<LayerId> {
        self.layer
            .ok_or_else(|| Error::Render("Metal layer not attached".into()))
    }

    /// Block until fewer than `MAX_FRAMES_IN_FLIGHT` buffers are outstanding.
    fn throttle(&mut self) -> Result<()> {
        while self.in_flight.len() >= MAX_FRAMES_IN_FLIGHT {
            if let Some(oldest) = self.in_flight.pop_front() {
                self.driver
                    .wait_until_completed(oldest, self.config.acquire_timeout)?;
            }
        }
        Ok(())
    }
}

impl<D: MetalDriver> GpuBackend for MetalBackend<D> {
    type CommandBuffer = MetalCommandBuffer;
    type Target = MetalTarget;

    const KIND: BackendKind = BackendKind::Metal;
    const COMMAND_BUFFER_LIFETIME: CommandBufferLifetime = CommandBufferLifetime::SelfReleasing;

    fn acquire_resources(
        &mut self,
        surface: &SurfaceHandle,
        extent: Extent2D,
    ) -> Result<DeviceInfo> {
        let device = self.driver.create_system_default_device()?;
        self.device = Some(device.clone());
        self.queue = Some(self.driver.new_command_queue()?);
        self.layer = Some(self.driver.attach_layer(surface, extent)?);
        self.extent = extent;
        info!(device = %device.name, "Metal device, queue and layer ready");
        Ok(device)
    }

    fn acquire_target(&mut self) -> Result<Acquired<MetalTarget>> {
        if self.extent.is_empty() {
            return Ok(Acquired::Unavailable);
        }
        self.throttle()?;
        let layer = self.layer()?;
        match self.driver.next_drawable(layer) {
            Ok(Some(drawable)) => Ok(Acquired::Target(MetalTarget(drawable))),
            Ok(None) => Ok(Acquired::Unavailable),
            Err(RhiError::OutOfDate) => Ok(Acquired::Stale),
            Err(e) => Err(e.into()),
        }
    }

    fn create_command_buffer(&mut self) -> Result<MetalCommandBuffer> {
        let queue = self.queue()?;
        let handle = self.driver.command_buffer(queue)?;
        Ok(MetalCommandBuffer {
            handle,
            commands: CommandList::new(),
        })
    }

    fn begin_frame(&mut self, cb: &mut MetalCommandBuffer, target: &MetalTarget) -> Result<()> {
        let commands = &mut cb.commands;
        commands.begin()?;
        commands.begin_pass(target.0.as_raw(), self.extent, self.config.clear_color)?;
        commands.set_viewport(Viewport::full(self.extent))?;
        commands.set_scissor(Rect2D::full(self.extent))?;
        Ok(())
    }

    fn record_draws(&mut self, cb: &mut MetalCommandBuffer) -> Result<()> {
        cb.commands.draw(3, 1, 0, 0)?;
        Ok(())
    }

    fn end_frame(&mut self, cb: &mut MetalCommandBuffer) -> Result<()> {
        cb.commands.end_pass()?;
        cb.commands.end()?;
        Ok(())
    }

    fn submit_command_buffer(&mut self, cb: MetalCommandBuffer, target: &MetalTarget) -> Result<()> {
        // Presentation is scheduled on the buffer, so it must precede commit.
        let committed = self
            .driver
            .present_drawable(cb.handle, target.0)
            .and_then(|()| self.driver.commit(cb.handle, &cb.commands));
        if let Err(e) = committed {
            self.driver.discard_command_buffer(cb.handle);
            return Err(e.into());
        }
        self.in_flight.push_back(cb.handle);
        Ok(())
    }

    fn present(&mut self, target: MetalTarget) -> Result<PresentStatus> {
        debug!(drawable = target.0.as_raw(), "Drawable presented on completion");
        Ok(PresentStatus::Presented)
    }

    fn abort_frame(&mut self, target: MetalTarget, cb: Option<MetalCommandBuffer>) -> Result<()> {
        if let Some(cb) = cb {
            self.driver.discard_command_buffer(cb.handle);
        }
        self.driver.discard_drawable(target.0);
        debug!(drawable = target.0.as_raw(), "Drawable returned unpresented");
        Ok(())
    }

    fn handle_resize(&mut self, extent: Extent2D) -> Result<()> {
        let layer = self.layer()?;
        self.driver.resize_layer(layer, extent)?;
        self.extent = extent;
        debug!(
            width = extent.width,
            height = extent.height,
            "Metal layer resized"
        );
        Ok(())
    }

    fn wait_idle(&mut self, timeout: Duration) -> Result<()> {
        let mut result = Ok(());
        for buffer in self.in_flight.drain(..) {
            if let Err(e) = self.driver.wait_until_completed(buffer, timeout)
                && result.is_ok()
            {
                result = Err(e.into());
            }
        }
        result
    }

    fn release_resources(&mut self) {
        self.in_flight.clear();
        if let Some(layer) = self.layer.take() {
            self.driver.release_layer(layer);
        }
        if let Some(queue) = self.queue.take() {
            self.driver.release_queue(queue);
        }
        if self.device.take().is_some() {
            self.driver.release_device();
        }
        self.extent = Extent2D::default();
    }
}
