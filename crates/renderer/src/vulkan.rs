//! Vulkan-style backend adapter.
//!
//! Each frame slot owns a pooled command buffer, an image-available
//! semaphore and an in-flight fence. Render-finished semaphores belong to
//! swapchain images, since presentation of an image may still be waiting on
//! them when the slot comes around again.
//!
//! # Resource Destruction Order
//!
//! 1. Frame slot sync objects
//! 2. Per-image semaphores
//! 3. Command pool (frees its buffers)
//! 4. Swapchain
//! 5. Device
//! 6. Surface
//! 7. Instance

use std::time::Duration;

use forge_core::{Error, RendererConfig, Result};
use forge_platform::SurfaceHandle;
use forge_rhi::RhiError;
use forge_rhi::command::CommandList;
use forge_rhi::handle::{CommandBufferId, CommandPoolId, SemaphoreId, SurfaceId};
use forge_rhi::sync::{FrameSync, MAX_FRAMES_IN_FLIGHT};
use forge_rhi::types::{DeviceInfo, Extent2D, Rect2D, Viewport};
use forge_rhi::vulkan::{SubmitInfo, SwapchainInfo, VulkanDriver};
use tracing::{debug, info};

use crate::backend::{Acquired, CommandBufferLifetime, GpuBackend, PresentStatus};
use crate::frame::FrameRing;
use crate::select::BackendKind;

/// Resources owned by one frame in flight.
#[derive(Debug, Clone, Copy)]
struct FrameSlot {
    sync: FrameSync,
    command_buffer: CommandBufferId,
}

/// A pooled command buffer and the commands recorded into it.
#[derive(Debug)]
pub struct VulkanCommandBuffer {
    handle: CommandBufferId,
    commands: CommandList,
}

/// An acquired swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainImage {
    index: u32,
}

impl SwapchainImage {
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Vulkan-style implementation of the frame stages.
#[derive(Debug)]
pub struct VulkanBackend<D: VulkanDriver> {
    driver: D,
    config: RendererConfig,
    instance: bool,
    surface: Option<SurfaceId>,
    device: Option<DeviceInfo>,
    swapchain: Option<SwapchainInfo>,
    command_pool: Option<CommandPoolId>,
    render_finished: Vec<SemaphoreId>,
    frames: FrameRing<FrameSlot>,
    extent: Extent2D,
    /// Set when presentation reported a suboptimal swapchain.
    needs_rebuild: bool,
}

impl<D: VulkanDriver> VulkanBackend<D> {
    pub fn new(driver: D, config: RendererConfig) -> Self {
        Self {
            driver,
            config,
            instance: false,
            surface: None,
            device: None,
            swapchain: None,
            command_pool: None,
            render_finished: Vec::new(),
            frames: FrameRing::new(),
            extent: Extent2D::default(),
            needs_rebuild: false,
        }
    }

    pub fn swapchain(&self) -> Option<&SwapchainInfo> {
        self.swapchain.as_ref()
    }

    /// Index of the frame slot the next frame will use.
    pub fn current_frame(&self) -> usize {
        self.frames.current_index()
    }

    fn swapchain_info(&self) -> Result<SwapchainInfo> {
        self.swapchain
            .ok_or_else(|| Error::Render("Vulkan swapchain not created".into()))
    }

    fn slot(&self) -> Result<FrameSlot> {
        self.frames
            .current()
            .copied()
            .ok_or_else(|| Error::Render("Vulkan frame slots not created".into()))
    }

    fn create_frame_slots(&mut self, pool: CommandPoolId) -> Result<()> {
        for i in 0..MAX_FRAMES_IN_FLIGHT {
            let command_buffer = self.driver.allocate_command_buffer(pool)?;
            let sync = FrameSync::create(&mut self.driver)?;
            self.frames.push(FrameSlot {
                sync,
                command_buffer,
            });
            debug!("Created frame slot {}", i);
        }
        Ok(())
    }

    /// Replace per-image semaphores to match the current swapchain.
    fn recreate_image_semaphores(&mut self, image_count: u32) -> Result<()> {
        for semaphore in self.render_finished.drain(..) {
            self.driver.destroy_semaphore(semaphore);
        }
        for _ in 0..image_count {
            let semaphore = self.driver.create_semaphore()?;
            self.render_finished.push(semaphore);
        }
        Ok(())
    }

    fn render_finished(&self, image: u32) -> Result<SemaphoreId> {
        self.render_finished
            .get(image as usize)
            .copied()
            .ok_or_else(|| Error::Render(format!("no semaphore for swapchain image {image}")))
    }

    fn recreate_swapchain(&mut self, extent: Extent2D) -> Result<()> {
        let surface = self
            .surface
            .ok_or_else(|| Error::Render("Vulkan surface not created".into()))?;
        let old = self.swapchain_info()?;

        self.driver.device_wait_idle(self.config.idle_timeout)?;
        let new = self
            .driver
            .create_swapchain(surface, extent, Some(old.handle))?;
        self.driver.destroy_swapchain(old.handle);
        self.swapchain = Some(new);
        self.recreate_image_semaphores(new.image_count)?;
        self.needs_rebuild = false;

        info!(
            width = extent.width,
            height = extent.height,
            images = new.image_count,
            "Swapchain recreated"
        );
        Ok(())
    }
}

impl<D: VulkanDriver> GpuBackend for VulkanBackend<D> {
    type CommandBuffer = VulkanCommandBuffer;
    type Target = SwapchainImage;

    const KIND: BackendKind = BackendKind::Vulkan;
    const COMMAND_BUFFER_LIFETIME: CommandBufferLifetime = CommandBufferLifetime::Pooled;

    fn acquire_resources(
        &mut self,
        surface: &SurfaceHandle,
        extent: Extent2D,
    ) -> Result<DeviceInfo> {
        self.driver
            .create_instance(&self.config.app_name, self.config.enable_validation)?;
        self.instance = true;

        let surface = self.driver.create_surface(surface)?;
        self.surface = Some(surface);

        let device = self.driver.create_device(surface)?;
        self.device = Some(device.clone());

        let swapchain = self.driver.create_swapchain(surface, extent, None)?;
        self.swapchain = Some(swapchain);
        self.extent = extent;

        let pool = self.driver.create_command_pool()?;
        self.command_pool = Some(pool);

        self.recreate_image_semaphores(swapchain.image_count)?;
        self.create_frame_slots(pool)?;

        info!(
            device = %device.name,
            images = swapchain.image_count,
            frames_in_flight = MAX_FRAMES_IN_FLIGHT,
            "Vulkan device and swapchain ready"
        );
        Ok(device)
    }

    fn acquire_target(&mut self) -> Result<Acquired<SwapchainImage>> {
        if self.extent.is_empty() {
            return Ok(Acquired::Unavailable);
        }
        if self.needs_rebuild {
            return Ok(Acquired::Stale);
        }

        let slot = self.slot()?;
        let swapchain = self.swapchain_info()?;
        self.driver
            .wait_for_fence(slot.sync.in_flight(), self.config.acquire_timeout)?;

        match self.driver.acquire_next_image(
            swapchain.handle,
            slot.sync.image_available(),
            self.config.acquire_timeout,
        ) {
            Ok(image) => {
                if image.suboptimal {
                    self.needs_rebuild = true;
                }
                Ok(Acquired::Target(SwapchainImage { index: image.index }))
            }
            Err(RhiError::OutOfDate) => Ok(Acquired::Stale),
            Err(RhiError::Timeout { .. }) => Ok(Acquired::Unavailable),
            Err(e) => Err(e.into()),
        }
    }

    fn create_command_buffer(&mut self) -> Result<VulkanCommandBuffer> {
        let slot = self.slot()?;
        self.driver.reset_command_buffer(slot.command_buffer)?;
        Ok(VulkanCommandBuffer {
            handle: slot.command_buffer,
            commands: CommandList::new(),
        })
    }

    fn begin_frame(&mut self, cb: &mut VulkanCommandBuffer, target: &SwapchainImage) -> Result<()> {
        let commands = &mut cb.commands;
        commands.begin()?;
        commands.begin_pass(target.index as u64, self.extent, self.config.clear_color)?;
        commands.set_viewport(Viewport::full(self.extent))?;
        commands.set_scissor(Rect2D::full(self.extent))?;
        Ok(())
    }

    fn record_draws(&mut self, cb: &mut VulkanCommandBuffer) -> Result<()> {
        cb.commands.draw(3, 1, 0, 0)?;
        Ok(())
    }

    fn end_frame(&mut self, cb: &mut VulkanCommandBuffer) -> Result<()> {
        cb.commands.end_pass()?;
        cb.commands.end()?;
        Ok(())
    }

    fn submit_command_buffer(&mut self, cb: VulkanCommandBuffer, target: &SwapchainImage) -> Result<()> {
        let slot = self.slot()?;
        let signal = self.render_finished(target.index)?;

        // The fence must be unsignaled at submit; a rejected submit leaves it
        // reset, which abort_frame repairs.
        self.driver.reset_fence(slot.sync.in_flight())?;
        self.driver.queue_submit(&SubmitInfo {
            command_buffer: cb.handle,
            commands: &cb.commands,
            wait: slot.sync.image_available(),
            signal,
            fence: slot.sync.in_flight(),
        })?;
        Ok(())
    }

    fn present(&mut self, target: SwapchainImage) -> Result<PresentStatus> {
        let swapchain = self.swapchain_info()?;
        let wait = self.render_finished(target.index)?;
        let result = self
            .driver
            .queue_present(swapchain.handle, target.index, wait);
        self.frames.advance();

        match result {
            Ok(suboptimal) => {
                if suboptimal {
                    debug!("Present returned suboptimal");
                    self.needs_rebuild = true;
                }
                Ok(PresentStatus::Presented)
            }
            Err(RhiError::OutOfDate) => {
                debug!("Present returned out of date");
                Ok(PresentStatus::Stale)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn abort_frame(&mut self, target: SwapchainImage, _cb: Option<VulkanCommandBuffer>) -> Result<()> {
        debug!(image = target.index, "Abandoning frame");
        // An acquired image can only be returned by presenting it, so the
        // swapchain is retired instead. This also renews per-image semaphores.
        let rebuilt = self.handle_resize(self.extent);
        if rebuilt.is_err() {
            self.needs_rebuild = true;
        }

        // The slot's semaphore may still be signaled by the acquire and its
        // fence may be reset without pending work; replace both.
        let fresh = FrameSync::create(&mut self.driver)?;
        if let Some(slot) = self.frames.current_mut() {
            let stale = std::mem::replace(&mut slot.sync, fresh);
            stale.destroy(&mut self.driver);
        } else {
            fresh.destroy(&mut self.driver);
        }
        rebuilt
    }

    fn handle_resize(&mut self, extent: Extent2D) -> Result<()> {
        self.extent = extent;
        if extent.is_empty() {
            // Swapchains cannot have a zero extent; keep the old one until
            // the surface is visible again.
            self.needs_rebuild = true;
            return Ok(());
        }
        self.recreate_swapchain(extent)
    }

    fn wait_idle(&mut self, timeout: Duration) -> Result<()> {
        if self.device.is_none() {
            return Ok(());
        }
        self.driver.device_wait_idle(timeout)?;
        Ok(())
    }

    fn release_resources(&mut self) {
        for slot in self.frames.drain() {
            slot.sync.destroy(&mut self.driver);
        }
        for semaphore in self.render_finished.drain(..) {
            self.driver.destroy_semaphore(semaphore);
        }
        if let Some(pool) = self.command_pool.take() {
            self.driver.destroy_command_pool(pool);
        }
        if let Some(swapchain) = self.swapchain.take() {
            self.driver.destroy_swapchain(swapchain.handle);
        }
        if self.device.take().is_some() {
            self.driver.destroy_device();
        }
        if let Some(surface) = self.surface.take() {
            self.driver.destroy_surface(surface);
        }
        if std::mem::take(&mut self.instance) {
            self.driver.destroy_instance();
        }
        self.extent = Extent2D::default();
        self.needs_rebuild = false;
    }
}

#[cfg(test)]
mod tests {
    use forge_rhi::soft::{FaultPlan, SoftGpu, SoftVulkan};

    use super::*;

    fn backend(gpu: &SoftGpu) -> VulkanBackend<SoftVulkan> {
        VulkanBackend::new(gpu.vulkan_driver(), RendererConfig::default())
    }

    fn surface() -> SurfaceHandle {
        SurfaceHandle::Headless { id: 3 }
    }

    fn frame(backend: &mut VulkanBackend<SoftVulkan>) -> Result<PresentStatus> {
        let Acquired::Target(image) = backend.acquire_target()? else {
            return Err(Error::Render("no target".into()));
        };
        let mut cb = backend.create_command_buffer()?;
        backend.begin_frame(&mut cb, &image)?;
        backend.record_draws(&mut cb)?;
        backend.end_frame(&mut cb)?;
        backend.submit_command_buffer(cb, &image)?;
        backend.present(image)
    }

    #[test]
    fn test_frames_cycle_slots() {
        let gpu = SoftGpu::new();
        let probe = gpu.probe();
        let mut backend = backend(&gpu);
        backend
            .acquire_resources(&surface(), Extent2D::new(320, 240))
            .unwrap();

        for i in 0..6 {
            assert_eq!(backend.current_frame(), i % MAX_FRAMES_IN_FLIGHT);
            assert_eq!(frame(&mut backend).unwrap(), PresentStatus::Presented);
        }
        assert_eq!(probe.submissions(), 6);
        assert_eq!(probe.presents(), 6);
        assert_eq!(probe.live_of_kind("fence"), MAX_FRAMES_IN_FLIGHT);
    }

    #[test]
    fn test_stale_acquire_then_recreate() {
        let gpu = SoftGpu::with_faults(FaultPlan::new().stale_target_on_acquire(1));
        let probe = gpu.probe();
        let mut backend = backend(&gpu);
        backend
            .acquire_resources(&surface(), Extent2D::new(320, 240))
            .unwrap();

        frame(&mut backend).unwrap();
        assert!(matches!(backend.acquire_target(), Ok(Acquired::Stale)));
        backend.handle_resize(Extent2D::new(320, 240)).unwrap();
        assert_eq!(probe.surface_rebuilds(), 1);
        assert_eq!(probe.live_of_kind("swapchain"), 1);
        assert_eq!(frame(&mut backend).unwrap(), PresentStatus::Presented);
    }

    #[test]
    fn test_stale_present_reported() {
        let gpu = SoftGpu::with_faults(FaultPlan::new().stale_target_on_present(0));
        let mut backend = backend(&gpu);
        backend
            .acquire_resources(&surface(), Extent2D::new(64, 64))
            .unwrap();
        assert_eq!(frame(&mut backend).unwrap(), PresentStatus::Stale);
        backend.handle_resize(Extent2D::new(64, 64)).unwrap();
        assert_eq!(frame(&mut backend).unwrap(), PresentStatus::Presented);
    }

    #[test]
    fn test_zero_extent_keeps_swapchain() {
        let gpu = SoftGpu::new();
        let probe = gpu.probe();
        let mut backend = backend(&gpu);
        backend
            .acquire_resources(&surface(), Extent2D::new(64, 64))
            .unwrap();
        backend.handle_resize(Extent2D::new(0, 0)).unwrap();
        assert!(matches!(backend.acquire_target(), Ok(Acquired::Unavailable)));
        assert_eq!(probe.surface_rebuilds(), 0);

        backend.handle_resize(Extent2D::new(80, 60)).unwrap();
        assert_eq!(probe.surface_rebuilds(), 1);
        assert_eq!(frame(&mut backend).unwrap(), PresentStatus::Presented);
    }

    #[test]
    fn test_release_is_reverse_order_and_complete() {
        let gpu = SoftGpu::new();
        let probe = gpu.probe();
        let mut backend = backend(&gpu);
        backend
            .acquire_resources(&surface(), Extent2D::new(64, 64))
            .unwrap();
        frame(&mut backend).unwrap();
        backend.wait_idle(Duration::from_millis(5)).unwrap();
        backend.release_resources();
        backend.release_resources();

        assert_eq!(probe.live_objects(), 0);
        assert_eq!(probe.order_violations(), 0);
        assert_eq!(probe.invalid_releases(), 0);
    }

    #[test]
    fn test_device_failure_leaves_nothing_behind() {
        let gpu = SoftGpu::with_faults(FaultPlan::new().device_creation_fails());
        let probe = gpu.probe();
        let mut backend = backend(&gpu);
        assert!(matches!(
            backend.acquire_resources(&surface(), Extent2D::new(64, 64)),
            Err(Error::BackendInit(_))
        ));
        backend.release_resources();
        assert_eq!(probe.live_objects(), 0);
        assert_eq!(probe.order_violations(), 0);
    }

    #[test]
    fn test_abort_after_rejected_submit_restores_slot() {
        let gpu = SoftGpu::with_faults(FaultPlan::new().submit_fails_on(0));
        let probe = gpu.probe();
        let mut backend = backend(&gpu);
        backend
            .acquire_resources(&surface(), Extent2D::new(64, 64))
            .unwrap();

        let Acquired::Target(image) = backend.acquire_target().unwrap() else {
            panic!("expected a swapchain image");
        };
        let mut cb = backend.create_command_buffer().unwrap();
        backend.begin_frame(&mut cb, &image).unwrap();
        backend.record_draws(&mut cb).unwrap();
        backend.end_frame(&mut cb).unwrap();
        assert!(backend.submit_command_buffer(cb, &image).is_err());

        let slot = backend.current_frame();
        backend.abort_frame(image, None).unwrap();
        assert_eq!(backend.current_frame(), slot);
        assert_eq!(probe.surface_rebuilds(), 1);
        assert_eq!(probe.live_of_kind("fence"), MAX_FRAMES_IN_FLIGHT);

        assert_eq!(frame(&mut backend).unwrap(), PresentStatus::Presented);
        backend.release_resources();
        assert_eq!(probe.live_objects(), 0);
        assert_eq!(probe.invalid_releases(), 0);
    }
}
