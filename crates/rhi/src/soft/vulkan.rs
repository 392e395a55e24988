use std::collections::HashMap;
use std::time::Duration;

use forge_platform::SurfaceHandle;
use tracing::{debug, warn};

use super::{FaultPlan, Shared};
use crate::error::{RhiError, RhiResult};
use crate::handle::{CommandBufferId, CommandPoolId, FenceId, SemaphoreId, SurfaceId, SwapchainId};
use crate::types::{DeviceInfo, Extent2D};
use crate::vulkan::{AcquiredImage, SubmitInfo, SwapchainInfo, VulkanDriver};

const IMAGE_COUNT: u32 = 3;

#[derive(Debug)]
struct SoftSwapchain {
    acquired: Vec<bool>,
    next: usize,
}

/// Explicit-sync driver over a [`SoftGpu`](super::SoftGpu).
///
/// Submitted work completes immediately: fences and render semaphores are
/// signaled at submission time.
#[derive(Debug)]
pub struct SoftVulkan {
    faults: FaultPlan,
    state: Shared,
    instance: Option<u64>,
    device: Option<u64>,
    lost: bool,
    fences: HashMap<FenceId, bool>,
    semaphores: HashMap<SemaphoreId, bool>,
    swapchains: HashMap<SwapchainId, SoftSwapchain>,
    pools: HashMap<CommandPoolId, Vec<CommandBufferId>>,
    present_attempts: u64,
}

impl SoftVulkan {
    pub(super) fn new(faults: FaultPlan, state: Shared) -> Self {
        Self {
            faults,
            state,
            instance: None,
            device: None,
            lost: false,
            fences: HashMap::new(),
            semaphores: HashMap::new(),
            swapchains: HashMap::new(),
            pools: HashMap::new(),
            present_attempts: 0,
        }
    }

    fn require_instance(&self) -> RhiResult<()> {
        match self.instance {
            Some(_) => Ok(()),
            None => Err(RhiError::InvalidState("no instance".into())),
        }
    }

    fn require_device(&self) -> RhiResult<()> {
        if self.lost {
            return Err(RhiError::DeviceLost("soft device lost".into()));
        }
        match self.device {
            Some(_) => Ok(()),
            None => Err(RhiError::InvalidState("no device".into())),
        }
    }

    fn take_semaphore(&mut self, semaphore: SemaphoreId, what: &str) -> RhiResult<()> {
        match self.semaphores.get_mut(&semaphore) {
            Some(signaled) if *signaled => {
                *signaled = false;
                Ok(())
            }
            Some(_) => Err(RhiError::InvalidState(format!(
                "{what} waits on a semaphore that will never be signaled"
            ))),
            None => Err(RhiError::InvalidHandle(format!("{semaphore:?}"))),
        }
    }

    fn signal_semaphore(&mut self, semaphore: SemaphoreId) -> RhiResult<()> {
        match self.semaphores.get_mut(&semaphore) {
            Some(signaled) if !*signaled => {
                *signaled = true;
                Ok(())
            }
            Some(_) => Err(RhiError::InvalidState(format!(
                "{semaphore:?} is already signaled"
            ))),
            None => Err(RhiError::InvalidHandle(format!("{semaphore:?}"))),
        }
    }
}

impl VulkanDriver for SoftVulkan {
    fn create_instance(&mut self, app_name: &str, enable_validation: bool) -> RhiResult<()> {
        if self.faults.unavailable {
            return Err(RhiError::Unavailable("Vulkan loader not found".into()));
        }
        if self.instance.is_some() {
            return Err(RhiError::InvalidState("instance already created".into()));
        }
        self.instance = Some(self.state.borrow_mut().create("instance"));
        debug!(app_name, enable_validation, "Soft Vulkan instance created");
        Ok(())
    }

    fn create_surface(&mut self, _surface: &SurfaceHandle) -> RhiResult<SurfaceId> {
        self.require_instance()?;
        if self.faults.fail_surface {
            return Err(RhiError::SurfaceCreation("surface creation rejected".into()));
        }
        Ok(SurfaceId::from_raw(self.state.borrow_mut().create("surface")))
    }

    fn create_device(&mut self, surface: SurfaceId) -> RhiResult<DeviceInfo> {
        self.require_instance()?;
        if !self.state.borrow().is_live(surface.as_raw(), "surface") {
            return Err(RhiError::InvalidHandle(format!("{surface:?}")));
        }
        if self.faults.fail_device {
            return Err(RhiError::DeviceCreation(
                "no physical device supports presentation".into(),
            ));
        }
        self.device = Some(self.state.borrow_mut().create("device"));
        Ok(DeviceInfo {
            name: "Soft Vulkan Device".into(),
            tile_based: false,
        })
    }

    fn create_swapchain(
        &mut self,
        surface: SurfaceId,
        extent: Extent2D,
        old: Option<SwapchainId>,
    ) -> RhiResult<SwapchainInfo> {
        self.require_device()?;
        if extent.is_empty() {
            return Err(RhiError::SurfaceCreation(format!(
                "swapchain extent must be non-zero, got {}x{}",
                extent.width, extent.height
            )));
        }
        if !self.state.borrow().is_live(surface.as_raw(), "surface") {
            return Err(RhiError::InvalidHandle(format!("{surface:?}")));
        }
        if let Some(old) = old {
            if !self.swapchains.contains_key(&old) {
                return Err(RhiError::InvalidHandle(format!("{old:?}")));
            }
            self.state.borrow_mut().surface_rebuilds += 1;
        }
        let handle = SwapchainId::from_raw(self.state.borrow_mut().create("swapchain"));
        self.swapchains.insert(
            handle,
            SoftSwapchain {
                acquired: vec![false; IMAGE_COUNT as usize],
                next: 0,
            },
        );
        Ok(SwapchainInfo {
            handle,
            extent,
            image_count: IMAGE_COUNT,
        })
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainId) {
        self.swapchains.remove(&swapchain);
        self.state.borrow_mut().release(swapchain.as_raw(), "swapchain");
    }

    fn create_command_pool(&mut self) -> RhiResult<CommandPoolId> {
        self.require_device()?;
        let pool = CommandPoolId::from_raw(self.state.borrow_mut().create("command_pool"));
        self.pools.insert(pool, Vec::new());
        Ok(pool)
    }

    fn allocate_command_buffer(&mut self, pool: CommandPoolId) -> RhiResult<CommandBufferId> {
        self.require_device()?;
        let Some(buffers) = self.pools.get_mut(&pool) else {
            return Err(RhiError::InvalidHandle(format!("{pool:?}")));
        };
        let buffer = CommandBufferId::from_raw(self.state.borrow_mut().create("command_buffer"));
        buffers.push(buffer);
        Ok(buffer)
    }

    fn reset_command_buffer(&mut self, buffer: CommandBufferId) -> RhiResult<()> {
        let request = self.state.borrow_mut().next_buffer_request();
        if self.faults.failed_command_buffers.contains(&request) {
            return Err(RhiError::InvalidState("injected command buffer reset failure".into()));
        }
        if self.state.borrow().is_live(buffer.as_raw(), "command_buffer") {
            Ok(())
        } else {
            Err(RhiError::InvalidHandle(format!("{buffer:?}")))
        }
    }

    fn destroy_command_pool(&mut self, pool: CommandPoolId) {
        let mut state = self.state.borrow_mut();
        for buffer in self.pools.remove(&pool).unwrap_or_default() {
            state.release(buffer.as_raw(), "command_buffer");
        }
        state.release(pool.as_raw(), "command_pool");
    }

    fn create_semaphore(&mut self) -> RhiResult<SemaphoreId> {
        self.require_device()?;
        let semaphore = SemaphoreId::from_raw(self.state.borrow_mut().create("semaphore"));
        self.semaphores.insert(semaphore, false);
        Ok(semaphore)
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreId) {
        self.semaphores.remove(&semaphore);
        self.state.borrow_mut().release(semaphore.as_raw(), "semaphore");
    }

    fn create_fence(&mut self, signaled: bool) -> RhiResult<FenceId> {
        self.require_device()?;
        let fence = FenceId::from_raw(self.state.borrow_mut().create("fence"));
        self.fences.insert(fence, signaled);
        Ok(fence)
    }

    fn wait_for_fence(&mut self, fence: FenceId, timeout: Duration) -> RhiResult<()> {
        match self.fences.get(&fence) {
            Some(true) => Ok(()),
            Some(false) if self.lost => Err(RhiError::DeviceLost("soft device lost".into())),
            Some(false) => Err(RhiError::Timeout {
                operation: "fence wait",
                timeout,
            }),
            None => Err(RhiError::InvalidHandle(format!("{fence:?}"))),
        }
    }

    fn reset_fence(&mut self, fence: FenceId) -> RhiResult<()> {
        match self.fences.get_mut(&fence) {
            Some(signaled) => {
                *signaled = false;
                Ok(())
            }
            None => Err(RhiError::InvalidHandle(format!("{fence:?}"))),
        }
    }

    fn destroy_fence(&mut self, fence: FenceId) {
        self.fences.remove(&fence);
        self.state.borrow_mut().release(fence.as_raw(), "fence");
    }

    fn acquire_next_image(
        &mut self,
        swapchain: SwapchainId,
        signal: SemaphoreId,
        timeout: Duration,
    ) -> RhiResult<AcquiredImage> {
        self.require_device()?;
        let attempt = {
            let mut state = self.state.borrow_mut();
            state.acquires += 1;
            state.acquires - 1
        };
        if self.faults.stale_acquires.contains(&attempt) {
            debug!(attempt, "Injected out-of-date acquire");
            return Err(RhiError::OutOfDate);
        }
        if self.faults.unavailable_acquires.contains(&attempt) {
            return Err(RhiError::Timeout {
                operation: "image acquire",
                timeout,
            });
        }

        let Some(chain) = self.swapchains.get_mut(&swapchain) else {
            return Err(RhiError::InvalidHandle(format!("{swapchain:?}")));
        };
        let count = chain.acquired.len();
        let Some(index) = (0..count)
            .map(|i| (chain.next + i) % count)
            .find(|i| !chain.acquired[*i])
        else {
            return Err(RhiError::Timeout {
                operation: "image acquire",
                timeout,
            });
        };
        chain.acquired[index] = true;
        chain.next = (index + 1) % count;

        self.signal_semaphore(signal)?;
        Ok(AcquiredImage {
            index: index as u32,
            suboptimal: false,
        })
    }

    fn queue_submit(&mut self, submit: &SubmitInfo<'_>) -> RhiResult<()> {
        self.require_device()?;
        let attempt = self.state.borrow_mut().next_submit_attempt();
        if self.faults.failed_submits.contains(&attempt) {
            return Err(RhiError::InvalidState("injected submit failure".into()));
        }
        let index = self.state.borrow().submissions;
        if self.faults.device_lost_at_submit == Some(index) {
            warn!(index, "Injected device loss");
            self.lost = true;
            return Err(RhiError::DeviceLost("injected device loss".into()));
        }
        if !self
            .state
            .borrow()
            .is_live(submit.command_buffer.as_raw(), "command_buffer")
        {
            return Err(RhiError::InvalidHandle(format!(
                "{:?}",
                submit.command_buffer
            )));
        }
        if !submit.commands.is_executable() {
            return Err(RhiError::InvalidState(
                "submitted command buffer is not executable".into(),
            ));
        }
        match self.fences.get(&submit.fence) {
            Some(false) => {}
            Some(true) => {
                return Err(RhiError::InvalidState(
                    "submission fence must be reset before submit".into(),
                ));
            }
            None => return Err(RhiError::InvalidHandle(format!("{:?}", submit.fence))),
        }
        self.take_semaphore(submit.wait, "submission")?;
        self.signal_semaphore(submit.signal)?;
        self.fences.insert(submit.fence, true);

        let mut state = self.state.borrow_mut();
        state.submissions += 1;
        state.last_commands = submit.commands.commands().to_vec();
        Ok(())
    }

    fn queue_present(
        &mut self,
        swapchain: SwapchainId,
        image_index: u32,
        wait: SemaphoreId,
    ) -> RhiResult<bool> {
        self.require_device()?;
        let Some(chain) = self.swapchains.get_mut(&swapchain) else {
            return Err(RhiError::InvalidHandle(format!("{swapchain:?}")));
        };
        match chain.acquired.get_mut(image_index as usize) {
            Some(acquired) if *acquired => *acquired = false,
            _ => {
                return Err(RhiError::InvalidState(format!(
                    "image {image_index} presented without being acquired"
                )));
            }
        }
        self.take_semaphore(wait, "presentation")?;

        let attempt = self.present_attempts;
        self.present_attempts += 1;
        if self.faults.stale_presents.contains(&attempt) {
            debug!(attempt, "Injected out-of-date present");
            return Err(RhiError::OutOfDate);
        }
        self.state.borrow_mut().presents += 1;
        Ok(false)
    }

    fn device_wait_idle(&mut self, timeout: Duration) -> RhiResult<()> {
        self.state.borrow_mut().idle_waits += 1;
        if self.faults.hang_on_idle {
            return Err(RhiError::Timeout {
                operation: "device idle",
                timeout,
            });
        }
        if self.lost {
            return Err(RhiError::DeviceLost("soft device lost".into()));
        }
        Ok(())
    }

    fn destroy_device(&mut self) {
        let Some(device) = self.device.take() else {
            self.state.borrow_mut().invalid_releases += 1;
            return;
        };
        let mut state = self.state.borrow_mut();
        state.check_children(
            "device",
            &["swapchain", "command_pool", "fence", "semaphore"],
        );
        state.release(device, "device");
    }

    fn destroy_surface(&mut self, surface: SurfaceId) {
        let mut state = self.state.borrow_mut();
        state.check_children("surface", &["swapchain"]);
        state.release(surface.as_raw(), "surface");
    }

    fn destroy_instance(&mut self) {
        let Some(instance) = self.instance.take() else {
            self.state.borrow_mut().invalid_releases += 1;
            return;
        };
        let mut state = self.state.borrow_mut();
        state.check_children("instance", &["device", "surface"]);
        state.release(instance, "instance");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandList;
    use crate::soft::SoftGpu;
    use crate::types::Extent2D;

    fn headless() -> SurfaceHandle {
        SurfaceHandle::Headless { id: 1 }
    }

    fn executable() -> CommandList {
        let mut list = CommandList::new();
        list.begin().unwrap();
        list.end().unwrap();
        list
    }

    struct Setup {
        driver: SoftVulkan,
        surface: SurfaceId,
        swapchain: SwapchainId,
    }

    fn setup(gpu: &SoftGpu) -> Setup {
        let mut driver = gpu.vulkan_driver();
        driver.create_instance("test", false).unwrap();
        let surface = driver.create_surface(&headless()).unwrap();
        driver.create_device(surface).unwrap();
        let swapchain = driver
            .create_swapchain(surface, Extent2D::new(100, 100), None)
            .unwrap()
            .handle;
        Setup {
            driver,
            surface,
            swapchain,
        }
    }

    #[test]
    fn test_unavailable_api() {
        let gpu = SoftGpu::with_faults(FaultPlan::new().api_unavailable());
        let mut driver = gpu.vulkan_driver();
        assert!(matches!(
            driver.create_instance("test", false),
            Err(RhiError::Unavailable(_))
        ));
        assert_eq!(gpu.probe().live_objects(), 0);
    }

    #[test]
    fn test_zero_extent_swapchain_rejected() {
        let gpu = SoftGpu::new();
        let mut s = setup(&gpu);
        assert!(
            s.driver
                .create_swapchain(s.surface, Extent2D::new(0, 10), Some(s.swapchain))
                .is_err()
        );
    }

    #[test]
    fn test_acquire_submit_present() {
        let gpu = SoftGpu::new();
        let probe = gpu.probe();
        let mut s = setup(&gpu);
        let d = &mut s.driver;

        let pool = d.create_command_pool().unwrap();
        let cb = d.allocate_command_buffer(pool).unwrap();
        let acquired = d.create_semaphore().unwrap();
        let rendered = d.create_semaphore().unwrap();
        let fence = d.create_fence(true).unwrap();

        let image = d
            .acquire_next_image(s.swapchain, acquired, Duration::from_millis(1))
            .unwrap();
        d.wait_for_fence(fence, Duration::from_millis(1)).unwrap();
        d.reset_fence(fence).unwrap();
        let list = executable();
        d.queue_submit(&SubmitInfo {
            command_buffer: cb,
            commands: &list,
            wait: acquired,
            signal: rendered,
            fence,
        })
        .unwrap();
        assert!(!d.queue_present(s.swapchain, image.index, rendered).unwrap());

        assert_eq!(probe.submissions(), 1);
        assert_eq!(probe.presents(), 1);
        d.wait_for_fence(fence, Duration::from_millis(1)).unwrap();
    }

    #[test]
    fn test_submit_with_signaled_fence_rejected() {
        let gpu = SoftGpu::new();
        let mut s = setup(&gpu);
        let d = &mut s.driver;
        let pool = d.create_command_pool().unwrap();
        let cb = d.allocate_command_buffer(pool).unwrap();
        let wait = d.create_semaphore().unwrap();
        let signal = d.create_semaphore().unwrap();
        let fence = d.create_fence(true).unwrap();
        d.acquire_next_image(s.swapchain, wait, Duration::ZERO)
            .unwrap();
        let list = executable();
        let result = d.queue_submit(&SubmitInfo {
            command_buffer: cb,
            commands: &list,
            wait,
            signal,
            fence,
        });
        assert!(matches!(result, Err(RhiError::InvalidState(_))));
    }

    #[test]
    fn test_injected_stale_acquire() {
        let gpu = SoftGpu::with_faults(FaultPlan::new().stale_target_on_acquire(0));
        let mut s = setup(&gpu);
        let sem = s.driver.create_semaphore().unwrap();
        assert!(matches!(
            s.driver
                .acquire_next_image(s.swapchain, sem, Duration::ZERO),
            Err(RhiError::OutOfDate)
        ));
        assert!(
            s.driver
                .acquire_next_image(s.swapchain, sem, Duration::ZERO)
                .is_ok()
        );
    }

    #[test]
    fn test_hung_idle_wait_times_out() {
        let gpu = SoftGpu::with_faults(FaultPlan::new().hang_on_idle());
        let mut s = setup(&gpu);
        assert!(matches!(
            s.driver.device_wait_idle(Duration::from_millis(5)),
            Err(RhiError::Timeout { .. })
        ));
    }

    #[test]
    fn test_reverse_order_teardown_is_clean() {
        let gpu = SoftGpu::new();
        let probe = gpu.probe();
        let mut s = setup(&gpu);
        let pool = s.driver.create_command_pool().unwrap();
        s.driver.allocate_command_buffer(pool).unwrap();

        s.driver.destroy_command_pool(pool);
        s.driver.destroy_swapchain(s.swapchain);
        s.driver.destroy_device();
        s.driver.destroy_surface(s.surface);
        s.driver.destroy_instance();

        assert_eq!(probe.live_objects(), 0);
        assert_eq!(probe.order_violations(), 0);
        assert_eq!(probe.invalid_releases(), 0);
    }

    #[test]
    fn test_destroying_device_first_is_a_violation() {
        let gpu = SoftGpu::new();
        let probe = gpu.probe();
        let mut s = setup(&gpu);
        s.driver.destroy_device();
        assert_eq!(probe.order_violations(), 1);
    }
}
