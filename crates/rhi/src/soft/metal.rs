use std::collections::{HashMap, HashSet};
use std::time::Duration;

use forge_platform::SurfaceHandle;
use tracing::{debug, warn};

use super::{FaultPlan, Shared};
use crate::command::CommandList;
use crate::error::{RhiError, RhiResult};
use crate::handle::{CommandBufferId, DrawableId, LayerId, QueueId};
use crate::metal::MetalDriver;
use crate::types::{DeviceInfo, Extent2D};

/// Drawables a layer can have outstanding at once.
const MAX_DRAWABLES: usize = 3;

/// Implicit-sync driver over a [`SoftGpu`](super::SoftGpu).
///
/// Committed buffers complete immediately and are released by the driver,
/// unless the fault plan hangs the GPU, in which case they stay pending
/// until their queue is released.
#[derive(Debug)]
pub struct SoftMetal {
    faults: FaultPlan,
    state: Shared,
    device: Option<u64>,
    lost: bool,
    layers: HashMap<LayerId, Extent2D>,
    drawables: HashMap<DrawableId, LayerId>,
    scheduled: HashMap<CommandBufferId, DrawableId>,
    pending: HashSet<CommandBufferId>,
}

impl SoftMetal {
    pub(super) fn new(faults: FaultPlan, state: Shared) -> Self {
        Self {
            faults,
            state,
            device: None,
            lost: false,
            layers: HashMap::new(),
            drawables: HashMap::new(),
            scheduled: HashMap::new(),
            pending: HashSet::new(),
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

    fn retire_drawable(&mut self, drawable: DrawableId) {
        self.drawables.remove(&drawable);
        self.state
            .borrow_mut()
            .release(drawable.as_raw(), "drawable");
    }
}

impl MetalDriver for SoftMetal {
    fn create_system_default_device(&mut self) -> RhiResult<DeviceInfo> {
        if self.faults.unavailable {
            return Err(RhiError::Unavailable("no system default device".into()));
        }
        if self.faults.fail_device {
            return Err(RhiError::DeviceCreation("device refused to open".into()));
        }
        if self.device.is_some() {
            return Err(RhiError::InvalidState("device already created".into()));
        }
        self.device = Some(self.state.borrow_mut().create("device"));
        Ok(DeviceInfo {
            name: "Soft Metal Device".into(),
            tile_based: true,
        })
    }

    fn new_command_queue(&mut self) -> RhiResult<QueueId> {
        self.require_device()?;
        Ok(QueueId::from_raw(self.state.borrow_mut().create("queue")))
    }

    fn attach_layer(&mut self, _surface: &SurfaceHandle, extent: Extent2D) -> RhiResult<LayerId> {
        self.require_device()?;
        if self.faults.fail_surface {
            return Err(RhiError::SurfaceCreation("window refused the layer".into()));
        }
        let layer = LayerId::from_raw(self.state.borrow_mut().create("layer"));
        self.layers.insert(layer, extent);
        Ok(layer)
    }

    fn resize_layer(&mut self, layer: LayerId, extent: Extent2D) -> RhiResult<()> {
        let Some(current) = self.layers.get_mut(&layer) else {
            return Err(RhiError::InvalidHandle(format!("{layer:?}")));
        };
        *current = extent;
        self.state.borrow_mut().surface_rebuilds += 1;
        Ok(())
    }

    fn next_drawable(&mut self, layer: LayerId) -> RhiResult<Option<DrawableId>> {
        self.require_device()?;
        let attempt = {
            let mut state = self.state.borrow_mut();
            state.acquires += 1;
            state.acquires - 1
        };
        if self.faults.stale_acquires.contains(&attempt) {
            debug!(attempt, "Injected stale drawable");
            return Err(RhiError::OutOfDate);
        }
        if self.faults.unavailable_acquires.contains(&attempt) {
            return Ok(None);
        }
        let Some(extent) = self.layers.get(&layer) else {
            return Err(RhiError::InvalidHandle(format!("{layer:?}")));
        };
        if extent.is_empty() {
            return Ok(None);
        }
        let in_use = self.drawables.values().filter(|l| **l == layer).count();
        if in_use >= MAX_DRAWABLES {
            return Ok(None);
        }
        let drawable = DrawableId::from_raw(self.state.borrow_mut().create("drawable"));
        self.drawables.insert(drawable, layer);
        Ok(Some(drawable))
    }

    fn command_buffer(&mut self, queue: QueueId) -> RhiResult<CommandBufferId> {
        self.require_device()?;
        if !self.state.borrow().is_live(queue.as_raw(), "queue") {
            return Err(RhiError::InvalidHandle(format!("{queue:?}")));
        }
        let request = self.state.borrow_mut().next_buffer_request();
        if self.faults.failed_command_buffers.contains(&request) {
            return Err(RhiError::InvalidState("injected command buffer failure".into()));
        }
        Ok(CommandBufferId::from_raw(
            self.state.borrow_mut().create("command_buffer"),
        ))
    }

    fn present_drawable(&mut self, buffer: CommandBufferId, drawable: DrawableId) -> RhiResult<()> {
        if !self.drawables.contains_key(&drawable) {
            return Err(RhiError::InvalidHandle(format!("{drawable:?}")));
        }
        if self.pending.contains(&buffer)
            || !self.state.borrow().is_live(buffer.as_raw(), "command_buffer")
        {
            return Err(RhiError::InvalidState(
                "drawable scheduled on a committed or unknown command buffer".into(),
            ));
        }
        self.scheduled.insert(buffer, drawable);
        Ok(())
    }

    fn commit(&mut self, buffer: CommandBufferId, commands: &CommandList) -> RhiResult<()> {
        self.require_device()?;
        if self.pending.contains(&buffer)
            || !self.state.borrow().is_live(buffer.as_raw(), "command_buffer")
        {
            return Err(RhiError::InvalidState(format!(
                "{buffer:?} already committed or unknown"
            )));
        }
        let attempt = self.state.borrow_mut().next_submit_attempt();
        if self.faults.failed_submits.contains(&attempt) {
            return Err(RhiError::InvalidState("injected commit failure".into()));
        }

        let index = self.state.borrow().submissions;
        if self.faults.device_lost_at_submit == Some(index) {
            warn!(index, "Injected device loss");
            self.lost = true;
            if let Some(drawable) = self.scheduled.remove(&buffer) {
                self.retire_drawable(drawable);
            }
            self.state
                .borrow_mut()
                .release(buffer.as_raw(), "command_buffer");
            return Err(RhiError::DeviceLost("injected device loss".into()));
        }
        if !commands.is_executable() {
            return Err(RhiError::InvalidState(
                "committed command buffer is not executable".into(),
            ));
        }

        {
            let mut state = self.state.borrow_mut();
            state.submissions += 1;
            state.last_commands = commands.commands().to_vec();
        }
        if let Some(drawable) = self.scheduled.remove(&buffer) {
            self.retire_drawable(drawable);
            self.state.borrow_mut().presents += 1;
        }

        if self.faults.hang_on_idle {
            self.pending.insert(buffer);
        } else {
            self.state
                .borrow_mut()
                .release(buffer.as_raw(), "command_buffer");
        }
        Ok(())
    }

    fn wait_until_completed(
        &mut self,
        buffer: CommandBufferId,
        timeout: Duration,
    ) -> RhiResult<()> {
        self.state.borrow_mut().idle_waits += 1;
        if self.pending.contains(&buffer) {
            return Err(RhiError::Timeout {
                operation: "command buffer completion",
                timeout,
            });
        }
        Ok(())
    }

    fn discard_command_buffer(&mut self, buffer: CommandBufferId) {
        // Committed buffers belong to the driver once they are queued.
        if self.pending.contains(&buffer)
            || !self.state.borrow().is_live(buffer.as_raw(), "command_buffer")
        {
            return;
        }
        self.scheduled.remove(&buffer);
        self.state
            .borrow_mut()
            .release(buffer.as_raw(), "command_buffer");
    }

    fn discard_drawable(&mut self, drawable: DrawableId) {
        if !self.drawables.contains_key(&drawable) {
            return;
        }
        self.scheduled.retain(|_, d| *d != drawable);
        self.retire_drawable(drawable);
    }

    fn release_layer(&mut self, layer: LayerId) {
        let outstanding: Vec<_> = self
            .drawables
            .iter()
            .filter(|(_, l)| **l == layer)
            .map(|(d, _)| *d)
            .collect();
        for drawable in outstanding {
            self.retire_drawable(drawable);
        }
        self.layers.remove(&layer);
        self.state.borrow_mut().release(layer.as_raw(), "layer");
    }

    fn release_queue(&mut self, queue: QueueId) {
        let mut state = self.state.borrow_mut();
        for buffer in self.pending.drain() {
            state.release(buffer.as_raw(), "command_buffer");
        }
        state.release(queue.as_raw(), "queue");
    }

    fn release_device(&mut self) {
        let Some(device) = self.device.take() else {
            self.state.borrow_mut().invalid_releases += 1;
            return;
        };
        let mut state = self.state.borrow_mut();
        state.check_children("device", &["queue", "layer", "command_buffer", "drawable"]);
        state.release(device, "device");
    }
}
