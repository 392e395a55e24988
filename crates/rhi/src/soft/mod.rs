//! Software reference device.
//!
//! [`SoftGpu`] implements both driver seams on the CPU. It executes nothing,
//! but it tracks every object it hands out, validates synchronization and
//! ordering the way a validation layer would, and can inject faults on a
//! schedule. A [`SoftProbe`] observes the shared state from outside.
//!
//! ```
//! use forge_rhi::soft::{FaultPlan, SoftGpu};
//!
//! let gpu = SoftGpu::with_faults(FaultPlan::new().stale_target_on_acquire(1));
//! let probe = gpu.probe();
//! let _driver = gpu.vulkan_driver();
//! assert_eq!(probe.live_objects(), 0);
//! ```

mod metal;
mod vulkan;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::warn;

use crate::command::Command;

pub use metal::SoftMetal;
pub use vulkan::SoftVulkan;

/// Faults to inject, keyed by zero-based attempt counters.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    unavailable: bool,
    fail_device: bool,
    fail_surface: bool,
    stale_acquires: Vec<u64>,
    stale_presents: Vec<u64>,
    unavailable_acquires: Vec<u64>,
    device_lost_at_submit: Option<u64>,
    failed_submits: Vec<u64>,
    failed_command_buffers: Vec<u64>,
    hang_on_idle: bool,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// The API reports itself as not installed.
    pub fn api_unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn device_creation_fails(mut self) -> Self {
        self.fail_device = true;
        self
    }

    pub fn surface_creation_fails(mut self) -> Self {
        self.fail_surface = true;
        self
    }

    /// The `attempt`-th target acquisition reports a stale target.
    pub fn stale_target_on_acquire(mut self, attempt: u64) -> Self {
        self.stale_acquires.push(attempt);
        self
    }

    /// The `attempt`-th presentation reports a stale target.
    pub fn stale_target_on_present(mut self, attempt: u64) -> Self {
        self.stale_presents.push(attempt);
        self
    }

    /// The `attempt`-th target acquisition finds no target available.
    pub fn target_unavailable_on_acquire(mut self, attempt: u64) -> Self {
        self.unavailable_acquires.push(attempt);
        self
    }

    /// The `submission`-th submission loses the device.
    pub fn device_lost_on_submit(mut self, submission: u64) -> Self {
        self.device_lost_at_submit = Some(submission);
        self
    }

    /// The `attempt`-th submission is rejected without losing the device.
    pub fn submit_fails_on(mut self, attempt: u64) -> Self {
        self.failed_submits.push(attempt);
        self
    }

    /// The `attempt`-th request for a command buffer is rejected.
    pub fn command_buffer_fails_on(mut self, attempt: u64) -> Self {
        self.failed_command_buffers.push(attempt);
        self
    }

    /// Work never completes, so every idle wait times out.
    pub fn hang_on_idle(mut self) -> Self {
        self.hang_on_idle = true;
        self
    }
}

#[derive(Debug, Default)]
struct SoftState {
    next_id: u64,
    live: BTreeMap<u64, &'static str>,
    invalid_releases: u64,
    order_violations: u64,
    acquires: u64,
    submissions: u64,
    submit_attempts: u64,
    buffer_requests: u64,
    presents: u64,
    surface_rebuilds: u64,
    idle_waits: u64,
    last_commands: Vec<Command>,
}

impl SoftState {
    fn create(&mut self, kind: &'static str) -> u64 {
        self.next_id += 1;
        self.live.insert(self.next_id, kind);
        self.next_id
    }

    fn release(&mut self, id: u64, kind: &'static str) -> bool {
        match self.live.get(&id) {
            Some(k) if *k == kind => {
                self.live.remove(&id);
                true
            }
            _ => {
                warn!(id, kind, "Release of unknown or already released object");
                self.invalid_releases += 1;
                false
            }
        }
    }

    /// Count a submission attempt and return its zero-based index.
    fn next_submit_attempt(&mut self) -> u64 {
        self.submit_attempts += 1;
        self.submit_attempts - 1
    }

    /// Count a command buffer request and return its zero-based index.
    fn next_buffer_request(&mut self) -> u64 {
        self.buffer_requests += 1;
        self.buffer_requests - 1
    }

    fn is_live(&self, id: u64, kind: &'static str) -> bool {
        self.live.get(&id) == Some(&kind)
    }

    fn count(&self, kind: &str) -> usize {
        self.live.values().filter(|k| **k == kind).count()
    }

    /// Record a violation if any object of `kinds` outlives its parent.
    fn check_children(&mut self, parent: &'static str, kinds: &[&str]) {
        let alive: usize = kinds.iter().map(|k| self.count(k)).sum();
        if alive > 0 {
            warn!(parent, alive, "Destroying parent while children are alive");
            self.order_violations += 1;
        }
    }
}

type Shared = Rc<RefCell<SoftState>>;

/// A CPU-side GPU shared by the drivers it vends.
#[derive(Debug, Clone, Default)]
pub struct SoftGpu {
    faults: FaultPlan,
    state: Shared,
}

impl SoftGpu {
    /// A device with no faults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: FaultPlan) -> Self {
        Self {
            faults,
            state: Shared::default(),
        }
    }

    pub fn probe(&self) -> SoftProbe {
        SoftProbe {
            state: Rc::clone(&self.state),
        }
    }

    pub fn metal_driver(&self) -> SoftMetal {
        SoftMetal::new(self.faults.clone(), Rc::clone(&self.state))
    }

    pub fn vulkan_driver(&self) -> SoftVulkan {
        SoftVulkan::new(self.faults.clone(), Rc::clone(&self.state))
    }
}

/// Read-only view of a [`SoftGpu`]'s bookkeeping.
#[derive(Debug, Clone)]
pub struct SoftProbe {
    state: Shared,
}

impl SoftProbe {
    /// Objects created and not yet released.
    pub fn live_objects(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Live objects of one kind, e.g. `"fence"` or `"command_buffer"`.
    pub fn live_of_kind(&self, kind: &str) -> usize {
        self.state.borrow().count(kind)
    }

    /// Releases of objects that were unknown or already released.
    pub fn invalid_releases(&self) -> u64 {
        self.state.borrow().invalid_releases
    }

    /// Parents destroyed while their children were alive.
    pub fn order_violations(&self) -> u64 {
        self.state.borrow().order_violations
    }

    /// Target acquisition attempts, successful or not.
    pub fn acquires(&self) -> u64 {
        self.state.borrow().acquires
    }

    /// Accepted submissions.
    pub fn submissions(&self) -> u64 {
        self.state.borrow().submissions
    }

    /// Successful presentations.
    pub fn presents(&self) -> u64 {
        self.state.borrow().presents
    }

    /// Swapchain recreations and layer resizes.
    pub fn surface_rebuilds(&self) -> u64 {
        self.state.borrow().surface_rebuilds
    }

    pub fn idle_waits(&self) -> u64 {
        self.state.borrow().idle_waits
    }

    /// The most recently submitted command list.
    pub fn last_commands(&self) -> Vec<Command> {
        self.state.borrow().last_commands.clone()
    }
}
