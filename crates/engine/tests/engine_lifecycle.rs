//! Engine lifecycle scenarios against a headless platform and the software
//! reference device.

use std::cell::RefCell;
use std::rc::Rc;

use forge_core::{Error, RendererConfig, Result};
use forge_engine::{Engine, StopHandle};
use forge_platform::{Capabilities, HeadlessBackend, Platform, PlatformEvent, Window};
use forge_renderer::{
    BackendKind, FrameOutcome, FrameState, Renderer, RendererFactory, SoftwareFactory,
};
use forge_rhi::soft::{FaultPlan, SoftGpu};

fn headless(caps: Capabilities) -> (Platform, forge_platform::HeadlessProbe) {
    let backend = HeadlessBackend::new(caps);
    let probe = backend.probe();
    (Platform::with_backend(backend), probe)
}

#[test]
fn test_initialize_is_idempotent() {
    let (platform, probe) = headless(Capabilities::ALL);
    let mut engine = Engine::new(&platform);

    engine.initialize("Test Window", 800, 600).unwrap();
    engine.initialize("Test Window", 800, 600).unwrap();

    assert!(engine.is_initialized());
    assert_eq!(probe.windows_created(), 1);
}

#[test]
fn test_run_before_initialize_is_usage_error() {
    let (platform, probe) = headless(Capabilities::ALL);
    let mut engine = Engine::new(&platform);

    assert!(matches!(engine.run(), Err(Error::Usage(_))));
    assert!(!engine.is_running());
    assert_eq!(probe.polls(), 0);
}

#[test]
fn test_shutdown_resets_fully() {
    let (platform, probe) = headless(Capabilities::ALL);
    let mut engine = Engine::new(&platform);
    engine.initialize("Test Window", 800, 600).unwrap();

    engine.shutdown();
    assert!(!engine.is_running());
    assert!(!engine.is_initialized());
    assert!(engine.window().is_none());
    assert!(engine.backend().is_none());
    assert_eq!(probe.live_windows(), 0);

    assert!(matches!(engine.run(), Err(Error::Usage(_))));
    assert!(!engine.is_running());
    engine.shutdown();
}

#[test]
fn test_preset_close_exits_promptly() {
    let (platform, probe) = headless(Capabilities::ALL);
    let mut engine = Engine::new(&platform);
    assert!(engine.initialize("Test", 800, 600).is_ok());

    platform.set_should_close(true);
    let summary = engine.run().unwrap();

    assert!(!engine.is_running());
    assert_eq!(probe.polls(), 1);
    assert_eq!(summary.presented + summary.skipped, 0);
    assert!(engine.window().is_some_and(|w| w.is_visible()));

    engine.shutdown();
    assert!(!engine.is_running());
}

#[test]
fn test_no_backend_leaves_fresh_state() {
    let caps = Capabilities {
        opengl: true,
        ..Capabilities::NONE
    };
    let (platform, probe) = headless(caps);
    let mut engine = Engine::new(&platform);

    assert!(matches!(
        engine.initialize("Test", 800, 600),
        Err(Error::BackendInit(_))
    ));
    assert!(!engine.is_initialized());
    assert!(!engine.is_running());
    assert!(engine.window().is_none());
    assert!(engine.backend().is_none());
    assert_eq!(probe.live_windows(), 0);
    assert_eq!(probe.windows_released(), probe.windows_created());
    assert!(matches!(engine.run(), Err(Error::Usage(_))));
}

#[test]
fn test_window_failure_then_retry() {
    let (platform, probe) = headless(Capabilities::ALL);
    let mut engine = Engine::new(&platform);

    probe.set_fail_window_creation(true);
    assert!(matches!(
        engine.initialize("Test", 800, 600),
        Err(Error::WindowCreation(_))
    ));
    assert!(!engine.is_initialized());

    probe.set_fail_window_creation(false);
    engine.initialize("Test", 800, 600).unwrap();
    assert!(engine.is_initialized());
}

#[test]
fn test_renderer_failure_rolls_back_window() {
    let (platform, probe) = headless(Capabilities::ALL);
    let gpu = SoftGpu::with_faults(FaultPlan::new().device_creation_fails());
    let gpu_probe = gpu.probe();
    let mut engine = Engine::with_factory(&platform, SoftwareFactory::with_gpu(gpu));

    assert!(matches!(
        engine.initialize("Test", 800, 600),
        Err(Error::BackendInit(_))
    ));
    assert!(engine.window().is_none());
    assert_eq!(probe.windows_created(), 1);
    assert_eq!(probe.live_windows(), 0);
    assert_eq!(gpu_probe.live_objects(), 0);
}

#[test]
fn test_stale_target_is_skipped_and_loop_continues() {
    for caps in [
        Capabilities::ALL,
        Capabilities {
            vulkan: true,
            ..Capabilities::NONE
        },
    ] {
        let platform = Platform::with_backend(HeadlessBackend::new(caps).close_after_polls(5));
        let gpu = SoftGpu::with_faults(FaultPlan::new().stale_target_on_acquire(1));
        let gpu_probe = gpu.probe();
        let mut engine = Engine::with_factory(&platform, SoftwareFactory::with_gpu(gpu));
        engine.initialize("Test", 800, 600).unwrap();

        let summary = engine.run().unwrap();
        assert_eq!(summary.presented, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(gpu_probe.surface_rebuilds(), 1);
        assert!(!engine.is_running());

        engine.shutdown();
        assert_eq!(gpu_probe.live_objects(), 0);
    }
}

#[test]
fn test_resize_events_reach_window_and_renderer() {
    let backend = HeadlessBackend::new(Capabilities::ALL).close_after_polls(3);
    let probe = backend.probe();
    let platform = Platform::with_backend(backend);
    let gpu = SoftGpu::new();
    let gpu_probe = gpu.probe();
    let mut engine = Engine::with_factory(&platform, SoftwareFactory::with_gpu(gpu));
    engine.initialize("Test", 800, 600).unwrap();

    probe.push_events([PlatformEvent::Resized {
        width: 1024,
        height: 768,
    }]);
    let summary = engine.run().unwrap();

    assert_eq!(summary.presented, 2);
    assert_eq!(engine.window().map(|w| (w.width(), w.height())), Some((1024, 768)));
    assert_eq!(gpu_probe.surface_rebuilds(), 1);
}

#[test]
fn test_close_event_stops_loop() {
    let backend = HeadlessBackend::new(Capabilities::ALL);
    let probe = backend.probe();
    let platform = Platform::with_backend(backend);
    let mut engine = Engine::new(&platform);
    engine.initialize("Test", 800, 600).unwrap();

    probe.push_events([PlatformEvent::CloseRequested]);
    let summary = engine.run().unwrap();
    assert_eq!(summary.presented, 0);
    assert!(platform.should_close());
}

#[test]
fn test_device_loss_ends_run_with_fatal_error() {
    let (platform, _probe) = headless(Capabilities::ALL);
    let gpu = SoftGpu::with_faults(FaultPlan::new().device_lost_on_submit(3));
    let gpu_probe = gpu.probe();
    let mut engine = Engine::with_factory(&platform, SoftwareFactory::with_gpu(gpu));
    engine.initialize("Test", 800, 600).unwrap();

    let err = engine.run().unwrap_err();
    assert!(matches!(err, Error::DeviceLost(_)));
    assert!(err.is_fatal());
    assert!(!engine.is_running());
    assert_eq!(gpu_probe.submissions(), 3);

    engine.shutdown();
    assert_eq!(gpu_probe.live_objects(), 0);
}

/// Wraps the renderers it builds so they stop the engine after a few frames.
struct StoppingFactory {
    inner: SoftwareFactory,
    handle: Rc<RefCell<Option<StopHandle>>>,
    after: u32,
}

struct StoppingRenderer {
    inner: Box<dyn Renderer>,
    handle: Rc<RefCell<Option<StopHandle>>>,
    remaining: u32,
}

impl RendererFactory for StoppingFactory {
    fn create(&mut self, kind: BackendKind, config: &RendererConfig) -> Result<Box<dyn Renderer>> {
        Ok(Box::new(StoppingRenderer {
            inner: self.inner.create(kind, config)?,
            handle: Rc::clone(&self.handle),
            remaining: self.after,
        }))
    }
}

impl Renderer for StoppingRenderer {
    fn backend(&self) -> BackendKind {
        self.inner.backend()
    }

    fn state(&self) -> FrameState {
        self.inner.state()
    }

    fn initialize(&mut self, window: &Window) -> Result<()> {
        self.inner.initialize(window)
    }

    fn render(&mut self) -> Result<FrameOutcome> {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0
            && let Some(handle) = self.handle.borrow().as_ref()
        {
            handle.stop();
        }
        self.inner.render()
    }

    fn notify_resize(&mut self, width: u32, height: u32) {
        self.inner.notify_resize(width, height);
    }

    fn cleanup(&mut self) -> Result<()> {
        self.inner.cleanup()
    }
}

#[test]
fn test_stop_handle_ends_loop_after_current_frame() {
    let (platform, probe) = headless(Capabilities::ALL);
    let handle = Rc::new(RefCell::new(None));
    let factory = StoppingFactory {
        inner: SoftwareFactory::new(),
        handle: Rc::clone(&handle),
        after: 3,
    };
    let mut engine = Engine::with_factory(&platform, factory);
    *handle.borrow_mut() = Some(engine.stop_handle());
    engine.initialize("Test", 800, 600).unwrap();

    let summary = engine.run().unwrap();
    assert_eq!(summary.presented, 3);
    assert_eq!(probe.polls(), 4);
    assert!(!engine.is_running());
    assert!(!platform.should_close());
}
