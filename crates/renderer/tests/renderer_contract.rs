//! Renderer contract behavior shared by every backend.

use forge_core::{Error, RendererConfig};
use forge_platform::{Capabilities, HeadlessBackend, Platform};
use forge_renderer::{
    BackendKind, FrameOutcome, FrameState, Renderer, RendererFactory, SkipReason, SoftwareFactory,
};
use forge_rhi::soft::{FaultPlan, SoftGpu};

const BACKENDS: [BackendKind; 2] = [BackendKind::Metal, BackendKind::Vulkan];

fn platform() -> Platform {
    Platform::with_backend(HeadlessBackend::new(Capabilities::ALL))
}

fn renderer(gpu: &SoftGpu, kind: BackendKind) -> Box<dyn Renderer> {
    SoftwareFactory::with_gpu(gpu.clone())
        .create(kind, &RendererConfig::default())
        .unwrap()
}

#[test]
fn test_full_lifecycle_leaves_no_gpu_objects() {
    for kind in BACKENDS {
        let platform = platform();
        let window = platform.create_window(800, 600, "contract").unwrap();
        let gpu = SoftGpu::new();
        let probe = gpu.probe();
        let mut renderer = renderer(&gpu, kind);

        renderer.initialize(&window).unwrap();
        assert_eq!(renderer.state(), FrameState::Ready);
        for _ in 0..4 {
            assert_eq!(renderer.render().unwrap(), FrameOutcome::Presented);
        }
        renderer.cleanup().unwrap();

        assert_eq!(renderer.state(), FrameState::Cleaned);
        assert_eq!(probe.presents(), 4, "{kind}");
        assert_eq!(probe.live_objects(), 0, "{kind}");
        assert_eq!(probe.order_violations(), 0, "{kind}");
    }
}

#[test]
fn test_render_before_initialize_does_nothing() {
    for kind in BACKENDS {
        let gpu = SoftGpu::new();
        let probe = gpu.probe();
        let mut renderer = renderer(&gpu, kind);
        assert_eq!(renderer.render().unwrap(), FrameOutcome::NotReady);
        assert_eq!(probe.acquires(), 0);
    }
}

#[test]
fn test_double_cleanup_does_not_double_release() {
    for kind in BACKENDS {
        let platform = platform();
        let window = platform.create_window(320, 240, "contract").unwrap();
        let gpu = SoftGpu::new();
        let probe = gpu.probe();
        let mut renderer = renderer(&gpu, kind);

        renderer.initialize(&window).unwrap();
        renderer.render().unwrap();
        renderer.cleanup().unwrap();
        renderer.cleanup().unwrap();

        assert_eq!(probe.invalid_releases(), 0, "{kind}");
        assert_eq!(probe.live_objects(), 0, "{kind}");
        assert_eq!(renderer.state(), FrameState::Cleaned);
    }
}

#[test]
fn test_cleanup_without_initialize_is_safe() {
    for kind in BACKENDS {
        let gpu = SoftGpu::new();
        let probe = gpu.probe();
        let mut renderer = renderer(&gpu, kind);
        renderer.cleanup().unwrap();
        renderer.cleanup().unwrap();
        assert_eq!(probe.invalid_releases(), 0);
        assert_eq!(renderer.state(), FrameState::Uninitialized);
    }
}

#[test]
fn test_stale_target_skips_one_frame_and_recovers() {
    for kind in BACKENDS {
        let platform = platform();
        let window = platform.create_window(320, 240, "contract").unwrap();
        let gpu = SoftGpu::with_faults(FaultPlan::new().stale_target_on_acquire(1));
        let probe = gpu.probe();
        let mut renderer = renderer(&gpu, kind);
        renderer.initialize(&window).unwrap();

        assert_eq!(renderer.render().unwrap(), FrameOutcome::Presented);
        assert_eq!(
            renderer.render().unwrap(),
            FrameOutcome::Skipped(SkipReason::TargetStale),
            "{kind}"
        );
        assert_eq!(renderer.state(), FrameState::Ready);
        assert_eq!(renderer.render().unwrap(), FrameOutcome::Presented);
        assert_eq!(probe.surface_rebuilds(), 1, "{kind}");
    }
}

#[test]
fn test_unavailable_target_is_skipped() {
    for kind in BACKENDS {
        let platform = platform();
        let window = platform.create_window(320, 240, "contract").unwrap();
        let gpu = SoftGpu::with_faults(FaultPlan::new().target_unavailable_on_acquire(0));
        let mut renderer = renderer(&gpu, kind);
        renderer.initialize(&window).unwrap();

        assert_eq!(
            renderer.render().unwrap(),
            FrameOutcome::Skipped(SkipReason::TargetUnavailable),
            "{kind}"
        );
        assert_eq!(renderer.render().unwrap(), FrameOutcome::Presented);
    }
}

#[test]
fn test_minimized_window_skips_until_restored() {
    for kind in BACKENDS {
        let platform = platform();
        let window = platform.create_window(320, 240, "contract").unwrap();
        let gpu = SoftGpu::new();
        let probe = gpu.probe();
        let mut renderer = renderer(&gpu, kind);
        renderer.initialize(&window).unwrap();

        renderer.notify_resize(0, 0);
        assert_eq!(
            renderer.render().unwrap(),
            FrameOutcome::Skipped(SkipReason::TargetUnavailable)
        );
        let acquires = probe.acquires();

        renderer.notify_resize(400, 300);
        assert_eq!(renderer.render().unwrap(), FrameOutcome::Presented);
        assert_eq!(probe.acquires(), acquires + 1);
    }
}

#[test]
fn test_backend_init_failures() {
    let faults = [
        FaultPlan::new().api_unavailable(),
        FaultPlan::new().device_creation_fails(),
        FaultPlan::new().surface_creation_fails(),
    ];
    for kind in BACKENDS {
        for plan in faults.clone() {
            let platform = platform();
            let window = platform.create_window(320, 240, "contract").unwrap();
            let gpu = SoftGpu::with_faults(plan);
            let probe = gpu.probe();
            let mut renderer = renderer(&gpu, kind);

            assert!(matches!(
                renderer.initialize(&window),
                Err(Error::BackendInit(_))
            ));
            assert_eq!(renderer.state(), FrameState::Uninitialized);
            assert_eq!(probe.live_objects(), 0, "{kind}");
            assert_eq!(probe.order_violations(), 0, "{kind}");
        }
    }
}

#[test]
fn test_device_loss_is_fatal_and_cleanup_still_releases() {
    for kind in BACKENDS {
        let platform = platform();
        let window = platform.create_window(320, 240, "contract").unwrap();
        let gpu = SoftGpu::with_faults(FaultPlan::new().device_lost_on_submit(2));
        let probe = gpu.probe();
        let mut renderer = renderer(&gpu, kind);
        renderer.initialize(&window).unwrap();

        renderer.render().unwrap();
        renderer.render().unwrap();
        let err = renderer.render().unwrap_err();
        assert!(matches!(err, Error::DeviceLost(_)), "{kind}: {err}");
        assert_eq!(renderer.state(), FrameState::Lost);

        let _ = renderer.cleanup();
        assert_eq!(renderer.state(), FrameState::Cleaned);
        assert_eq!(probe.live_objects(), 0, "{kind}");
    }
}

#[test]
fn test_hung_gpu_cleanup_times_out_instead_of_blocking() {
    for kind in BACKENDS {
        let platform = platform();
        let window = platform.create_window(320, 240, "contract").unwrap();
        let gpu = SoftGpu::with_faults(FaultPlan::new().hang_on_idle());
        let probe = gpu.probe();
        let mut renderer = renderer(&gpu, kind);
        renderer.initialize(&window).unwrap();
        renderer.render().unwrap();

        let err = renderer.cleanup().unwrap_err();
        assert!(matches!(err, Error::GpuTimeout { .. }), "{kind}: {err}");
        assert_eq!(renderer.state(), FrameState::Cleaned);
        assert_eq!(probe.live_objects(), 0, "{kind}");
    }
}

#[test]
fn test_rejected_submits_do_not_poison_later_frames() {
    for kind in BACKENDS {
        let platform = platform();
        let window = platform.create_window(320, 240, "contract").unwrap();
        let plan = (1..=4).fold(FaultPlan::new(), |plan, attempt| plan.submit_fails_on(attempt));
        let gpu = SoftGpu::with_faults(plan);
        let probe = gpu.probe();
        let mut renderer = renderer(&gpu, kind);
        renderer.initialize(&window).unwrap();

        assert_eq!(renderer.render().unwrap(), FrameOutcome::Presented);
        for _ in 1..=4 {
            let err = renderer.render().unwrap_err();
            assert!(matches!(err, Error::Render(_)), "{kind}: {err}");
            assert_eq!(renderer.state(), FrameState::Ready);
            assert_eq!(probe.live_of_kind("drawable"), 0, "{kind}");
        }
        for _ in 0..3 {
            assert_eq!(renderer.render().unwrap(), FrameOutcome::Presented, "{kind}");
        }

        renderer.cleanup().unwrap();
        assert_eq!(probe.presents(), 4, "{kind}");
        assert_eq!(probe.live_objects(), 0, "{kind}");
        assert_eq!(probe.invalid_releases(), 0, "{kind}");
        assert_eq!(probe.order_violations(), 0, "{kind}");
    }
}

#[test]
fn test_command_buffer_failure_returns_target() {
    for kind in BACKENDS {
        let platform = platform();
        let window = platform.create_window(320, 240, "contract").unwrap();
        let gpu = SoftGpu::with_faults(FaultPlan::new().command_buffer_fails_on(1));
        let probe = gpu.probe();
        let mut renderer = renderer(&gpu, kind);
        renderer.initialize(&window).unwrap();

        assert_eq!(renderer.render().unwrap(), FrameOutcome::Presented);
        assert!(matches!(renderer.render(), Err(Error::Render(_))), "{kind}");
        assert_eq!(probe.live_of_kind("drawable"), 0, "{kind}");
        assert_eq!(renderer.render().unwrap(), FrameOutcome::Presented, "{kind}");
        assert_eq!(renderer.render().unwrap(), FrameOutcome::Presented, "{kind}");

        renderer.cleanup().unwrap();
        assert_eq!(probe.live_objects(), 0, "{kind}");
        assert_eq!(probe.invalid_releases(), 0, "{kind}");
    }
}
