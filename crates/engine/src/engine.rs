//! The engine orchestrator and run loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use forge_core::{EngineConfig, Error, FrameClock, FrameSummary, Result};
use forge_platform::{Platform, Window};
use forge_renderer::{
    BackendKind, FrameOutcome, Renderer, RendererFactory, SoftwareFactory, select_backend,
};
use tracing::{debug, error, info, warn};

/// Totals for one call to [`Engine::run`].
pub type RunSummary = FrameSummary;

/// Requests that a running engine leave its loop.
///
/// The loop observes the request at its next check, after the frame in
/// progress completes.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Owns one window and one renderer and drives them from a platform.
///
/// # Resource Destruction Order
///
/// 1. Renderer (cleanup, then release)
/// 2. Window (close, then release)
pub struct Engine<'p> {
    platform: &'p Platform,
    factory: Box<dyn RendererFactory>,
    config: EngineConfig,
    window: Option<Window>,
    renderer: Option<Box<dyn Renderer>>,
    is_initialized: bool,
    running: Arc<AtomicBool>,
}

impl<'p> Engine<'p> {
    /// An engine that builds renderers over the software reference device.
    pub fn new(platform: &'p Platform) -> Self {
        Self::with_factory(platform, SoftwareFactory::new())
    }

    /// An engine that builds renderers with `factory`.
    pub fn with_factory(platform: &'p Platform, factory: impl RendererFactory + 'static) -> Self {
        Self {
            platform,
            factory: Box::new(factory),
            config: EngineConfig::default(),
            window: None,
            renderer: None,
            is_initialized: false,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use `config` for renderer settings on the next initialize.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Create the window and renderer.
    ///
    /// Returns immediately if already initialized. On failure everything
    /// created so far is released and the engine is back in its initial
    /// state, so the call may be retried.
    ///
    /// # Errors
    ///
    /// - [`Error::WindowCreation`] if the window cannot be created
    /// - [`Error::BackendInit`] if no backend is supported or it fails to start
    pub fn initialize(&mut self, title: &str, width: u32, height: u32) -> Result<()> {
        let config = EngineConfig {
            title: title.to_string(),
            width,
            height,
            renderer: self.config.renderer.clone(),
        };
        self.initialize_with(&config)
    }

    /// [`initialize`](Self::initialize) from a full configuration.
    pub fn initialize_with(&mut self, config: &EngineConfig) -> Result<()> {
        if self.is_initialized {
            debug!("Engine already initialized");
            return Ok(());
        }
        config.validate()?;

        match self.try_initialize(config) {
            Ok(backend) => {
                self.config = config.clone();
                self.is_initialized = true;
                info!(
                    "Engine initialized: '{}' {}x{} on {}",
                    config.title, config.width, config.height, backend
                );
                Ok(())
            }
            Err(e) => {
                error!("Engine initialization failed: {}", e);
                self.shutdown();
                Err(e)
            }
        }
    }

    fn try_initialize(&mut self, config: &EngineConfig) -> Result<BackendKind> {
        let window = self
            .platform
            .create_window(config.width, config.height, &config.title)?;
        let window = self.window.insert(window);

        let kind = select_backend(&self.platform.capabilities())?;
        let mut renderer = self.factory.create(kind, &config.renderer)?;
        renderer.initialize(window)?;
        self.renderer = Some(renderer);
        Ok(kind)
    }

    /// Show the window and render until the platform asks to close or a
    /// [`StopHandle`] stops the loop.
    ///
    /// Each iteration polls events, applies any resize and renders one
    /// frame. Skipped and failed frames do not stop the loop.
    ///
    /// # Errors
    ///
    /// - [`Error::Usage`] if the engine is not initialized (nothing runs)
    /// - A fatal renderer error ([`Error::is_fatal`]), after leaving the loop
    pub fn run(&mut self) -> Result<RunSummary> {
        let (true, Some(window), Some(renderer)) = (
            self.is_initialized,
            self.window.as_mut(),
            self.renderer.as_mut(),
        ) else {
            return Err(Error::Usage(
                "run() requires a successful initialize()".into(),
            ));
        };

        self.running.store(true, Ordering::Release);
        window.show();
        info!("Entering run loop");

        let mut clock = FrameClock::new();
        let result = loop {
            self.platform.poll_events();
            if self.platform.should_close() || !self.running.load(Ordering::Acquire) {
                break Ok(());
            }

            if let Some((width, height)) = self.platform.last_resize() {
                window.resize(width, height);
                renderer.notify_resize(width, height);
            }

            match renderer.render() {
                Ok(FrameOutcome::Presented) => clock.frame_presented(),
                Ok(FrameOutcome::Skipped(reason)) => {
                    debug!(?reason, "Frame skipped");
                    clock.frame_skipped();
                }
                Ok(FrameOutcome::NotReady) => {
                    break Err(Error::Usage("renderer is not initialized".into()));
                }
                Err(e) if e.is_fatal() => {
                    error!("Fatal render error: {}", e);
                    break Err(e);
                }
                Err(e) => {
                    warn!("Frame failed: {}", e);
                    clock.frame_skipped();
                }
            }
            clock.tick();
        };

        self.running.store(false, Ordering::Release);
        let summary = clock.summary();
        info!(
            presented = summary.presented,
            skipped = summary.skipped,
            fps = summary.average_fps(),
            "Run loop exited"
        );
        result.map(|()| summary)
    }

    /// Release the renderer and the window. Safe to call in any state.
    pub fn shutdown(&mut self) {
        let had_state = self.is_initialized || self.window.is_some() || self.renderer.is_some();

        if let Some(mut renderer) = self.renderer.take()
            && let Err(e) = renderer.cleanup()
        {
            error!("Renderer cleanup failed: {}", e);
        }
        if let Some(mut window) = self.window.take() {
            window.close();
        }
        self.is_initialized = false;
        self.running.store(false, Ordering::Release);

        if had_state {
            info!("Engine shut down");
        }
    }

    /// Whether the run loop is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    /// The backend chosen at initialize.
    pub fn backend(&self) -> Option<BackendKind> {
        self.renderer.as_ref().map(|r| r.backend())
    }

    pub fn window(&self) -> Option<&Window> {
        self.window.as_ref()
    }

    /// The configuration of the last successful initialize.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A handle that stops the current run from inside or outside the loop.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }
}

impl Drop for Engine<'_> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
