//! The platform facade: event pumping, window factory and capability queries.

use std::cell::{Cell, Ref, RefCell};
use std::sync::atomic::{AtomicBool, Ordering};

use forge_core::{Error, Result};
use tracing::{debug, info};

use crate::event::PlatformEvent;
use crate::input::InputState;
use crate::window::{NativeWindow, Window};

/// Set while a native platform instance is alive.
static NATIVE_PLATFORM_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Graphics APIs the running OS/GPU combination can drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub metal: bool,
    pub vulkan: bool,
    pub opengl: bool,
}

impl Capabilities {
    /// No graphics API available.
    pub const NONE: Self = Self {
        metal: false,
        vulkan: false,
        opengl: false,
    };

    /// Every graphics API available.
    pub const ALL: Self = Self {
        metal: true,
        vulkan: true,
        opengl: true,
    };
}

/// Source of windows and OS events behind a [`Platform`].
pub trait PlatformBackend {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Graphics APIs this backend can present with.
    fn capabilities(&self) -> Capabilities;

    /// Create a hidden native window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WindowCreation`] if the OS refuses the window.
    fn create_window(
        &mut self,
        title: &str,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn NativeWindow>>;

    /// Drain pending OS events without blocking, appending them to `events`.
    fn pump_events(&mut self, events: &mut Vec<PlatformEvent>);
}

#[derive(Default)]
struct EventState {
    input: InputState,
    last_resize: Option<(u32, u32)>,
    batch: Vec<PlatformEvent>,
}

/// Process-level platform context.
///
/// A `Platform` is created once and passed by reference to the engine. The
/// native instance is limited to one per process; headless instances are
/// isolated and may be created freely (tests inject them).
///
/// All mutation happens inside [`poll_events`](Self::poll_events), apart from
/// [`set_should_close`](Self::set_should_close), which exists for OS handlers
/// and tests.
pub struct Platform {
    backend: RefCell<Box<dyn PlatformBackend>>,
    events: RefCell<EventState>,
    should_close: Cell<bool>,
    capabilities: Capabilities,
    holds_native_slot: bool,
}

impl Platform {
    /// Create the process-wide native platform (OS event loop and windows).
    ///
    /// # Errors
    ///
    /// Returns [`Error::WindowCreation`] if a native platform is already
    /// alive in this process or the OS event loop cannot be created.
    pub fn native() -> Result<Self> {
        if NATIVE_PLATFORM_ACTIVE.swap(true, Ordering::AcqRel) {
            return Err(Error::WindowCreation(
                "a native platform is already active in this process".into(),
            ));
        }

        match crate::native::create_backend() {
            Ok(backend) => Ok(Self::build(backend, true)),
            Err(e) => {
                NATIVE_PLATFORM_ACTIVE.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Create an isolated platform over any backend, typically a
    /// [`HeadlessBackend`](crate::HeadlessBackend).
    pub fn with_backend(backend: impl PlatformBackend + 'static) -> Self {
        Self::build(Box::new(backend), false)
    }

    fn build(backend: Box<dyn PlatformBackend>, holds_native_slot: bool) -> Self {
        let capabilities = backend.capabilities();
        info!(
            "Platform '{}' ready on {} (metal: {}, vulkan: {}, opengl: {})",
            backend.name(),
            Self::os_name(),
            capabilities.metal,
            capabilities.vulkan,
            capabilities.opengl
        );

        Self {
            backend: RefCell::new(backend),
            events: RefCell::new(EventState::default()),
            should_close: Cell::new(false),
            capabilities,
            holds_native_slot,
        }
    }

    /// Create a hidden window owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WindowCreation`] for zero dimensions or when the
    /// backend cannot create the native window.
    pub fn create_window(&self, width: u32, height: u32, title: &str) -> Result<Window> {
        if width == 0 || height == 0 {
            return Err(Error::WindowCreation(format!(
                "invalid window size {}x{}",
                width, height
            )));
        }

        let native = self
            .backend
            .borrow_mut()
            .create_window(title, width, height)?;

        info!("Window created: '{}' {}x{}", title, width, height);
        Ok(Window::from_native(native, title, width, height))
    }

    /// Drain one batch of pending OS events.
    ///
    /// Updates input state, latches the close request and records the last
    /// resize of the batch. Returns promptly.
    pub fn poll_events(&self) {
        let mut events = self.events.borrow_mut();
        let EventState {
            input,
            last_resize,
            batch,
        } = &mut *events;

        batch.clear();
        self.backend.borrow_mut().pump_events(batch);

        input.begin_batch();
        *last_resize = None;

        for event in batch.iter() {
            input.apply(event);
            match *event {
                PlatformEvent::CloseRequested => {
                    if !self.should_close.replace(true) {
                        info!("Close requested");
                    }
                }
                PlatformEvent::Resized { width, height } => {
                    *last_resize = Some((width, height));
                }
                _ => {}
            }
        }

        if !batch.is_empty() {
            debug!("Processed {} platform events", batch.len());
        }
    }

    /// Whether a close has been requested.
    pub fn should_close(&self) -> bool {
        self.should_close.get()
    }

    /// Set or clear the close request (OS handlers and tests).
    pub fn set_should_close(&self, should_close: bool) {
        self.should_close.set(should_close);
    }

    /// The last window size reported in the most recent event batch.
    pub fn last_resize(&self) -> Option<(u32, u32)> {
        self.events.borrow().last_resize
    }

    /// Input state as of the most recent event batch.
    pub fn input(&self) -> Ref<'_, InputState> {
        Ref::map(self.events.borrow(), |events| &events.input)
    }

    /// Snapshot of the supported graphics APIs.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn supports_metal(&self) -> bool {
        self.capabilities.metal
    }

    pub fn supports_vulkan(&self) -> bool {
        self.capabilities.vulkan
    }

    pub fn supports_opengl(&self) -> bool {
        self.capabilities.opengl
    }

    /// Name of the operating system family (`"linux"`, `"macos"`, ...).
    pub fn os_name() -> &'static str {
        std::env::consts::OS
    }

    /// Kernel or OS release string, where the OS exposes one cheaply.
    pub fn os_version() -> Option<String> {
        if cfg!(target_os = "linux") {
            std::fs::read_to_string("/proc/sys/kernel/osrelease")
                .ok()
                .map(|release| release.trim().to_string())
        } else {
            None
        }
    }

    /// Whether this is a debug build.
    pub fn is_debug_mode() -> bool {
        cfg!(debug_assertions)
    }
}

impl Drop for Platform {
    fn drop(&mut self) {
        if self.holds_native_slot {
            NATIVE_PLATFORM_ACTIVE.store(false, Ordering::Release);
            debug!("Native platform released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;
    use crate::input::KeyCode;

    #[test]
    fn test_capability_queries_are_snapshots() {
        let platform = Platform::with_backend(HeadlessBackend::new(Capabilities {
            metal: false,
            vulkan: true,
            opengl: false,
        }));
        assert!(!platform.supports_metal());
        assert!(platform.supports_vulkan());
        assert!(!platform.supports_opengl());
    }

    #[test]
    fn test_zero_sized_window_rejected() {
        let platform = Platform::with_backend(HeadlessBackend::new(Capabilities::ALL));
        let result = platform.create_window(0, 600, "Zero");
        assert!(matches!(result, Err(Error::WindowCreation(_))));
    }

    #[test]
    fn test_close_request_latches() {
        let backend = HeadlessBackend::new(Capabilities::ALL);
        let probe = backend.probe();
        let platform = Platform::with_backend(backend);

        probe.push_events([PlatformEvent::CloseRequested]);
        platform.poll_events();
        assert!(platform.should_close());

        platform.poll_events();
        assert!(platform.should_close());
    }

    #[test]
    fn test_set_should_close_hook() {
        let platform = Platform::with_backend(HeadlessBackend::new(Capabilities::ALL));
        assert!(!platform.should_close());
        platform.set_should_close(true);
        assert!(platform.should_close());
        platform.set_should_close(false);
        assert!(!platform.should_close());
    }

    #[test]
    fn test_last_resize_is_per_batch() {
        let backend = HeadlessBackend::new(Capabilities::ALL);
        let probe = backend.probe();
        let platform = Platform::with_backend(backend);

        probe.push_events([
            PlatformEvent::Resized {
                width: 640,
                height: 480,
            },
            PlatformEvent::Resized {
                width: 1024,
                height: 768,
            },
        ]);
        platform.poll_events();
        assert_eq!(platform.last_resize(), Some((1024, 768)));

        platform.poll_events();
        assert_eq!(platform.last_resize(), None);
    }

    #[test]
    fn test_poll_feeds_input_state() {
        let backend = HeadlessBackend::new(Capabilities::ALL);
        let probe = backend.probe();
        let platform = Platform::with_backend(backend);

        probe.push_events([PlatformEvent::KeyPressed(KeyCode::Escape)]);
        platform.poll_events();
        assert!(platform.input().is_key_just_pressed(KeyCode::Escape));

        platform.poll_events();
        assert!(!platform.input().is_key_just_pressed(KeyCode::Escape));
        assert!(platform.input().is_key_pressed(KeyCode::Escape));
    }

    #[test]
    fn test_os_name_is_known() {
        assert!(!Platform::os_name().is_empty());
        assert_eq!(Platform::is_debug_mode(), cfg!(debug_assertions));
    }
}
