//! Native platform backend built on winit.
//!
//! The event loop is pumped with a zero timeout so `poll_events` never blocks.

use forge_core::{Error, Result};

use crate::platform::PlatformBackend;

#[cfg(any(
    target_os = "windows",
    target_os = "macos",
    target_os = "android",
    target_os = "linux",
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
))]
pub(crate) fn create_backend() -> Result<Box<dyn PlatformBackend>> {
    Ok(Box::new(pumped::WinitBackend::new()?))
}

#[cfg(not(any(
    target_os = "windows",
    target_os = "macos",
    target_os = "android",
    target_os = "linux",
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
)))]
pub(crate) fn create_backend() -> Result<Box<dyn PlatformBackend>> {
    Err(Error::WindowCreation(format!(
        "no pumpable native event loop on {}",
        std::env::consts::OS
    )))
}

#[cfg(any(
    target_os = "windows",
    target_os = "macos",
    target_os = "android",
    target_os = "linux",
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
))]
mod pumped {
    use std::time::Duration;

    use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
    use tracing::{debug, info};
    use winit::application::ApplicationHandler;
    use winit::dpi::PhysicalSize;
    use winit::event::{MouseScrollDelta, WindowEvent};
    use winit::event_loop::{ActiveEventLoop, EventLoop};
    use winit::keyboard::PhysicalKey;
    use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
    use winit::window::{Window as WinitWindow, WindowAttributes, WindowId};

    use super::{Error, PlatformBackend, Result};
    use crate::event::PlatformEvent;
    use crate::platform::Capabilities;
    use crate::window::{NativeWindow, SurfaceHandle};

    pub(super) struct WinitBackend {
        event_loop: EventLoop<()>,
        capabilities: Capabilities,
    }

    impl WinitBackend {
        pub(super) fn new() -> Result<Self> {
            let mut event_loop = EventLoop::new()
                .map_err(|e| Error::WindowCreation(format!("Failed to create event loop: {}", e)))?;

            // Some platforms only allow window creation after the loop has started.
            let mut startup = Vec::new();
            let status = event_loop.pump_app_events(
                Some(Duration::ZERO),
                &mut EventCollector {
                    events: &mut startup,
                },
            );
            startup_status(status)?;

            Ok(Self {
                event_loop,
                capabilities: probe_capabilities(),
            })
        }
    }

    impl PlatformBackend for WinitBackend {
        fn name(&self) -> &'static str {
            "winit"
        }

        fn capabilities(&self) -> Capabilities {
            self.capabilities
        }

        fn create_window(
            &mut self,
            title: &str,
            width: u32,
            height: u32,
        ) -> Result<Box<dyn NativeWindow>> {
            let attrs = WindowAttributes::default()
                .with_title(title)
                .with_inner_size(PhysicalSize::new(width, height))
                .with_resizable(true)
                .with_visible(false);

            // Windows are created between pumps, outside an ActiveEventLoop callback.
            #[allow(deprecated)]
            let window = self
                .event_loop
                .create_window(attrs)
                .map_err(|e| Error::WindowCreation(e.to_string()))?;

            Ok(Box::new(WinitNativeWindow {
                window: Some(window),
            }))
        }

        fn pump_events(&mut self, events: &mut Vec<PlatformEvent>) {
            let mut collector = EventCollector { events };
            let status = self
                .event_loop
                .pump_app_events(Some(Duration::ZERO), &mut collector);

            if let PumpStatus::Exit(code) = status {
                debug!("Event loop exited with code {}", code);
                collector.events.push(PlatformEvent::CloseRequested);
            }
        }
    }

    /// An event loop that exits while starting up cannot host windows.
    fn startup_status(status: PumpStatus) -> Result<()> {
        match status {
            PumpStatus::Continue => Ok(()),
            PumpStatus::Exit(code) => Err(Error::WindowCreation(format!(
                "event loop exited during startup with code {}",
                code
            ))),
        }
    }

    struct EventCollector<'a> {
        events: &'a mut Vec<PlatformEvent>,
    }

    impl ApplicationHandler for EventCollector<'_> {
        fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

        fn window_event(
            &mut self,
            _event_loop: &ActiveEventLoop,
            _window_id: WindowId,
            event: WindowEvent,
        ) {
            if let Some(event) = translate(event) {
                self.events.push(event);
            }
        }
    }

    fn translate(event: WindowEvent) -> Option<PlatformEvent> {
        match event {
            WindowEvent::CloseRequested => Some(PlatformEvent::CloseRequested),
            WindowEvent::Resized(size) => Some(PlatformEvent::Resized {
                width: size.width,
                height: size.height,
            }),
            WindowEvent::KeyboardInput { event, .. } => match event.physical_key {
                PhysicalKey::Code(key) if event.state.is_pressed() => {
                    Some(PlatformEvent::KeyPressed(key))
                }
                PhysicalKey::Code(key) => Some(PlatformEvent::KeyReleased(key)),
                PhysicalKey::Unidentified(_) => None,
            },
            WindowEvent::CursorMoved { position, .. } => Some(PlatformEvent::MouseMoved {
                x: position.x as f32,
                y: position.y as f32,
            }),
            WindowEvent::MouseInput { state, button, .. } => {
                if state.is_pressed() {
                    Some(PlatformEvent::MousePressed(button.into()))
                } else {
                    Some(PlatformEvent::MouseReleased(button.into()))
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let (dx, dy) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (x, y),
                    MouseScrollDelta::PixelDelta(p) => (p.x as f32, p.y as f32),
                };
                Some(PlatformEvent::Scrolled { dx, dy })
            }
            _ => None,
        }
    }

    fn probe_capabilities() -> Capabilities {
        let apple = cfg!(any(target_os = "macos", target_os = "ios"));

        // SAFETY: loading the Vulkan loader library issues no Vulkan commands and
        // the entry is dropped immediately; only its presence is checked.
        let vulkan = unsafe { ash::Entry::load() }.is_ok();

        if !vulkan {
            info!("No Vulkan loader found");
        }

        Capabilities {
            metal: apple,
            vulkan,
            opengl: !cfg!(target_os = "android"),
        }
    }

    struct WinitNativeWindow {
        window: Option<WinitWindow>,
    }

    impl NativeWindow for WinitNativeWindow {
        fn surface_handle(&self) -> Option<SurfaceHandle> {
            let window = self.window.as_ref()?;
            let window_handle = window.window_handle().ok()?.as_raw();
            let display_handle = window.display_handle().ok()?.as_raw();
            Some(SurfaceHandle::Native {
                window: window_handle,
                display: display_handle,
            })
        }

        fn set_size(&mut self, width: u32, height: u32) {
            if let Some(window) = &self.window {
                let _ = window.request_inner_size(PhysicalSize::new(width, height));
            }
        }

        fn set_visible(&mut self, visible: bool) {
            if let Some(window) = &self.window {
                window.set_visible(visible);
            }
        }

        fn close(&mut self) {
            // Dropping the winit window destroys the OS window.
            self.window = None;
        }
    }

}
