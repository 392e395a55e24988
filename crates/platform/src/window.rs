//! Platform-agnostic window.
//!
//! [`Window`] is the stable public shape; the native window behind it is a
//! privately owned [`NativeWindow`] supplied by the platform backend.

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// Opaque handle a renderer uses to create its presentation surface.
///
/// The handle is lent by value for surface creation only; the window that
/// produced it keeps ownership of the native resources.
#[derive(Debug, Clone, Copy)]
pub enum SurfaceHandle {
    /// A real OS window.
    Native {
        window: RawWindowHandle,
        display: RawDisplayHandle,
    },
    /// A window with no OS backing, identified by a platform-local id.
    Headless { id: u64 },
}

/// Native window operations a platform backend provides.
pub trait NativeWindow {
    /// Handle for surface creation, or `None` if the window can no longer provide one.
    fn surface_handle(&self) -> Option<SurfaceHandle>;

    /// Request a new drawable size.
    fn set_size(&mut self, width: u32, height: u32);

    /// Show or hide the window.
    fn set_visible(&mut self, visible: bool);

    /// Destroy the native window. Called at most once.
    fn close(&mut self);
}

/// A window owned by the engine.
pub struct Window {
    native: Box<dyn NativeWindow>,
    title: String,
    width: u32,
    height: u32,
    visible: bool,
    closed: bool,
}

impl Window {
    pub(crate) fn from_native(
        native: Box<dyn NativeWindow>,
        title: &str,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            native,
            title: title.to_string(),
            width,
            height,
            visible: false,
            closed: false,
        }
    }

    /// Get the window title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Get the current width of the window.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Get the current height of the window.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the window is currently shown.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether [`close`](Self::close) has released the native window.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Get the aspect ratio of the window, or 0 while it has no height.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }

    /// Update the window size (call this when handling resize events).
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.closed || (self.width == width && self.height == height) {
            return;
        }
        self.native.set_size(width, height);
        self.width = width;
        self.height = height;
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    /// Show the window.
    pub fn show(&mut self) {
        if self.closed || self.visible {
            return;
        }
        self.native.set_visible(true);
        self.visible = true;
    }

    /// Hide the window.
    pub fn hide(&mut self) {
        if self.closed || !self.visible {
            return;
        }
        self.native.set_visible(false);
        self.visible = false;
    }

    /// Release the native window. Further calls are no-ops.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.native.close();
        self.closed = true;
        self.visible = false;
        tracing::info!("Window '{}' closed", self.title);
    }

    /// Get the handle used for presentation-surface creation.
    ///
    /// Returns `None` once the window is closed.
    pub fn native_handle(&self) -> Option<SurfaceHandle> {
        if self.closed {
            return None;
        }
        self.native.surface_handle()
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("title", &self.title)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("visible", &self.visible)
            .field("closed", &self.closed)
            .finish()
    }
}
