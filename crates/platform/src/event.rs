//! Events produced by a platform backend during `poll_events`.

use crate::input::{KeyCode, MouseButton};

/// A platform event, already translated out of the native event loop's types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlatformEvent {
    /// The user or OS asked the application to close.
    CloseRequested,
    /// A window's drawable area changed size.
    Resized { width: u32, height: u32 },
    KeyPressed(KeyCode),
    KeyReleased(KeyCode),
    /// Cursor position in physical pixels.
    MouseMoved { x: f32, y: f32 },
    MousePressed(MouseButton),
    MouseReleased(MouseButton),
    Scrolled { dx: f32, dy: f32 },
}
