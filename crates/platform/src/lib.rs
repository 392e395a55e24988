//! Platform abstraction layer for the forge engine.
//!
//! This crate provides platform-specific functionality:
//! - The [`Platform`] context: event pumping, window factory, capability queries
//! - [`Window`] with an opaque [`SurfaceHandle`] for presentation surfaces
//! - Input handling (keyboard, mouse)
//! - A native backend (winit) and a [`HeadlessBackend`] for display-less runs

mod event;
mod headless;
mod input;
mod native;
mod platform;
mod window;

pub use event::PlatformEvent;
pub use headless::{HeadlessBackend, HeadlessProbe};
pub use input::{InputState, KeyCode, MouseButton};
pub use platform::{Capabilities, Platform, PlatformBackend};
pub use window::{NativeWindow, SurfaceHandle, Window};
