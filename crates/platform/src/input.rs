//! Input handling for keyboard and mouse.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

use crate::event::PlatformEvent;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Left,
        }
    }
}

/// Keyboard and mouse state as of the last `poll_events` batch.
///
/// "Just pressed" sets only cover the most recent batch; they are cleared by
/// [`begin_batch`](Self::begin_batch) before the next one is applied.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,
    just_released_keys: HashSet<KeyCode>,

    pressed_buttons: HashSet<MouseButton>,
    just_pressed_buttons: HashSet<MouseButton>,

    mouse_position: (f32, f32),
    mouse_delta: (f32, f32),
    scroll_delta: (f32, f32),
}

impl InputState {
    /// Create a new input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-batch state. Held keys and buttons stay held.
    pub fn begin_batch(&mut self) {
        self.just_pressed_keys.clear();
        self.just_released_keys.clear();
        self.just_pressed_buttons.clear();
        self.mouse_delta = (0.0, 0.0);
        self.scroll_delta = (0.0, 0.0);
    }

    /// Fold one platform event into the state.
    pub fn apply(&mut self, event: &PlatformEvent) {
        match *event {
            PlatformEvent::KeyPressed(key) => {
                if self.pressed_keys.insert(key) {
                    self.just_pressed_keys.insert(key);
                }
            }
            PlatformEvent::KeyReleased(key) => {
                if self.pressed_keys.remove(&key) {
                    self.just_released_keys.insert(key);
                }
            }
            PlatformEvent::MousePressed(button) => {
                if self.pressed_buttons.insert(button) {
                    self.just_pressed_buttons.insert(button);
                }
            }
            PlatformEvent::MouseReleased(button) => {
                self.pressed_buttons.remove(&button);
            }
            PlatformEvent::MouseMoved { x, y } => {
                let (old_x, old_y) = self.mouse_position;
                self.mouse_position = (x, y);
                self.mouse_delta.0 += x - old_x;
                self.mouse_delta.1 += y - old_y;
            }
            PlatformEvent::Scrolled { dx, dy } => {
                self.scroll_delta.0 += dx;
                self.scroll_delta.1 += dy;
            }
            PlatformEvent::CloseRequested | PlatformEvent::Resized { .. } => {}
        }
    }

    /// Check if a key is currently pressed.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// Check if a key was pressed during the last batch.
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    /// Check if a key was released during the last batch.
    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.just_released_keys.contains(&key)
    }

    /// Check if a mouse button is currently pressed.
    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// Check if a mouse button was pressed during the last batch.
    pub fn is_mouse_just_pressed(&self, button: MouseButton) -> bool {
        self.just_pressed_buttons.contains(&button)
    }

    /// Get the current mouse position.
    pub fn mouse_position(&self) -> (f32, f32) {
        self.mouse_position
    }

    /// Mouse movement accumulated over the last batch.
    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }

    /// Scroll accumulated over the last batch.
    pub fn scroll_delta(&self) -> (f32, f32) {
        self.scroll_delta
    }
}
