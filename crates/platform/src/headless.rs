//! A platform backend with no OS window system behind it.
//!
//! Used by tests and tools that drive the engine without a display. Events
//! are scripted through a [`HeadlessProbe`], which also reports how many
//! windows were created and released.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use forge_core::{Error, Result};

use crate::event::PlatformEvent;
use crate::platform::{Capabilities, PlatformBackend};
use crate::window::{NativeWindow, SurfaceHandle};

#[derive(Debug, Default)]
struct HeadlessState {
    next_window_id: u64,
    live_windows: HashSet<u64>,
    windows_created: u64,
    windows_released: u64,
    polls: u64,
    pending: Vec<PlatformEvent>,
    close_after_polls: Option<u64>,
    fail_window_creation: bool,
}

/// Platform backend backed by in-memory state.
#[derive(Debug)]
pub struct HeadlessBackend {
    capabilities: Capabilities,
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessBackend {
    /// Create a backend that reports the given capabilities.
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            state: Rc::new(RefCell::new(HeadlessState::default())),
        }
    }

    /// Deliver a close request on the `polls`-th call to `poll_events` (1-based).
    pub fn close_after_polls(self, polls: u64) -> Self {
        self.state.borrow_mut().close_after_polls = Some(polls);
        self
    }

    /// Make every window creation fail.
    pub fn fail_window_creation(self) -> Self {
        self.state.borrow_mut().fail_window_creation = true;
        self
    }

    /// Handle for scripting events and inspecting window bookkeeping.
    pub fn probe(&self) -> HeadlessProbe {
        HeadlessProbe {
            state: Rc::clone(&self.state),
        }
    }
}

impl PlatformBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
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
        let mut state = self.state.borrow_mut();
        if state.fail_window_creation {
            return Err(Error::WindowCreation(format!(
                "headless backend refused window '{}'",
                title
            )));
        }

        state.next_window_id += 1;
        let id = state.next_window_id;
        state.live_windows.insert(id);
        state.windows_created += 1;

        Ok(Box::new(HeadlessWindow {
            id,
            size: (width, height),
            visible: false,
            state: Rc::clone(&self.state),
        }))
    }

    fn pump_events(&mut self, events: &mut Vec<PlatformEvent>) {
        let mut state = self.state.borrow_mut();
        state.polls += 1;
        events.append(&mut state.pending);

        if state.close_after_polls == Some(state.polls) {
            events.push(PlatformEvent::CloseRequested);
        }
    }
}

/// Shared view into a [`HeadlessBackend`] after it has been moved into a platform.
#[derive(Debug, Clone)]
pub struct HeadlessProbe {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessProbe {
    /// Queue events for the next `poll_events` call.
    pub fn push_events(&self, events: impl IntoIterator<Item = PlatformEvent>) {
        self.state.borrow_mut().pending.extend(events);
    }

    /// Toggle window-creation failure.
    pub fn set_fail_window_creation(&self, fail: bool) {
        self.state.borrow_mut().fail_window_creation = fail;
    }

    pub fn windows_created(&self) -> u64 {
        self.state.borrow().windows_created
    }

    pub fn windows_released(&self) -> u64 {
        self.state.borrow().windows_released
    }

    /// Windows created and not yet closed.
    pub fn live_windows(&self) -> usize {
        self.state.borrow().live_windows.len()
    }

    /// Number of `poll_events` calls so far.
    pub fn polls(&self) -> u64 {
        self.state.borrow().polls
    }
}

struct HeadlessWindow {
    id: u64,
    size: (u32, u32),
    visible: bool,
    state: Rc<RefCell<HeadlessState>>,
}

impl NativeWindow for HeadlessWindow {
    fn surface_handle(&self) -> Option<SurfaceHandle> {
        Some(SurfaceHandle::Headless { id: self.id })
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn close(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.live_windows.remove(&self.id) {
            state.windows_released += 1;
        }
        tracing::debug!(
            "Headless window {} released ({}x{}, visible: {})",
            self.id,
            self.size.0,
            self.size.1,
            self.visible
        );
    }
}
