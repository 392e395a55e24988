//! Frame lifecycle state machine.

use std::fmt;

/// Where a renderer is in its lifecycle.
///
/// ```text
/// Uninitialized -> Ready -> (Recording -> Submitted -> Presented -> Ready)* -> Cleaned
/// ```
///
/// A skipped frame returns to `Ready` from wherever it stopped. A lost device
/// moves to `Lost`, which only `cleanup` leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameState {
    Uninitialized,
    Ready,
    Recording,
    Submitted,
    Presented,
    Cleaned,
    Lost,
}

impl FrameState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: FrameState) -> bool {
        use FrameState::*;

        matches!(
            (self, next),
            (Uninitialized, Ready)
                | (Cleaned, Ready)
                | (Ready, Recording)
                | (Ready, Cleaned)
                | (Ready, Lost)
                | (Recording, Submitted)
                | (Recording, Ready)
                | (Recording, Lost)
                | (Submitted, Presented)
                | (Submitted, Ready)
                | (Submitted, Lost)
                | (Presented, Ready)
                | (Lost, Cleaned)
        )
    }

    /// GPU resources are held.
    pub fn holds_resources(self) -> bool {
        !matches!(self, FrameState::Uninitialized | FrameState::Cleaned)
    }

    /// A frame can be started.
    pub fn is_ready(self) -> bool {
        self == FrameState::Ready
    }
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
