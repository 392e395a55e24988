//! Engine orchestration.
//!
//! [`Engine`] ties a [`Platform`](forge_platform::Platform) window to a
//! renderer chosen from the platform's capabilities, and runs the
//! poll-render loop until the platform asks to close.

mod engine;

pub use engine::{Engine, RunSummary, StopHandle};
