//! Error types for the engine.

use std::time::Duration;

use thiserror::Error;

/// Main error type shared by every forge crate.
///
/// The variants follow how far a failure is allowed to travel:
/// `PresentationTargetStale` never leaves a renderer, `WindowCreation` and
/// `BackendInit` abort initialization, `Usage` is reported without touching
/// state, and `DeviceLost` / `GpuTimeout` end the session.
#[derive(Error, Debug)]
pub enum Error {
    /// The native window or its surface could not be created.
    #[error("Window creation error: {0}")]
    WindowCreation(String),

    /// No supported graphics backend, or device/queue/surface creation failed.
    #[error("Backend initialization error: {0}")]
    BackendInit(String),

    /// The presentation target no longer matches the surface and must be rebuilt.
    #[error("Presentation target is stale")]
    PresentationTargetStale,

    /// An operation was invoked in a state that does not allow it.
    #[error("Usage error: {0}")]
    Usage(String),

    /// The GPU context was invalidated (driver reset, disconnection).
    #[error("Device lost: {0}")]
    DeviceLost(String),

    /// A bounded GPU wait expired.
    #[error("GPU did not finish {operation} within {timeout:?}")]
    GpuTimeout {
        /// The operation that was being waited on.
        operation: &'static str,
        /// The timeout that expired.
        timeout: Duration,
    },

    /// A single frame failed for a recoverable reason.
    #[error("Render error: {0}")]
    Render(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true when the session cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DeviceLost(_) | Error::GpuTimeout { .. })
    }
}

/// Result type alias using the engine's Error type.
pub type Result<T> = std::result::Result<T, Error>;
