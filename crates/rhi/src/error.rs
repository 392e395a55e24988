//! RHI-specific error types.

use std::time::Duration;

use thiserror::Error;

/// Errors reported by a GPU driver.
#[derive(Error, Debug)]
pub enum RhiError {
    /// The graphics API is not present on this system.
    #[error("Graphics API unavailable: {0}")]
    Unavailable(String),

    /// No usable device could be created.
    #[error("Device creation failed: {0}")]
    DeviceCreation(String),

    /// Surface, layer or swapchain creation error
    #[error("Surface error: {0}")]
    SurfaceCreation(String),

    /// The presentation target no longer matches its surface.
    #[error("Presentation target out of date")]
    OutOfDate,

    /// A bounded wait expired.
    #[error("Timed out waiting for {operation} after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The device was lost and cannot execute further work.
    #[error("Device lost: {0}")]
    DeviceLost(String),

    /// Invalid handle error
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// An operation was issued in the wrong order.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

impl From<RhiError> for forge_core::Error {
    fn from(err: RhiError) -> Self {
        use forge_core::Error;

        match err {
            RhiError::Unavailable(_) | RhiError::DeviceCreation(_) | RhiError::SurfaceCreation(_) => {
                Error::BackendInit(err.to_string())
            }
            RhiError::OutOfDate => Error::PresentationTargetStale,
            RhiError::Timeout { operation, timeout } => Error::GpuTimeout { operation, timeout },
            RhiError::DeviceLost(reason) => Error::DeviceLost(reason),
            RhiError::InvalidHandle(_) | RhiError::InvalidState(_) => {
                Error::Render(err.to_string())
            }
        }
    }
}
