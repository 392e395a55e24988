//! Backend selection from platform capabilities.

use std::fmt;

use forge_core::{Error, Result};
use forge_platform::Capabilities;

/// The backend families the engine can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Implicit-sync, tile-based-deferred-capable.
    Metal,
    /// Explicit-sync, swapchain-based.
    Vulkan,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Metal => "Metal",
            BackendKind::Vulkan => "Vulkan",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pick the backend for the reported capabilities. Metal wins when both are
/// available.
pub fn select_backend(capabilities: &Capabilities) -> Result<BackendKind> {
    if capabilities.metal {
        Ok(BackendKind::Metal)
    } else if capabilities.vulkan {
        Ok(BackendKind::Vulkan)
    } else {
        Err(Error::BackendInit(
            "platform reports no supported graphics backend".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metal_preferred() {
        assert_eq!(
            select_backend(&Capabilities::ALL).unwrap(),
            BackendKind::Metal
        );
    }

    #[test]
    fn test_vulkan_fallback() {
        let caps = Capabilities {
            vulkan: true,
            ..Capabilities::NONE
        };
        assert_eq!(select_backend(&caps).unwrap(), BackendKind::Vulkan);
    }

    #[test]
    fn test_opengl_alone_is_not_enough() {
        let caps = Capabilities {
            opengl: true,
            ..Capabilities::NONE
        };
        assert!(matches!(
            select_backend(&caps),
            Err(Error::BackendInit(_))
        ));
    }
}
