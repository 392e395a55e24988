//! Engine and renderer configuration.
//!
//! Configuration is code-only: backend selection comes from platform
//! capability queries, never from here.

use std::time::Duration;

use crate::{Error, Result};

/// Settings shared by every renderer backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Application name reported to the graphics driver.
    pub app_name: String,
    /// Enable driver validation layers.
    pub enable_validation: bool,
    /// Clear color for the main pass (linear RGBA).
    pub clear_color: [f32; 4],
    /// Upper bound for waiting on a presentation target or frame fence.
    pub acquire_timeout: Duration,
    /// Upper bound for the device-idle wait during cleanup and recreation.
    pub idle_timeout: Duration,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "Engine".to_string(),
            enable_validation: cfg!(debug_assertions),
            clear_color: [0.1, 0.1, 0.15, 1.0],
            acquire_timeout: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(2),
        }
    }
}

/// Top-level engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Window title.
    pub title: String,
    /// Initial window width in pixels.
    pub width: u32,
    /// Initial window height in pixels.
    pub height: u32,
    /// Renderer settings.
    pub renderer: RendererConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Engine".to_string(),
            width: 1280,
            height: 720,
            renderer: RendererConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration for the given window, keeping default renderer settings.
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            ..Self::default()
        }
    }

    /// Replace the renderer settings.
    pub fn with_renderer(mut self, renderer: RendererConfig) -> Self {
        self.renderer = renderer;
        self
    }

    /// Check settings that would otherwise make GPU waits unbounded or instant.
    ///
    /// Window dimensions are validated by the platform when the window is created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.renderer.acquire_timeout.is_zero() {
            return Err(Error::Config("acquire_timeout must be non-zero".into()));
        }
        if self.renderer.idle_timeout.is_zero() {
            return Err(Error::Config("idle_timeout must be non-zero".into()));
        }
        Ok(())
    }
}
