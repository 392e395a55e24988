//! Construction of concrete renderers.

use forge_core::{RendererConfig, Result};
use forge_rhi::soft::SoftGpu;
use tracing::debug;

use crate::contract::Renderer;
use crate::driver::FrameDriver;
use crate::metal::MetalBackend;
use crate::select::BackendKind;
use crate::vulkan::VulkanBackend;

/// Builds an inert renderer for the selected backend.
///
/// Native driver bindings are provided by implementing this trait; the
/// engine and the frame driver stay unchanged.
pub trait RendererFactory {
    fn create(&mut self, kind: BackendKind, config: &RendererConfig) -> Result<Box<dyn Renderer>>;
}

/// Builds renderers over the software reference device.
#[derive(Debug, Clone, Default)]
pub struct SoftwareFactory {
    gpu: SoftGpu,
}

impl SoftwareFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share `gpu` (and its fault plan) with every renderer built.
    pub fn with_gpu(gpu: SoftGpu) -> Self {
        Self { gpu }
    }

    pub fn gpu(&self) -> &SoftGpu {
        &self.gpu
    }
}

impl RendererFactory for SoftwareFactory {
    fn create(&mut self, kind: BackendKind, config: &RendererConfig) -> Result<Box<dyn Renderer>> {
        debug!(backend = %kind, "Creating software renderer");
        let renderer: Box<dyn Renderer> = match kind {
            BackendKind::Metal => Box::new(FrameDriver::new(
                MetalBackend::new(self.gpu.metal_driver(), config.clone()),
                config.idle_timeout,
            )),
            BackendKind::Vulkan => Box::new(FrameDriver::new(
                VulkanBackend::new(self.gpu.vulkan_driver(), config.clone()),
                config.idle_timeout,
            )),
        };
        Ok(renderer)
    }
}
