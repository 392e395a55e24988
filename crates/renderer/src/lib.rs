//! Backend-independent rendering.
//!
//! This crate defines the [`Renderer`] contract the engine drives and the
//! pieces behind it:
//! - The frame lifecycle state machine ([`FrameState`])
//! - [`FrameDriver`], which sequences any [`GpuBackend`] through a frame
//! - Metal-style and Vulkan-style backend adapters
//! - Backend selection and the [`RendererFactory`] seam

mod backend;
mod contract;
mod driver;
mod factory;
mod select;
mod state;

pub mod frame;
pub mod metal;
pub mod vulkan;

pub use backend::{Acquired, CommandBufferLifetime, GpuBackend, PresentStatus};
pub use contract::{FrameOutcome, Renderer, SkipReason};
pub use driver::FrameDriver;
pub use factory::{RendererFactory, SoftwareFactory};
pub use forge_rhi::sync::MAX_FRAMES_IN_FLIGHT;
pub use select::{BackendKind, select_backend};
pub use state::FrameState;
