//! Render Hardware Interface.
//!
//! This crate defines the seams between renderer backends and native
//! graphics APIs:
//! - [`MetalDriver`](metal::MetalDriver) for implicit-sync, layer-based APIs
//! - [`VulkanDriver`](vulkan::VulkanDriver) for explicit-sync, swapchain-based APIs
//! - Backend-neutral command recording and per-frame synchronization
//! - A software reference device ([`soft`]) with fault injection

mod error;

pub mod command;
pub mod handle;
pub mod metal;
pub mod soft;
pub mod sync;
pub mod types;
pub mod vulkan;

pub use error::{RhiError, RhiResult};
