//! Core utilities for the forge engine.
//!
//! This crate provides foundational types used across the engine:
//! - Error taxonomy and result alias
//! - Logging initialization
//! - Engine and renderer configuration
//! - Frame accounting for the run loop

mod config;
mod error;
mod logging;
mod timer;

pub use config::{EngineConfig, RendererConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::{FrameClock, FrameSummary};
