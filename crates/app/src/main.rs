//! forge - entry point.
//!
//! Opens the default window on the native platform and renders until it is
//! closed. Exits with 0 on a clean shutdown and 1 if initialization fails or
//! a fatal error ends the run.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info};

use forge_core::EngineConfig;
use forge_engine::Engine;
use forge_platform::Platform;

fn try_main() -> Result<()> {
    let platform = Platform::native().context("Failed to start the native platform")?;
    info!(
        "Running on {} {} ({} build)",
        Platform::os_name(),
        Platform::os_version().unwrap_or_default(),
        if Platform::is_debug_mode() { "debug" } else { "release" }
    );

    let config = EngineConfig::default();
    let mut engine = Engine::new(&platform);
    engine
        .initialize_with(&config)
        .context("Failed to initialize engine")?;

    let result = engine.run();
    engine.shutdown();

    let summary = result.context("Render loop ended with a fatal error")?;
    info!(
        "Presented {} frames ({} skipped) in {:.2?}, {:.1} fps average",
        summary.presented,
        summary.skipped,
        summary.elapsed,
        summary.average_fps()
    );
    Ok(())
}

fn main() -> ExitCode {
    forge_core::init_logging();

    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
