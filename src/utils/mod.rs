use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

use crate::config::Settings;
use crate::consts::{ARCH, COMPILER, NAME, OS, VERSION};

pub mod httpdate;
pub mod logging;

pub use httpdate::*;
pub use logging::*;

/// Initialize logging and print the build banner
pub fn initialize_logger(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let guard = init_logger(settings.log_level.as_str(), settings.log_folder.as_str())
        .with_context(|| "Failed to initialize logger")?;
    info!("{}/{}", NAME, VERSION);
    info!("{}", COMPILER);
    info!("OS: {} {}", OS, ARCH);
    debug!("settings {:?}", settings);
    Ok(guard)
}
