//! Logging setup
//!
//! Console output is compact and target-free. When a log directory is
//! given, every event is also written to `<dir>/vmtest.log` with
//! timestamps and without colors.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use vmtest_engine::LOG_FILE;

/// Environment variable holding the log filter
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

fn filter(debug: bool) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber
pub fn init(log_dir: Option<&Path>, debug: bool) -> Result<()> {
    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let path = dir.join(LOG_FILE);
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter(debug))
        .with(fmt::layer().with_target(false).without_time())
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}
