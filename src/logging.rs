//! Tracing subscriber setup.
//!
//! Console output goes to stderr. When a log file is configured, the same
//! events are appended to it without ANSI colours. `RUST_LOG` overrides the
//! default level.

use crate::error::{Result, SetupError};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SetupError::config(format!("failed to initialise logging: {e}")))?;

    if let Some(path) = log_file {
        tracing::debug!("Logging to {}", path.display());
    }
    Ok(())
}
