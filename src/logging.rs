//! File logging.
//!
//! The terminal belongs to the dashboard, so tracing output goes to a file.

use std::fs::OpenOptions;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Install the global subscriber writing to `settings.file`.
///
/// `RUST_LOG` wins over `settings.level` when set.
pub fn init(settings: &LoggingSettings) -> Result<()> {
    if let Some(parent) = settings.file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create log directory '{}'", parent.display())
            })?;
        }
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&settings.file)
        .with_context(|| format!("failed to open log file '{}'", settings.file.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}
