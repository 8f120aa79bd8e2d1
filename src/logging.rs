//! Tracing setup for hosts
//!
//! Logs are written to a daily rolling file:
//! - macOS: ~/Library/Application Support/CatalogDispatch/logs/
//! - Windows: %APPDATA%/CatalogDispatch/logs/
//! - Linux: ~/.config/CatalogDispatch/logs/
//!
//! unless `LoggingConfig::directory` points elsewhere. `RUST_LOG` overrides
//! the configured level.

use std::path::PathBuf;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Resolve the directory logs are written to
pub fn log_dir(config: &LoggingConfig) -> PathBuf {
    config.directory.clone().unwrap_or_else(|| {
        dirs::config_dir()
            .map(|dir| dir.join("CatalogDispatch").join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    })
}

/// Install the global subscriber, returning the log directory.
/// Fails if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<PathBuf, TryInitError> {
    let log_dir = log_dir(config);

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, &config.file_prefix);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true);

    let console_layer = config.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    tracing::info!("Log directory: {}", log_dir.display());
    Ok(log_dir)
}
