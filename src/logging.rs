//! Subscriber setup for the binary
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the process that embeds it.

use std::fs::File;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Install a global subscriber writing to stdout and, optionally, a file
///
/// `RUST_LOG` takes precedence over `logging.level` when set. The log file
/// is truncated at start and written without ANSI colours.
///
/// # Errors
///
/// Fails on an unparsable level, when the log file cannot be created, or
/// when a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(&config.level)?,
    };

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path).map_err(|e| {
                Error::config(
                    "logging.file",
                    format!("cannot create log file {}: {e}", path.display()),
                )
            })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("failed to install log subscriber: {e}")))
}

fn parse_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| Error::config("logging.level", format!("invalid log level '{level}': {e}")))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_levels_and_directives() {
        for level in ["info", "debug", "warn,asset_bundler=trace"] {
            assert!(parse_filter(level).is_ok(), "{level}");
        }
    }

    #[test]
    fn rejects_garbage_level() {
        match parse_filter("asset_bundler=notalevel").unwrap_err() {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("logging.level")),
            other => panic!("expected Config, got {other:?}"),
        }
    }
}
