//! # Logging
//!
//! Structured logging via `tracing-subscriber`, written to stderr so that the
//! run summary on stdout stays machine-readable.
//!
//! `RUST_LOG` takes precedence over `LOG_LEVEL` when set.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::config::RuntimeConfig;
use crate::constants::LOG_TARGET;

/// Build the log filter: `RUST_LOG` if present, else `<crate>=<LOG_LEVEL>`
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(log_level).into())
}

fn default_directive(log_level: &str) -> String {
    format!("{LOG_TARGET}={}", log_level.trim().to_lowercase())
}

/// Install the global subscriber
///
/// `LOG_FORMAT=json` selects newline-delimited JSON, anything else the
/// human-readable format (with ANSI colors unless `LOG_ENABLE_COLOR=false`).
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &RuntimeConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.log_level))
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = if config.log_format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.with_ansi(config.log_enable_color).try_init()
    };

    result.map_err(|e| anyhow!("Failed to initialize tracing subscriber: {e}"))
}
