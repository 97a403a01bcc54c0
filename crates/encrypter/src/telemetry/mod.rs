//! Tracing subscriber setup for processes embedding the encrypter.
//!
//! # Telemetry invariants
//!
//! - **No plaintext or key material** may appear in any span or log field.
//!   Key ids, IV lengths, payload sizes and key bit lengths are fine.
//! - `ENCRYPTION_LOG_LEVEL` (default: `info`) applies to the `encrypter` and
//!   `envelope` targets only. Everything else, the AWS SDK included, logs at
//!   `warn`. `RUST_LOG` replaces these directives when set.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Crates whose events follow the configured level.
const TARGETS: [&str; 2] = ["encrypter", "envelope"];

/// Filter directives for `log_level`, e.g. `warn,encrypter=debug,envelope=debug`.
pub fn directives(log_level: &str) -> String {
    let level = log_level.trim();
    TARGETS
        .iter()
        .fold(String::from("warn"), |acc, target| format!("{acc},{target}={level}"))
}

/// Build the filter for `log_level`, ignoring `RUST_LOG`.
///
/// # Errors
///
/// Returns an error if `log_level` is not a valid level.
pub fn filter_for(log_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives(log_level))
        .with_context(|| format!("invalid log level `{log_level}`"))
}

/// Install a JSON-formatted global subscriber at `log_level`.
///
/// # Errors
///
/// Returns an error if `log_level` is invalid or a global subscriber has
/// already been set.
pub fn init(log_level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_for(log_level)?,
    };

    tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install encrypter log subscriber: {e}"))
}
