//! Logging setup for the binary.
//!
//! Components log through `tracing` macros and never hold a logger handle.
//! The binary installs one global subscriber here; tests scope their own
//! subscriber around a single component instead.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::error::{Result, SnapshotError};

/// Level used when neither `--log-level` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// SDK internals are noisy at info; only their warnings are interesting.
const QUIET_TARGETS: &[&str] = &[
    "aws_config",
    "aws_smithy_runtime",
    "aws_smithy_runtime_api",
    "aws_sdk_ec2",
    "hyper",
    "hyper_util",
    "rustls",
];

/// Normalise a user-supplied log level.
///
/// # Errors
///
/// Returns a configuration error for anything but trace|debug|info|warn|error.
pub fn normalize_level(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(SnapshotError::config(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        ))),
    }
}

/// Filter directives for `level` with the SDK targets capped at `warn`.
pub fn filter_directives(level: &str) -> Result<String> {
    let level = normalize_level(level)?;
    let mut directives = vec![level.to_string()];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    Ok(directives.join(","))
}

/// Install the global subscriber: `timestamp LEVEL message fields` on stderr.
///
/// `RUST_LOG`, when set and valid, takes precedence over `level`.
///
/// # Errors
///
/// Returns a configuration error when `level` is unsupported or a subscriber
/// is already installed.
pub fn init_logging(level: &str) -> Result<()> {
    let directives = filter_directives(level)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| SnapshotError::config(format!("failed to install logger: {e}")))
}
