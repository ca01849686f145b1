//! Tracing subscriber setup for hosts that do not install their own.

use tracing_subscriber::EnvFilter;

use crate::config::defaults;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, for development.
    #[default]
    Compact,
    /// One JSON object per line, for production/container environments.
    Json,
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing(format: LogFormat) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(defaults::LOG_FILTER));

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .try_init(),
    };

    installed.is_ok()
}
