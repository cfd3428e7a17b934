//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Fallback level when neither `RUST_LOG` nor `LOG_LEVEL` is set.
pub const DEFAULT_LEVEL: &str = "info";

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = env_filter(std::env::var("LOG_LEVEL").ok());

    // JSON logs + timestamps.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL`, otherwise [`DEFAULT_LEVEL`].
fn env_filter(log_level: Option<String>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        log_level
            .filter(|l| !l.trim().is_empty())
            .and_then(|l| EnvFilter::try_new(l.trim()).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL))
    })
}
