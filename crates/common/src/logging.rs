//! Logging utilities for the poller components.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Build the env filter used by every subscriber.
///
/// The RUST_LOG environment variable takes precedence over `default_level`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize tracing with human-readable output.
pub fn init(default_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(env_filter(default_level))
        .init();
}

/// Initialize tracing with JSON formatting (useful for structured logging).
pub fn init_json(default_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(env_filter(default_level))
        .init();
}
