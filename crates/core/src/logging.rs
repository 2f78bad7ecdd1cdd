//! Structured logging infrastructure for Baymaster.
//!
//! This module provides centralized logging initialization with support
//! for structured JSON output and environment-based configuration.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter applied when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Initialize the logging system with structured output.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level.
///
/// # Example
/// ```no_run
/// use baymaster_core::logging;
///
/// logging::init();
/// tracing::info!("Coordinator started");
/// ```
pub fn init() {
    init_with_level(DEFAULT_FILTER);
}

/// Initialize plain-text logging with an explicit fallback filter.
pub fn init_with_level(fallback: &str) {
    tracing_subscriber::registry()
        .with(env_filter(fallback))
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

/// Initialize the logging system with JSON output for production environments.
///
/// This format is suitable for log aggregation systems and structured log analysis.
/// Log level can be configured via the `RUST_LOG` environment variable.
///
/// # Example
/// ```no_run
/// use baymaster_core::logging;
///
/// logging::init_json();
/// tracing::info!(base = "outpost-1", "Coordinator started");
/// ```
pub fn init_json() {
    init_json_with_level(DEFAULT_FILTER);
}

/// Initialize JSON logging with an explicit fallback filter.
pub fn init_json_with_level(fallback: &str) {
    tracing_subscriber::registry()
        .with(env_filter(fallback))
        .with(fmt::layer().json().with_target(true).with_thread_ids(true))
        .init();
}
