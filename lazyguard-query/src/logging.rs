//! Logging bootstrap for the guards.
//!
//! Guard decisions are reported through `tracing`: denials at `debug`,
//! allowed accesses at `trace`, installation at `info`. Nothing is printed
//! unless a subscriber is installed, either by the application or by
//! [`init`] (feature `tracing-subscriber`).
//!
//! # Environment Variables
//!
//! - `LAZYGUARD_DEBUG=true|1|yes` - Enable debug logging
//! - `LAZYGUARD_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `LAZYGUARD_LOG_FORMAT=json|pretty|compact` - Output format (default: pretty)
//!
//! ```rust,no_run
//! lazyguard_query::logging::init();
//! ```

use std::env;
use std::sync::Once;

/// Environment variable enabling debug output.
pub const ENV_DEBUG: &str = "LAZYGUARD_DEBUG";
/// Environment variable selecting the log level.
pub const ENV_LOG_LEVEL: &str = "LAZYGUARD_LOG_LEVEL";
/// Environment variable selecting the output format.
pub const ENV_LOG_FORMAT: &str = "LAZYGUARD_LOG_FORMAT";

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `LAZYGUARD_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var(ENV_DEBUG).map(|v| is_truthy(&v)).unwrap_or(false)
}

/// Get the configured log level.
///
/// Defaults to "debug" if `LAZYGUARD_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    resolve_level(env::var(ENV_LOG_LEVEL).ok().as_deref(), is_debug_enabled())
}

/// Get the configured log format.
pub fn get_log_format() -> &'static str {
    resolve_format(env::var(ENV_LOG_FORMAT).ok().as_deref())
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn resolve_level(requested: Option<&str>, debug: bool) -> &'static str {
    let fallback = if debug { "debug" } else { "warn" };
    match requested.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => fallback,
    }
}

fn resolve_format(requested: Option<&str>) -> &'static str {
    match requested.map(str::to_lowercase).as_deref() {
        Some("json") => "json",
        Some("compact") => "compact",
        _ => "pretty",
    }
}

/// Install a global subscriber for lazyguard's events.
///
/// Subsequent calls are no-ops. Does nothing unless `LAZYGUARD_DEBUG` or
/// `LAZYGUARD_LOG_LEVEL` is set.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var(ENV_LOG_LEVEL).is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!(
                "lazyguard={},lazyguard_query={},lazyguard_schema={}",
                level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            let result = match get_log_format() {
                "json" => registry.with(fmt::layer().json()).try_init(),
                "compact" => registry.with(fmt::layer().compact()).try_init(),
                _ => registry.with(fmt::layer().pretty()).try_init(),
            };

            if result.is_ok() {
                tracing::info!(level, format = get_log_format(), "lazyguard logging initialized");
            }
        }
    });
}
