//! Environment overrides
//!
//! Benchmark scripts drive the servers through env vars as often as flags
//! (`HTTPBENCH_PORT=9000 make bench-reactor`). These helpers parse them.

use std::str::FromStr;

/// Listening port override.
pub const ENV_PORT: &str = "HTTPBENCH_PORT";
/// Worker count override.
pub const ENV_WORKERS: &str = "HTTPBENCH_WORKERS";
/// Let `GET /shutdown` stop the process.
pub const ENV_ALLOW_SHUTDOWN: &str = "HTTPBENCH_ALLOW_SHUTDOWN";
/// env_logger filter.
pub const ENV_LOG: &str = "HTTPBENCH_LOG";

/// Parse `key` as `T` if it is set and valid.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// "1", "true", "yes", "on" (any case) are true; other values are false;
/// unset yields `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
