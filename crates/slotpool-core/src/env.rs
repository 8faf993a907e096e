//! Environment variable utilities
//!
//! Used by `PoolConfig::from_env()` to apply `SLOTPOOL_*` overrides on top of
//! compiled-in defaults. A variable that is unset or fails to parse falls
//! back to the default silently.
//!
//! ```ignore
//! use slotpool_core::env::{env_get, env_get_bool, env_get_millis};
//!
//! let capacity: usize = env_get("SLOTPOOL_BATCH_CAPACITY", 1024);
//! let batch = env_get_bool("SLOTPOOL_BATCH", false);
//! let grace = env_get_millis("SLOTPOOL_SHUTDOWN_GRACE_MS", 1000);
//! ```

use std::str::FromStr;
use std::time::Duration;

/// Get environment variable parsed as type T, or return default
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// "1", "true", "yes", "on" (case-insensitive) are true; "0", "false",
/// "no", "off" are false. Anything else, or unset, returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get a millisecond count as a `Duration`
#[inline]
pub fn env_get_millis(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_get(key, default_ms))
}

/// Get a microsecond count as a `Duration`
#[inline]
pub fn env_get_micros(key: &str, default_us: u64) -> Duration {
    Duration::from_micros(env_get(key, default_us))
}
