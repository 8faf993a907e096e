//! Tracing subscriber setup for binaries and tests
//!
//! The library itself only emits `tracing` events. Call `init()` once from
//! `main` to print them. Filter priority: `SLOTPOOL_LOG` > `RUST_LOG` > `info`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Env var checked before `RUST_LOG`
pub const LOG_ENV: &str = "SLOTPOOL_LOG";

const DEFAULT_FILTER: &str = "info";

/// Install a global fmt subscriber.
///
/// Returns `false` if a global subscriber was already set, so calling it
/// from several tests is harmless.
pub fn init() -> bool {
    tracing_subscriber::registry()
        .with(fmt::layer().with_thread_names(true))
        .with(filter())
        .try_init()
        .is_ok()
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
