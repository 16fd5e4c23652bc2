//! Setup for the application's tracing subscriber.
//!
//! Redirects tracing output to stdout at the verbosity configured by
//! `log_level`. Lifecycle events (startup, shutdown, worker spawn/stop) are
//! logged at `INFO`; per-datagram handling is logged, if at all, at `DEBUG`
//! or below, so that steady-state operation at the default level produces no
//! output per request.
use std::sync::Once;

use tracing::level_filters::LevelFilter;

static INIT: Once = Once::new();

/// Initializes the global tracing subscriber exactly once. Subsequent calls
/// are no-ops, which keeps this safe to call from both `main` and tests.
///
/// # Panics
///
/// Panics if `log_level` is not one of `off`, `error`, `warn`, `info`,
/// `debug`, or `trace` (case-insensitive).
pub fn init(log_level: &str) {
    let filter = parse_level(log_level);

    if filter == LevelFilter::OFF {
        return;
    }

    INIT.call_once(|| {
        tracing_subscriber::fmt().with_max_level(filter).init();
    });
}

fn parse_level(log_level: &str) -> LevelFilter {
    log_level.parse().unwrap_or_else(|_| {
        panic!(
            "unrecognized log_level {log_level:?}; expected one of: off, error, warn, info, debug, trace"
        )
    })
}
