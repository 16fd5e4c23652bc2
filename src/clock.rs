//! A clock abstraction so that time-dependent behaviour (connection-ID
//! windowing, peer expiry) can be frozen and advanced deterministically in
//! tests instead of depending on the real wall clock.
//!
//! Production code runs against [`Working`], which reads [`SystemTime::now`].
//! Tests run against [`Stopped`], a thread-local fake clock that starts at
//! the Unix epoch and only moves when explicitly advanced.

use std::cell::Cell;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type DurationSinceUnixEpoch = Duration;

/// Something that can report "now" as a duration since the Unix epoch.
pub trait Time {
    fn now() -> DurationSinceUnixEpoch;
}

/// The production clock: wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct Working;

impl Time for Working {
    fn now() -> DurationSinceUnixEpoch {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO)
    }
}

thread_local! {
    static STOPPED_AT: Cell<Duration> = const { Cell::new(Duration::ZERO) };
}

/// A fake clock for tests. Starts at the Unix epoch; advance it with
/// [`Stopped::advance`] or pin it with [`Stopped::set`].
#[derive(Debug, Clone, Copy)]
pub struct Stopped;

impl Time for Stopped {
    fn now() -> DurationSinceUnixEpoch {
        STOPPED_AT.with(|cell| cell.get())
    }
}

impl Stopped {
    pub fn set(at: Duration) {
        STOPPED_AT.with(|cell| cell.set(at));
    }

    pub fn advance(by: Duration) {
        STOPPED_AT.with(|cell| cell.set(cell.get() + by));
    }
}

#[cfg(not(test))]
pub type CurrentClock = Working;

#[cfg(test)]
pub type CurrentClock = Stopped;
