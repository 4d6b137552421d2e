//! Wall-clock source for the registry.
//!
//! Every clock computation in a [`Match`](crate::Match) takes `now` as an
//! argument; the registry reads it from a [`TimeSource`] so tests can drive
//! time explicitly.

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
pub trait TimeSource: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Milliseconds from `earlier` to `later`, never negative.
#[must_use]
pub fn elapsed_ms(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_milliseconds().max(0)
}
