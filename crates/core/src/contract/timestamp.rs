//! Nanosecond timestamps
//!
//! Timestamps are nanoseconds since Unix epoch, taken from the system clock.
//! The system clock may step backwards (NTP adjustment) and two reads in a
//! tight loop may return the same value, so [`NanoClock`] clamps its
//! readings to be strictly increasing for the lifetime of the clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Read the system clock as nanoseconds since Unix epoch
///
/// Returns 0 if the system clock is before Unix epoch.
pub fn wall_clock_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// Strictly increasing nanosecond clock
///
/// ## Invariants
///
/// - Every call to [`NanoClock::now_ns`] returns a value greater than any
///   value previously returned by the same clock
/// - Readings track the wall clock whenever it moves forward
#[derive(Debug, Default)]
pub struct NanoClock {
    last: AtomicU64,
}

impl NanoClock {
    /// Create a new clock
    pub const fn new() -> Self {
        NanoClock {
            last: AtomicU64::new(0),
        }
    }

    /// Current time in nanoseconds, strictly greater than the previous reading
    pub fn now_ns(&self) -> u64 {
        let wall = wall_clock_ns();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}
