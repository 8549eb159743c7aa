//! Time utilities and constants for Convertly.

use chrono::{DateTime, Duration, Utc};

/// Timing constants.
pub mod constants {
    use super::Duration;

    /// Default lifetime of a cached rate table (5 minutes).
    pub const DEFAULT_CACHE_DURATION_MS: i64 = 300_000;

    /// Default lifetime of a cached rate table.
    pub fn default_cache_duration() -> Duration {
        Duration::milliseconds(DEFAULT_CACHE_DURATION_MS)
    }

    /// Interval between automatic refreshes (5 minutes).
    pub fn refresh_interval() -> Duration {
        Duration::minutes(5)
    }

    /// Countdown tick period (1 second).
    pub fn tick_period() -> std::time::Duration {
        std::time::Duration::from_secs(1)
    }
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Source of the current time.
///
/// Everything that compares against "now" takes a clock so expiry and
/// countdown logic can be driven deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now()
    }
}

/// Clock that only moves when told to.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub struct ManualClock {
    current: parking_lot::Mutex<Timestamp>,
}

#[cfg(any(test, feature = "test-utils"))]
impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: parking_lot::Mutex::new(start),
        }
    }

    /// Create a clock frozen at the current wall time.
    pub fn starting_now() -> Self {
        Self::new(now())
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.current.lock() += by;
    }

    pub fn set(&self, to: Timestamp) {
        *self.current.lock() = to;
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }
}

/// Duration left until `target`, never negative.
pub fn remaining_until(target: Timestamp, now: Timestamp) -> Duration {
    let remaining = target - now;
    if remaining < Duration::zero() {
        Duration::zero()
    } else {
        remaining
    }
}
