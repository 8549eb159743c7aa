//! Countdown to the next automatic refresh.

use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;
use tracing::debug;

use convertly_common::time::{constants, remaining_until};
use convertly_common::{Clock, Timestamp};

/// A single countdown bound to an absolute target time.
///
/// The target fires once: [`tick`](Self::tick) reports expiry a single time
/// and then stays quiet until the scheduler is armed again.
pub struct RefreshScheduler {
    clock: Arc<dyn Clock>,
    interval: Duration,
    target: Mutex<Option<Timestamp>>,
}

impl RefreshScheduler {
    /// Create a scheduler with the default 5 minute interval.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_interval(clock, constants::refresh_interval())
    }

    pub fn with_interval(clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            clock,
            interval,
            target: Mutex::new(None),
        }
    }

    /// Target one interval from now.
    pub fn arm(&self) -> Timestamp {
        let target = self.clock.now() + self.interval;
        self.arm_at(target);
        target
    }

    /// Target an explicit time.
    pub fn arm_at(&self, target: Timestamp) {
        debug!(next_refresh = %target, "Refresh scheduled");
        *self.target.lock() = Some(target);
    }

    pub fn disarm(&self) {
        *self.target.lock() = None;
    }

    /// Current target, if armed.
    pub fn next_refresh_time(&self) -> Option<Timestamp> {
        *self.target.lock()
    }

    /// Time left until the target; zero when unarmed or already due.
    pub fn time_left(&self) -> Duration {
        match self.next_refresh_time() {
            Some(target) => remaining_until(target, self.clock.now()),
            None => Duration::zero(),
        }
    }

    /// Check the countdown. Returns `true` exactly once per armed target,
    /// when the target has been reached.
    pub fn tick(&self) -> bool {
        let mut target = self.target.lock();
        match *target {
            Some(due) if self.clock.now() >= due => {
                *target = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convertly_common::ManualClock;

    fn setup() -> (Arc<ManualClock>, RefreshScheduler) {
        let clock = Arc::new(ManualClock::starting_now());
        let scheduler = RefreshScheduler::new(clock.clone());
        (clock, scheduler)
    }

    #[test]
    fn test_unarmed_never_fires() {
        let (clock, scheduler) = setup();
        clock.advance(Duration::hours(1));

        assert!(!scheduler.tick());
        assert_eq!(scheduler.time_left(), Duration::zero());
    }

    #[test]
    fn test_fires_once_at_target() {
        let (clock, scheduler) = setup();
        let target = scheduler.arm();

        assert_eq!(target, clock.now() + Duration::minutes(5));
        assert_eq!(scheduler.time_left(), Duration::minutes(5));

        clock.advance(Duration::minutes(5) - Duration::seconds(1));
        assert!(!scheduler.tick());
        assert_eq!(scheduler.time_left(), Duration::seconds(1));

        clock.advance(Duration::seconds(1));
        assert!(scheduler.tick());
        assert!(!scheduler.tick());
        assert!(scheduler.next_refresh_time().is_none());
    }

    #[test]
    fn test_arm_at_past_target_fires_immediately() {
        let (clock, scheduler) = setup();
        scheduler.arm_at(clock.now() - Duration::seconds(10));

        assert!(scheduler.tick());
    }

    #[test]
    fn test_rearm_replaces_target() {
        let (clock, scheduler) = setup();
        scheduler.arm();

        clock.advance(Duration::minutes(4));
        scheduler.arm();

        clock.advance(Duration::minutes(2));
        assert!(!scheduler.tick());
        assert_eq!(scheduler.time_left(), Duration::minutes(3));
    }

    #[test]
    fn test_disarm() {
        let (clock, scheduler) = setup();
        scheduler.arm();
        scheduler.disarm();

        clock.advance(Duration::minutes(10));
        assert!(!scheduler.tick());
    }
}
