//! Wall clock used for client save timestamps and in-memory store stamps.

use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to. Each read advances it by `step`
/// milliseconds so consecutive stamps stay distinct.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
    step: i64,
}

impl ManualClock {
    #[must_use]
    pub const fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
            step: 0,
        }
    }

    /// A clock that ticks forward by `step` milliseconds on every read.
    #[must_use]
    pub const fn ticking(start_millis: i64, step: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
            step,
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_holds_still_by_default() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.advance(5);
        assert_eq!(clock.now_millis(), 1_005);
        clock.set(42);
        assert_eq!(clock.now_millis(), 42);
    }

    #[test]
    fn ticking_clock_advances_per_read() {
        let clock = ManualClock::ticking(10, 3);
        assert_eq!(clock.now_millis(), 10);
        assert_eq!(clock.now_millis(), 13);
        assert_eq!(clock.now_millis(), 16);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
