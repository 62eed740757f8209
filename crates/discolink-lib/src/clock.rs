//! Time source for debounce, animation pacing, and blocking waits.
//!
//! Everything that sleeps or measures elapsed time goes through [`Clock`] so
//! tests can drive virtual time instead of waiting on the wall clock.

use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;
    /// Block the calling (and only) thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by `std::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock for tests.
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Clock whose time only moves when a test advances it or something sleeps.
    ///
    /// Clones share the same timeline, so a clock handed to several
    /// components stays consistent across all of them.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        origin: Instant,
        offset: Rc<Cell<Duration>>,
        /// Every duration passed to `sleep`, in call order.
        pub sleeps: Rc<RefCell<Vec<Duration>>>,
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ManualClock {
        pub fn new() -> Self {
            ManualClock {
                origin: Instant::now(),
                offset: Rc::new(Cell::new(Duration::ZERO)),
                sleeps: Rc::new(RefCell::new(Vec::new())),
            }
        }

        /// Move virtual time forward without recording a sleep.
        pub fn advance(&self, by: Duration) {
            self.offset.set(self.offset.get() + by);
        }

        /// Total virtual time elapsed since creation.
        pub fn elapsed(&self) -> Duration {
            self.offset.get()
        }

        /// Recorded sleeps equal to `duration`.
        pub fn sleeps_of(&self, duration: Duration) -> usize {
            self.sleeps.borrow().iter().filter(|&&d| d == duration).count()
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + self.offset.get()
        }

        fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
            self.advance(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::ManualClock;
    use super::*;

    #[test]
    fn manual_clock_starts_at_zero_offset() {
        let clock = ManualClock::new();
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn sleep_advances_and_records() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_millis(10));
        clock.sleep(Duration::from_millis(10));
        assert_eq!(clock.now() - start, Duration::from_millis(20));
        assert_eq!(clock.sleeps_of(Duration::from_millis(10)), 2);
    }

    #[test]
    fn advance_does_not_record_sleep() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_secs(1));
        assert!(clock.sleeps.borrow().is_empty());
        assert_eq!(clock.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn clones_share_timeline() {
        let a = ManualClock::new();
        let b = a.clone();
        b.sleep(Duration::from_millis(5));
        assert_eq!(a.now(), b.now());
        assert_eq!(a.sleeps.borrow().len(), 1);
    }
}
