//! Monotonic virtual clock. `time()` is nanoseconds since the clock was
//! created; `state_time()` subtracts a user-controlled, resettable
//! offset so a re-opened file segment can start at zero.
//!
//! An earlier revision of the reference implementation referenced a
//! `tv_usec` field that does not exist on the clock struct; that branch
//! never fires, so the normalized semantics implemented here are simply
//! "monotonic nanoseconds since init".

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct Clock {
    inner: Arc<Inner>,
}

struct Inner {
    epoch: Instant,
    time_difference: AtomicI64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                epoch: Instant::now(),
                time_difference: AtomicI64::new(0),
            }),
        }
    }

    /// Nanoseconds since this clock was created.
    pub fn time_ns(&self) -> u64 {
        self.inner.epoch.elapsed().as_nanos() as u64
    }

    /// `time() - time_difference`, clamped to zero.
    pub fn state_time_ns(&self) -> u64 {
        let t = self.time_ns() as i64;
        let diff = self.inner.time_difference.load(Ordering::Acquire);
        (t - diff).max(0) as u64
    }

    /// Reset the state-time offset so `state_time_ns()` reads ~0 from
    /// this point on (used when a file segment restarts).
    pub fn reset_state_time(&self) {
        self.inner
            .time_difference
            .store(self.time_ns() as i64, Ordering::Release);
    }

    pub fn add_diff(&self, delta_ns: i64) {
        self.inner.time_difference.fetch_add(delta_ns, Ordering::AcqRel);
    }

    pub fn set_time_difference(&self, diff_ns: i64) {
        self.inner.time_difference.store(diff_ns, Ordering::Release);
    }

    pub fn time_difference_ns(&self) -> i64 {
        self.inner.time_difference.load(Ordering::Acquire)
    }

    /// For logger formatting: `<seconds>.<fraction>` since init.
    pub fn seconds_f64(&self) -> f64 {
        self.time_ns() as f64 / 1_000_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn time_is_monotonic() {
        let clock = Clock::new();
        let a = clock.time_ns();
        sleep(Duration::from_millis(2));
        let b = clock.time_ns();
        assert!(b > a);
    }

    #[test]
    fn reset_state_time_brings_it_near_zero() {
        let clock = Clock::new();
        sleep(Duration::from_millis(5));
        clock.reset_state_time();
        assert!(clock.state_time_ns() < 2_000_000);
    }
}
