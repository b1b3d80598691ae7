//! Monotonic clock abstraction.
//!
//! All control timers (valve travel timeout, wash delays, supply-recovery
//! debounce) are polled against a [`Clock`] instead of reading
//! [`Instant::now`] directly, so the state machines can be driven through
//! hours of simulated time in a unit test.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of monotonically increasing time, expressed as the elapsed time
/// since the clock was created.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for tests.  Time only moves when the test calls
/// [`ManualClock::advance`] or [`ManualClock::set`].
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        *self.now.lock().expect("clock poisoned") += delta;
    }

    /// Jump the clock to an absolute offset.
    pub fn set(&self, now: Duration) {
        *self.now.lock().expect("clock poisoned") = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().expect("clock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn manual_clock_moves_only_on_demand() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_secs(29));
        assert_eq!(clock.now(), Duration::from_secs(29));
        clock.set(Duration::from_secs(31));
        assert_eq!(clock.now(), Duration::from_secs(31));
    }
}
