//! Time source for sampling loops.

use std::time::{Duration, Instant};

/// Monotonic clock that can also wait.
pub trait Clock: Send {
    /// Time elapsed since the clock was created
    fn now(&self) -> Duration;

    /// Block for `duration`
    fn sleep(&mut self, duration: Duration);
}

/// Wall-clock time via [`Instant`] and `thread::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only advances when slept on.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualClock {
    now: Duration,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without sleeping
    pub fn advance(&mut self, duration: Duration) {
        self.now += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.now += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_on_sleep() {
        let mut clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.sleep(Duration::from_millis(500));
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), Duration::from_millis(750));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
