// src/network/backoff.rs
//! Capped exponential backoff for pool reconnects

use std::time::Duration;

/// First retry delay after a failure
pub const INITIAL_DELAY: Duration = Duration::from_millis(1_000);

/// Ceiling for the retry delay
pub const MAX_DELAY: Duration = Duration::from_secs(5 * 60);

/// Growth factor between consecutive delays
pub const GROWTH_RATE: f64 = std::f64::consts::E;

/// Exponential backoff state: `delay(n) = min(delay(n - 1) * e, max)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    current: Duration,
    initial: Duration,
    max: Duration,
    growth: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new(INITIAL_DELAY, MAX_DELAY, GROWTH_RATE)
    }
}

impl Backoff {
    /// Creates a backoff with explicit parameters
    pub fn new(initial: Duration, max: Duration, growth: f64) -> Self {
        Backoff {
            current: initial,
            initial,
            max,
            growth,
        }
    }

    /// Delay the next retry should wait
    pub fn current(&self) -> Duration {
        self.current
    }

    /// The ceiling
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Returns the delay to wait now and grows the next one
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.growth).min(self.max);
        delay
    }

    /// Back to the initial delay
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_by_e_and_caps() {
        let mut backoff = Backoff::default();
        let mut previous = backoff.next_delay();
        assert_eq!(previous, INITIAL_DELAY);

        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay >= previous, "backoff must never shrink");
            assert!(delay <= MAX_DELAY);
            let expected = previous.mul_f64(GROWTH_RATE).min(MAX_DELAY);
            assert_eq!(delay, expected);
            previous = delay;
        }
        assert_eq!(previous, MAX_DELAY);
    }

    #[test]
    fn reset_returns_to_initial() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        assert!(backoff.current() > INITIAL_DELAY);
        backoff.reset();
        assert_eq!(backoff.current(), INITIAL_DELAY);
    }
}
