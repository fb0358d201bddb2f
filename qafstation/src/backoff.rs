//! Exponential backoff for sink reconnection.

use std::time::Duration;

use crate::constants::{BACKOFF_INITIAL, BACKOFF_MAX};

/// Delay calculator for reconnection attempts.
///
/// The delay starts at [`BACKOFF_INITIAL`], doubles on every failed
/// attempt and never exceeds [`BACKOFF_MAX`]. A successful attempt
/// resets it. No clocks in here; the scheduler owns the timestamps.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    delay: Duration,
}

impl ReconnectBackoff {
    pub fn new() -> Self {
        Self {
            delay: BACKOFF_INITIAL,
        }
    }

    /// Delay to honor before the next attempt.
    pub fn current(&self) -> Duration {
        self.delay
    }

    /// Register a failed attempt, doubling the delay up to the cap.
    pub fn advance(&mut self) {
        self.delay = (self.delay * 2).min(BACKOFF_MAX);
    }

    /// Register a successful attempt.
    pub fn reset(&mut self) {
        self.delay = BACKOFF_INITIAL;
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_capped() {
        let mut backoff = ReconnectBackoff::new();
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(backoff.current().as_secs());
            backoff.advance();
        }
        assert_eq!(seen, vec![10, 20, 40, 60, 60]);
    }

    #[test]
    fn test_delay_is_non_decreasing_across_failures() {
        let mut backoff = ReconnectBackoff::new();
        let mut previous = backoff.current();
        for _ in 0..10 {
            backoff.advance();
            assert!(backoff.current() >= previous);
            assert!(backoff.current() <= BACKOFF_MAX);
            previous = backoff.current();
        }
    }

    #[test]
    fn test_reset_restores_initial_delay() {
        let mut backoff = ReconnectBackoff::new();
        backoff.advance();
        backoff.advance();
        assert_eq!(backoff.current().as_secs(), 40);
        backoff.reset();
        assert_eq!(backoff.current(), BACKOFF_INITIAL);
    }
}
