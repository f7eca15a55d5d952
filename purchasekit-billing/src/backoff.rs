//! Reconnection backoff.

use std::time::Duration;

/// Exponential delay between reconnection attempts.
///
/// Each call to [`next_delay`](Self::next_delay) hands out the current delay
/// and doubles it for the following attempt, clamped at the maximum. A
/// successful connection calls [`reset`](Self::reset).
///
/// # Example
///
/// ```rust
/// use purchasekit_billing::ReconnectBackoff;
/// use std::time::Duration;
///
/// let mut backoff = ReconnectBackoff::new(Duration::from_secs(1), Duration::from_secs(3));
/// assert_eq!(backoff.next_delay(), Duration::from_secs(1));
/// assert_eq!(backoff.next_delay(), Duration::from_secs(2));
/// assert_eq!(backoff.next_delay(), Duration::from_secs(3));
/// assert_eq!(backoff.next_delay(), Duration::from_secs(3));
///
/// backoff.reset();
/// assert_eq!(backoff.next_delay(), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Delay the next attempt would use, without consuming it.
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
