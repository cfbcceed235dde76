//! Reconnect-with-backoff policy.
//!
//! The delay before attempt `n` (zero-based) is `base * 2^n`; once
//! `max_attempts` attempts have been made the policy gives up.

use std::time::Duration;

/// Exponential reconnect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub base: Duration,

    /// Number of retries allowed.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Create a policy.
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self { base, max_attempts }
    }

    /// Delay before retry `attempt`, or `None` when retries are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor))
    }

    /// Iterate over every delay the policy allows, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts).filter_map(move |attempt| self.delay_for(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles() {
        let policy = ReconnectPolicy::new(Duration::from_millis(500), 4);
        assert_eq!(policy.delay_for(0), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(1000)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(2000)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(4000)));
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let policy = ReconnectPolicy::default();
        assert!(policy.delay_for(4).is_some());
        assert_eq!(policy.delay_for(5), None);
        assert_eq!(policy.delays().count(), 5);
    }

    #[test]
    fn test_zero_attempts_never_retries() {
        let policy = ReconnectPolicy::new(Duration::from_secs(1), 0);
        assert_eq!(policy.delay_for(0), None);
    }

    #[test]
    fn test_large_attempt_saturates() {
        let policy = ReconnectPolicy::new(Duration::from_secs(1), u32::MAX);
        assert!(policy.delay_for(40).is_some());
    }
}
