//! Reconnect policy and the exponential backoff counter driven by it.
//!
//! The delay before retry `n` (zero-based) is
//! `min(base_delay_ms * 2^n, max_delay_ms)`. Once `max_attempts` consecutive
//! retries have been scheduled without a successful connection, the counter
//! reports exhaustion and the channel stops retrying.

use std::time::Duration;

use serde::Deserialize;

use crate::error::PulseError;

/// Retry limits for one channel instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Consecutive reconnects attempted before giving up.
    pub max_attempts: u32,
    /// Delay before the first reconnect, in milliseconds. Must be non-zero.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, base_delay_ms: 1_000, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    /// Build a validated policy.
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Result<Self, PulseError> {
        let policy = Self { max_attempts, base_delay_ms, max_delay_ms };
        policy.validate()?;
        Ok(policy)
    }

    /// Reject a zero base delay or a cap below the base delay.
    pub fn validate(&self) -> Result<(), PulseError> {
        if self.base_delay_ms == 0 {
            return Err(PulseError::Config("reconnect.base_delay_ms must be greater than 0".into()));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(PulseError::Config(format!(
                "reconnect.max_delay_ms ({}) must be >= base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }

    /// Delay before the retry that follows `attempts` failed ones.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let factor = 1u64.checked_shl(attempts).unwrap_or(u64::MAX);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Consecutive-attempt counter for a [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Delay for the next retry, counting it as an attempt.
    ///
    /// Returns `None` once `max_attempts` retries have been handed out.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        let delay = self.policy.delay_for(self.attempts);
        self.attempts += 1;
        Some(delay)
    }

    /// Start the sequence over from `base_delay_ms`.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_until_capped() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u128> = (0..8).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]);
    }

    #[test]
    fn huge_attempt_counts_saturate_at_cap() {
        let policy = ReconnectPolicy::new(u32::MAX, 1000, 30_000).unwrap();
        assert_eq!(policy.delay_for(63), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(64), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let mut backoff = Backoff::new(ReconnectPolicy::new(3, 100, 10_000).unwrap());
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(400)));
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn reset_restarts_from_base() {
        let mut backoff = Backoff::new(ReconnectPolicy::default());
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn zero_attempts_never_retries() {
        let mut backoff = Backoff::new(ReconnectPolicy::new(0, 1000, 1000).unwrap());
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn invalid_policies_rejected() {
        assert!(ReconnectPolicy::new(5, 0, 1000).is_err());
        assert!(ReconnectPolicy::new(5, 2000, 1000).is_err());
        assert!(ReconnectPolicy::new(5, 1000, 1000).is_ok());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let policy: ReconnectPolicy = serde_json::from_str(r#"{"max_attempts": 10}"#).unwrap();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 30_000);
    }
}
