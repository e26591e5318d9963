//! Retry budget and exponential backoff policy for transient task errors.
//!
//! The delay doubles per attempt from a configurable base and is clamped
//! to a configurable cap. The attempt number passed to [`RetryPolicy::backoff_delay`]
//! is the value of `attempt_count` *after* the failed dispatch, so the
//! first retry waits exactly `base_delay`.

use std::time::Duration;

/// Per-job-type retry tuning.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of dispatches before the job is forced to `failed`.
    pub max_attempts: i32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(900),
        }
    }
}

impl RetryPolicy {
    /// True once the retry budget is spent and the job must fail with
    /// `RETRIES_EXHAUSTED` instead of being requeued.
    pub fn is_exhausted(&self, attempt_count: i32) -> bool {
        attempt_count >= self.max_attempts
    }

    /// Backoff delay before redelivering after the given failed attempt
    /// (1-based). `base * 2^(attempt-1)`, clamped to `max_delay`.
    pub fn backoff_delay(&self, attempt_count: i32) -> Duration {
        let exp = attempt_count.saturating_sub(1).clamp(0, 32) as u32;
        let factor = 2u64.saturating_pow(exp);
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay_ms).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        };
        let expected = [1, 2, 4, 8, 16];
        for (i, &secs) in expected.iter().enumerate() {
            assert_eq!(
                policy.backoff_delay(i as i32 + 1),
                Duration::from_secs(secs)
            );
        }
    }

    #[test]
    fn backoff_clamps_at_max() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(900),
        };
        assert_eq!(policy.backoff_delay(8), Duration::from_secs(900));
        assert_eq!(policy.backoff_delay(30), Duration::from_secs(900));
    }

    #[test]
    fn zero_and_negative_attempts_use_base_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(0), policy.base_delay);
        assert_eq!(policy.backoff_delay(-3), policy.base_delay);
    }

    #[test]
    fn exhaustion_at_max_attempts() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }
}
