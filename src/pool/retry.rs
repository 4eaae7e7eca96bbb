//! Retry policy for worker connection failures.
//!
//! # Design Decisions
//! - Only failures before any response are retried; a worker that answered
//!   has run the call and must not see it twice
//! - Exponential backoff capped at `max_delay_ms`, plus up to 10% jitter

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// Whether another attempt is allowed after `attempt` failed ones.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms)
    }
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);

        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100 && b1.as_millis() < 110);

        let b3 = calculate_backoff(3, 100, 2000);
        assert!(b3.as_millis() >= 400);

        let capped = calculate_backoff(12, 100, 1000);
        assert!(capped.as_millis() >= 1000 && capped.as_millis() < 1100);
    }

    #[test]
    fn test_attempt_budget() {
        let policy = RetryPolicy::new(&RetryConfig {
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
        });
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));

        let single = RetryPolicy::new(&RetryConfig {
            max_attempts: 0,
            base_delay_ms: 10,
            max_delay_ms: 100,
        });
        assert!(!single.allows_retry(1));
    }
}
