//! Read-failure backoff

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delays between frame reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Pause between successful reads (ms)
    pub normal_ms: u64,
    /// Pause after a failed read (ms)
    pub retry_ms: u64,
    /// Pause once `threshold` consecutive failures were exceeded (ms)
    pub hibernate_ms: u64,
    /// Consecutive failures tolerated before hibernating
    pub threshold: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            normal_ms: 1,
            retry_ms: 1_000,
            hibernate_ms: 30_000,
            threshold: 10,
        }
    }
}

impl RetryPolicy {
    pub fn normal(&self) -> Duration {
        Duration::from_millis(self.normal_ms)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    pub fn hibernate(&self) -> Duration {
        Duration::from_millis(self.hibernate_ms)
    }
}

/// Consecutive-failure counter of one actor
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, failures: 0 }
    }

    /// Record a successful read; returns the delay before the next read
    pub fn on_success(&mut self) -> Duration {
        self.failures = 0;
        self.policy.normal()
    }

    /// Record a failed read; returns the delay before the next read
    pub fn on_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        if self.failures > self.policy.threshold {
            self.policy.hibernate()
        } else {
            self.policy.retry()
        }
    }

    /// Consecutive failures so far
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalates_after_threshold() {
        let mut backoff = Backoff::new(RetryPolicy::default());

        for _ in 0..10 {
            assert_eq!(backoff.on_failure(), Duration::from_secs(1));
        }
        assert_eq!(backoff.on_failure(), Duration::from_secs(30));
        assert_eq!(backoff.on_failure(), Duration::from_secs(30));
        assert_eq!(backoff.failures(), 12);
    }

    #[test]
    fn test_success_resets() {
        let mut backoff = Backoff::new(RetryPolicy::default());
        for _ in 0..3 {
            backoff.on_failure();
        }

        assert_eq!(backoff.on_success(), Duration::from_millis(1));
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.on_failure(), Duration::from_secs(1));
    }

    #[test]
    fn test_delays_monotonic_until_success() {
        let mut backoff = Backoff::new(RetryPolicy::default());
        let mut last = RetryPolicy::default().normal();
        for _ in 0..20 {
            let delay = backoff.on_failure();
            assert!(delay >= last);
            last = delay;
        }
    }
}
