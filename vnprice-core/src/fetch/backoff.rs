//! Retry policy and the sleeper seam that makes waits observable.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries allowed per unit, across both sources.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Add uniform jitter in `[0, base_delay)` to each wait.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy with no waits at all. Used by tests and dry runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Deterministic part of the wait before retry number `attempt` (1-based):
    /// `min(base * 2^(attempt-1), max)`.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Wait before retry number `attempt`, jitter included.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff(attempt);
        if !self.jitter || self.base_delay.is_zero() {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0.0..self.base_delay.as_secs_f64());
        base + Duration::from_secs_f64(jitter)
    }
}

/// Blocks the current thread. Swapped out in tests.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Records requested waits without sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn total(&self) -> Duration {
        self.waits().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(6), Duration::from_secs(60));
        assert_eq!(policy.backoff(40), Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_below_one_base_delay() {
        let policy = RetryPolicy::default();
        for attempt in 1..=4 {
            let wait = policy.backoff(attempt);
            let base = policy.base_backoff(attempt);
            assert!(wait >= base);
            assert!(wait < base + policy.base_delay);
        }
    }

    #[test]
    fn immediate_policy_never_waits() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.backoff(1), Duration::ZERO);
        assert_eq!(policy.backoff(3), Duration::ZERO);
    }

    #[test]
    fn recording_sleeper_keeps_order() {
        let s = RecordingSleeper::new();
        s.sleep(Duration::from_secs(2));
        s.sleep(Duration::from_secs(4));
        assert_eq!(s.waits(), vec![Duration::from_secs(2), Duration::from_secs(4)]);
        assert_eq!(s.total(), Duration::from_secs(6));
    }
}
