//! Retry policy for transient upstream failures
//!
//! Exponential backoff with random jitter. Retries are only taken while the
//! remaining per-state budget can still absorb the next delay; a retry that
//! would blow the turn deadline is worse than falling back.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// First backoff delay
    pub base: Duration,
    /// Multiplier applied per attempt
    pub factor: u32,
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Jitter fraction in [0, 1]; each delay is scaled by 1 ± jitter
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            factor: 2,
            max_attempts: 3,
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based); None once exhausted
    pub fn backoff(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry >= self.max_attempts {
            return None;
        }
        let exp = self.factor.saturating_pow(retry - 1);
        let nominal = self.base.saturating_mul(exp);
        let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        let jittered = nominal.as_secs_f64() * (1.0 + spread);
        Some(Duration::from_secs_f64(jittered.max(0.0)))
    }

    /// Whether retry number `retry` fits within the remaining budget
    pub fn fits_budget(&self, retry: u32, remaining: Duration) -> bool {
        match self.backoff(retry) {
            // The delay alone must leave room for the request itself.
            Some(delay) => delay < remaining,
            None => false,
        }
    }
}
