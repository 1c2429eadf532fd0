//! Retry policy for provider calls
//!
//! Exponential backoff with jitter, capped, with provider-mandated
//! `Retry-After` acting as a floor on the wait.

use std::time::Duration;

use crate::ports::ProviderError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries (useful in tests).
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Whether another attempt should follow `attempt` (1-based)
    /// failing with `error`.
    pub fn should_retry(&self, attempt: u32, error: &ProviderError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    /// Backoff before the attempt after `attempt` (1-based), with
    /// ±10% jitter. A provider `Retry-After` floors the result.
    pub fn delay_after(&self, attempt: u32, error: &ProviderError) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jitter = {
            use rand::Rng;
            rand::thread_rng().gen_range(0.9..=1.1)
        };
        let delay = Duration::from_secs_f64(capped * jitter);

        match error.retry_after() {
            Some(floor) if floor > delay => floor,
            _ => delay,
        }
    }
}
