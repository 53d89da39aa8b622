//! Retry policy for activity execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Backoff parameters for one class of activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the second attempt
    pub initial_interval_ms: u64,
    /// Upper bound for any delay between attempts
    pub max_interval_ms: u64,
    /// Multiplier applied per failed attempt
    pub backoff_coefficient: f64,
    /// Hard ceiling on attempts, including the first one
    pub max_attempts: u32,
    /// Timeout applied to each individual attempt
    pub attempt_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: 2_000,
            max_interval_ms: 120_000,
            backoff_coefficient: 2.0,
            max_attempts: 5,
            attempt_timeout_ms: 300_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Single attempt, no retries
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    pub fn with_initial_interval(mut self, ms: u64) -> Self {
        self.initial_interval_ms = ms;
        self
    }

    pub fn with_max_interval(mut self, ms: u64) -> Self {
        self.max_interval_ms = ms;
        self
    }

    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient;
        self
    }

    pub fn with_attempt_timeout(mut self, ms: u64) -> Self {
        self.attempt_timeout_ms = ms;
        self
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Delay to wait after the given failed attempt (1-indexed)
    ///
    /// `min(initial * coefficient^(attempt - 1), max)`
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.initial_interval_ms as f64 * self.backoff_coefficient.powi(exponent);
        let delay_ms = delay.min(self.max_interval_ms as f64) as u64;

        Duration::from_millis(delay_ms)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_attempts == 0 {
            return Err(DomainError::validation("max_attempts must be at least 1"));
        }

        if !self.backoff_coefficient.is_finite() || self.backoff_coefficient < 1.0 {
            return Err(DomainError::validation(
                "backoff_coefficient must be a finite number >= 1.0",
            ));
        }

        if self.initial_interval_ms > self.max_interval_ms {
            return Err(DomainError::validation(
                "initial_interval_ms must not exceed max_interval_ms",
            ));
        }

        if self.attempt_timeout_ms == 0 {
            return Err(DomainError::validation("attempt_timeout_ms must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_production_tuning() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.initial_interval_ms, 2_000);
        assert_eq!(policy.max_interval_ms, 120_000);
        assert_eq!(policy.backoff_coefficient, 2.0);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.attempt_timeout(), Duration::from_secs(300));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy::new(10)
            .with_initial_interval(100)
            .with_backoff_coefficient(2.0)
            .with_max_interval(1000);

        assert_eq!(policy.delay_after_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after_attempt(4), Duration::from_millis(800));
        assert_eq!(policy.delay_after_attempt(5), Duration::from_millis(1000)); // Capped
        assert_eq!(policy.delay_after_attempt(60), Duration::from_millis(1000));
    }

    #[test]
    fn test_delays_are_non_decreasing() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (1..=8).map(|a| policy.delay_after_attempt(a)).collect();

        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*delays.last().unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn test_validation() {
        assert!(RetryPolicy::new(0).validate().is_err());
        assert!(RetryPolicy::default()
            .with_backoff_coefficient(0.5)
            .validate()
            .is_err());
        assert!(RetryPolicy::default()
            .with_initial_interval(10_000)
            .with_max_interval(1_000)
            .validate()
            .is_err());
        assert!(RetryPolicy::no_retry().validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 3}"#).unwrap();

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_interval_ms, 2_000);
    }
}
