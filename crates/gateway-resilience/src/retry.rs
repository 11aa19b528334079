//! Retry policy with exponential backoff.
//!
//! The policy only answers two questions: is this outcome worth another try,
//! and how long to wait first. Attempt numbers are 1-based; the delay after
//! attempt `n` is `backoff_base^(n-1)` seconds, capped at `max_backoff`.

use gateway_core::GatewayError;
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per request, first try included
    pub max_attempts: u32,
    /// Exponential backoff base in seconds
    pub backoff_base: f64,
    /// Upper bound for a single backoff sleep
    pub max_backoff: Duration,
    /// HTTP status codes to retry on
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: 2.0,
            max_backoff: Duration::from_secs(60),
            retry_on_status: vec![429, 500, 502, 503, 504],
        }
    }
}

/// Retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Errors
    /// Returns `GatewayError::Configuration` if no attempt is allowed or the
    /// backoff base is not a positive finite number
    pub fn new(config: RetryConfig) -> Result<Self, GatewayError> {
        if config.max_attempts == 0 {
            return Err(GatewayError::configuration("max retry attempts must be at least 1"));
        }
        if !config.backoff_base.is_finite() || config.backoff_base <= 0.0 {
            return Err(GatewayError::configuration(format!(
                "backoff base must be positive, got {}",
                config.backoff_base
            )));
        }
        Ok(Self { config })
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Total attempts allowed
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Whether an HTTP status should be retried
    #[must_use]
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.config.retry_on_status.contains(&status)
    }

    /// Whether to try again after `attempt` failed with `error`
    #[must_use]
    pub fn should_retry(&self, error: &GatewayError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.config.max_attempts
    }

    /// Sleep before the attempt following `attempt`
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.config.backoff_base.powi(exponent);
        if !secs.is_finite() || secs >= self.config.max_backoff.as_secs_f64() {
            return self.config.max_backoff;
        }
        Duration::from_secs_f64(secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_exponential() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(RetryConfig {
            max_backoff: Duration::from_secs(5),
            ..Default::default()
        })
        .expect("valid policy");
        assert_eq!(policy.backoff(10), Duration::from_secs(5));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_retryable_statuses() {
        let policy = RetryPolicy::default();
        for status in [429, 500, 502, 503, 504] {
            assert!(policy.is_retryable_status(status));
        }
        for status in [400, 401, 403, 404, 501] {
            assert!(!policy.is_retryable_status(status));
        }
    }

    #[test]
    fn test_should_retry_respects_attempt_budget() {
        let policy = RetryPolicy::default();
        let transient = GatewayError::from_status("x", 503, "busy", true);
        let fatal = GatewayError::from_status("x", 404, "gone", false);

        assert!(policy.should_retry(&transient, 1));
        assert!(policy.should_retry(&transient, 2));
        assert!(!policy.should_retry(&transient, 3));
        assert!(!policy.should_retry(&fatal, 1));
    }

    #[test]
    fn test_invalid_policy_rejected() {
        assert!(RetryPolicy::new(RetryConfig {
            max_attempts: 0,
            ..Default::default()
        })
        .is_err());
        assert!(RetryPolicy::new(RetryConfig {
            backoff_base: f64::NAN,
            ..Default::default()
        })
        .is_err());
    }
}
