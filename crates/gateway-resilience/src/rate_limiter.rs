//! Rate limiting using the token bucket algorithm.
//!
//! One [`RateLimiter`] governs one provider. The bucket starts full, spends
//! one token per admitted call and refills continuously at
//! `requests_per_window / window`. Refill is computed lazily from elapsed
//! time on every check; nothing runs in the background.
//!
//! Each limiter carries its own mutex, so providers never contend with each
//! other. The critical section is pure arithmetic.

use gateway_core::GatewayError;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Requests per window (e.g., requests per minute)
    pub requests_per_window: u32,
    /// Window duration
    pub window: Duration,
    /// Burst multiplier applied to the bucket capacity (1.0 = no burst)
    pub burst_multiplier: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 60,
            window: Duration::from_secs(60),
            burst_multiplier: 1.0,
        }
    }
}

impl RateLimiterConfig {
    /// Create a configuration for `requests_per_window` calls every `window`
    #[must_use]
    pub fn new(requests_per_window: u32, window: Duration) -> Self {
        Self {
            requests_per_window,
            window,
            ..Default::default()
        }
    }

    /// Set the burst multiplier
    #[must_use]
    pub fn with_burst_multiplier(mut self, multiplier: f64) -> Self {
        self.burst_multiplier = multiplier;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `GatewayError::Configuration` for a zero limit, a zero window
    /// or a burst multiplier below 1.0
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.requests_per_window == 0 {
            return Err(GatewayError::configuration(
                "rate limit must allow at least one request per window",
            ));
        }
        if self.window.is_zero() {
            return Err(GatewayError::configuration("rate limit window must be non-zero"));
        }
        if !self.burst_multiplier.is_finite() || self.burst_multiplier < 1.0 {
            return Err(GatewayError::configuration(format!(
                "burst multiplier must be >= 1.0, got {}",
                self.burst_multiplier
            )));
        }
        Ok(())
    }

    fn max_tokens(&self) -> f64 {
        f64::from(self.requests_per_window) * self.burst_multiplier
    }

    fn refill_per_sec(&self) -> f64 {
        f64::from(self.requests_per_window) / self.window.as_secs_f64()
    }
}

/// Token bucket state
#[derive(Debug)]
struct TokenBucket {
    /// Available tokens
    tokens: f64,
    /// Last refill time
    last_refill: Instant,
}

impl TokenBucket {
    /// Refill tokens based on elapsed time
    fn refill(&mut self, max_tokens: f64, refill_per_sec: f64) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * refill_per_sec).min(max_tokens);
        self.last_refill = now;
    }
}

/// Bucket statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketStats {
    /// Tokens currently available
    pub tokens_available: f64,
    /// Bucket capacity
    pub max_tokens: f64,
    /// Requests allowed per window
    pub rate: u32,
    /// Window length in seconds
    pub window_secs: f64,
    /// Seconds until the next token is available
    pub wait_time_secs: f64,
}

impl BucketStats {
    /// Calculate utilization percentage
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max_tokens <= 0.0 {
            return 0.0;
        }
        ((self.max_tokens - self.tokens_available) / self.max_tokens * 100.0).max(0.0)
    }
}

/// Token bucket rate limiter for a single provider
#[derive(Debug)]
pub struct RateLimiter {
    /// Identifier
    id: String,
    /// Configuration
    config: RateLimiterConfig,
    /// Bucket state
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Create a new rate limiter with a full bucket
    ///
    /// # Errors
    /// Returns `GatewayError::Configuration` if the configuration is invalid
    pub fn new(id: impl Into<String>, config: RateLimiterConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        Ok(Self {
            id: id.into(),
            bucket: Mutex::new(TokenBucket {
                tokens: config.max_tokens(),
                last_refill: Instant::now(),
            }),
            config,
        })
    }

    /// Get the rate limiter ID
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Try to take `n` tokens
    ///
    /// Returns `false` and leaves the token count untouched when fewer than
    /// `n` tokens are available after refill.
    pub fn try_consume(&self, n: f64) -> bool {
        let mut bucket = self.bucket.lock();
        bucket.refill(self.config.max_tokens(), self.config.refill_per_sec());

        if bucket.tokens >= n {
            bucket.tokens -= n;
            trace!(
                rate_limiter = %self.id,
                tokens_remaining = bucket.tokens,
                "Rate limit check passed"
            );
            true
        } else {
            debug!(
                rate_limiter = %self.id,
                tokens_available = bucket.tokens,
                requested = n,
                "Rate limit check deferred"
            );
            false
        }
    }

    /// Take a single token
    pub fn try_acquire(&self) -> bool {
        self.try_consume(1.0)
    }

    /// Estimate time until one token is available
    pub fn wait_time(&self) -> Duration {
        let mut bucket = self.bucket.lock();
        bucket.refill(self.config.max_tokens(), self.config.refill_per_sec());
        self.deficit_wait(bucket.tokens)
    }

    fn deficit_wait(&self, tokens: f64) -> Duration {
        let deficit = 1.0 - tokens;
        if deficit <= 0.0 {
            return Duration::ZERO;
        }
        let secs = deficit / self.config.refill_per_sec();
        // Capped at one window; windows near Duration::MAX do not survive the f64 round trip
        Duration::try_from_secs_f64(secs.min(self.config.window.as_secs_f64()))
            .unwrap_or(self.config.window)
    }

    /// Get current statistics
    pub fn stats(&self) -> BucketStats {
        let mut bucket = self.bucket.lock();
        bucket.refill(self.config.max_tokens(), self.config.refill_per_sec());
        BucketStats {
            tokens_available: bucket.tokens,
            max_tokens: self.config.max_tokens(),
            rate: self.config.requests_per_window,
            window_secs: self.config.window.as_secs_f64(),
            wait_time_secs: self.deficit_wait(bucket.tokens).as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn limiter(rate: u32, window: Duration) -> RateLimiter {
        RateLimiter::new("test", RateLimiterConfig::new(rate, window)).expect("valid config")
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_allows_within_limit() {
        let limiter = limiter(10, Duration::from_secs(60));

        for i in 0..10 {
            assert!(limiter.try_acquire(), "Request {i} should be allowed");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_blocks_over_limit() {
        let limiter = limiter(5, Duration::from_secs(60));

        for _ in 0..5 {
            assert!(limiter.try_acquire());
        }

        let before = limiter.stats().tokens_available;
        assert!(!limiter.try_acquire(), "6th request should be blocked");
        let after = limiter.stats().tokens_available;
        assert!((before - after).abs() < 1e-9, "rejected check must not spend tokens");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_refills_over_time() {
        let limiter = limiter(10, Duration::from_secs(1));

        for _ in 0..10 {
            limiter.try_acquire();
        }
        assert!(!limiter.try_acquire());

        // One token every 100ms
        advance(Duration::from_millis(100)).await;
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_never_exceed_capacity() {
        let limiter = limiter(3, Duration::from_secs(1));

        advance(Duration::from_secs(3600)).await;
        let stats = limiter.stats();
        assert!((stats.tokens_available - 3.0).abs() < 1e-9);
        assert!((stats.max_tokens - 3.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_checks_always_admitted() {
        let limiter = limiter(2, Duration::from_secs(2));

        for _ in 0..2 {
            assert!(limiter.try_acquire());
        }
        // Spacing of 1/refill_rate seconds keeps the bucket from running dry
        for _ in 0..20 {
            advance(Duration::from_secs(1)).await;
            assert!(limiter.try_acquire());
            let tokens = limiter.stats().tokens_available;
            assert!((0.0..=2.0).contains(&tokens));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_time_from_deficit() {
        let limiter = limiter(2, Duration::from_secs(60));

        assert_eq!(limiter.wait_time(), Duration::ZERO);
        limiter.try_acquire();
        limiter.try_acquire();

        // Empty bucket refilling at 1 token per 30s
        let wait = limiter.wait_time();
        assert!((wait.as_secs_f64() - 30.0).abs() < 0.01, "got {wait:?}");

        advance(Duration::from_secs(10)).await;
        let wait = limiter.wait_time();
        assert!((wait.as_secs_f64() - 20.0).abs() < 0.01, "got {wait:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_burst() {
        let limiter = RateLimiter::new(
            "test",
            RateLimiterConfig::new(10, Duration::from_secs(60)).with_burst_multiplier(1.5),
        )
        .expect("valid config");

        for i in 0..15 {
            assert!(limiter.try_acquire(), "Request {i} should be allowed (burst)");
        }
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_window_wait_is_capped_at_window() {
        let window = Duration::from_secs(u64::MAX);
        let limiter = limiter(1, window);

        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.wait_time(), window);

        let stats = limiter.stats();
        assert_eq!(stats.rate, 1);
        assert!(stats.wait_time_secs > 0.0);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(RateLimiter::new("x", RateLimiterConfig::new(0, Duration::from_secs(1))).is_err());
        assert!(RateLimiter::new("x", RateLimiterConfig::new(5, Duration::ZERO)).is_err());
        let bad_burst = RateLimiterConfig::new(5, Duration::from_secs(1)).with_burst_multiplier(0.5);
        assert!(matches!(
            RateLimiter::new("x", bad_burst),
            Err(GatewayError::Configuration { .. })
        ));
    }

    #[test]
    fn test_bucket_stats_utilization() {
        let stats = BucketStats {
            tokens_available: 3.0,
            max_tokens: 10.0,
            rate: 10,
            window_secs: 60.0,
            wait_time_secs: 0.0,
        };

        assert!((stats.utilization() - 70.0).abs() < 0.1);
    }
}
