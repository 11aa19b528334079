//! # Gateway Resilience
//!
//! Resilience patterns for the outbound API gateway:
//! - Rate limiting with a per-provider token bucket
//! - Response caching with TTL and approximate LRU eviction
//! - Provider health tracking with hysteresis
//! - Retry policy with exponential backoff
//! - Timeout management

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod health;
pub mod rate_limiter;
pub mod retry;
pub mod timeout;

// Re-export main types
pub use cache::{CacheConfig, CacheKey, CacheStats, CachedResponse, ResponseCache};
pub use health::{HealthConfig, HealthMonitor, ProviderHealth};
pub use rate_limiter::{BucketStats, RateLimiter, RateLimiterConfig};
pub use retry::{RetryConfig, RetryPolicy};
pub use timeout::with_timeout;
