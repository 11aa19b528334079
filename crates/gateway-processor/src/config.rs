//! Runtime configuration for [`ApiProcessor`](crate::ApiProcessor).

use crate::transport::TransportConfig;
use gateway_config::GatewayConfig;
use gateway_resilience::{CacheConfig, HealthConfig, RateLimiterConfig, RetryConfig};
use std::time::Duration;

/// Rate limit registered for a named provider at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderQuota {
    /// Provider identifier
    pub name: String,
    /// Requests allowed per window
    pub rate_limit: u32,
    /// Window length
    pub window: Duration,
}

/// Processor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorConfig {
    /// Quota for providers seen without explicit registration
    pub default_rate_limit: RateLimiterConfig,
    /// Longest single sleep while waiting for admission
    pub admission_poll_interval: Duration,
    /// Response cache
    pub cache: CacheConfig,
    /// Retry policy
    pub retry: RetryConfig,
    /// Health thresholds
    pub health: HealthConfig,
    /// HTTP transport
    pub transport: TransportConfig,
    /// Providers registered up front
    pub providers: Vec<ProviderQuota>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            default_rate_limit: RateLimiterConfig::default(),
            admission_poll_interval: Duration::from_millis(100),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            health: HealthConfig::default(),
            transport: TransportConfig::default(),
            providers: Vec::new(),
        }
    }
}

impl ProcessorConfig {
    /// Add a provider quota
    #[must_use]
    pub fn with_provider(mut self, name: impl Into<String>, rate_limit: u32, window: Duration) -> Self {
        self.providers.push(ProviderQuota {
            name: name.into(),
            rate_limit,
            window,
        });
        self
    }
}

impl From<&GatewayConfig> for ProcessorConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            default_rate_limit: RateLimiterConfig::new(
                config.rate_limit.default_limit,
                config.rate_limit.default_window,
            )
            .with_burst_multiplier(config.rate_limit.burst_multiplier),
            admission_poll_interval: config.rate_limit.poll_interval,
            cache: CacheConfig {
                enabled: config.cache.enabled,
                max_entries: config.cache.max_size,
                default_ttl: config.cache.default_ttl,
            },
            retry: RetryConfig {
                max_attempts: config.retry.max_retries,
                backoff_base: config.retry.backoff_base,
                max_backoff: config.retry.max_backoff,
                retry_on_status: config.retry.retry_on_status.clone(),
            },
            health: HealthConfig {
                degraded_threshold: config.health.degraded_threshold,
                down_threshold: config.health.down_threshold,
                window_size: config.health.window_size,
            },
            transport: TransportConfig::from(&config.transport),
            providers: config
                .providers
                .iter()
                .map(|p| ProviderQuota {
                    name: p.name.clone(),
                    rate_limit: p.rate_limit,
                    window: p.window,
                })
                .collect(),
        }
    }
}
