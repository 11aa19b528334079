//! Configuration schema definitions.
//!
//! This module defines all configuration types with validation and defaults.
//! Durations are written in humantime form (`"60s"`, `"500ms"`, `"5m"`).

use gateway_telemetry::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Main gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Default rate limiting
    #[validate(nested)]
    pub rate_limit: RateLimitSettings,

    /// Response cache
    #[validate(nested)]
    pub cache: CacheSettings,

    /// Retry policy
    #[validate(nested)]
    pub retry: RetrySettings,

    /// HTTP transport
    #[validate(nested)]
    pub transport: TransportSettings,

    /// Health classification
    #[validate(nested)]
    pub health: HealthSettings,

    /// Per-provider rate limit overrides
    #[validate(nested)]
    pub providers: Vec<ProviderConfig>,

    /// Logging
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Validate the configuration
    ///
    /// # Errors
    /// Returns validation errors if configuration is invalid
    pub fn validate_config(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()
    }

    /// Get a provider override by name
    #[must_use]
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}

/// Default rate limit applied to providers without an override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_rate_limit_settings"))]
pub struct RateLimitSettings {
    /// Requests allowed per window
    #[validate(range(min = 1))]
    pub default_limit: u32,

    /// Window length
    #[serde(with = "humantime_serde")]
    pub default_window: Duration,

    /// Bucket capacity multiplier
    #[validate(range(min = 1.0, max = 100.0))]
    pub burst_multiplier: f64,

    /// Longest single sleep while waiting for admission
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            default_limit: 60,
            default_window: Duration::from_secs(60),
            burst_multiplier: 1.0,
            poll_interval: Duration::from_millis(100),
        }
    }
}

fn validate_rate_limit_settings(settings: &RateLimitSettings) -> Result<(), ValidationError> {
    if settings.default_window.is_zero() {
        return Err(ValidationError::new("zero_window"));
    }
    if settings.poll_interval.is_zero() {
        return Err(ValidationError::new("zero_poll_interval"));
    }
    Ok(())
}

/// Response cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether GET responses are cached
    pub enabled: bool,

    /// Default TTL
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Maximum number of entries
    #[validate(range(min = 1))]
    pub max_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(300),
            max_size: 1000,
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per request, first try included
    #[validate(range(min = 1, max = 10))]
    pub max_retries: u32,

    /// Exponential backoff base, in seconds
    #[validate(range(min = 0.001, max = 60.0))]
    pub backoff_base: f64,

    /// Maximum delay between retries
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,

    /// HTTP status codes to retry on
    #[serde(default = "default_retry_codes")]
    pub retry_on_status: Vec<u16>,
}

fn default_retry_codes() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: 2.0,
            max_backoff: Duration::from_secs(60),
            retry_on_status: default_retry_codes(),
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TransportSettings {
    /// Per-attempt timeout when the caller gives none
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Connection establishment timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Idle connections kept per host
    #[validate(range(min = 1, max = 1000))]
    pub pool_max_idle_per_host: usize,

    /// How long an idle pooled connection is kept
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Duration,

    /// User-Agent header sent on every call
    #[validate(length(min = 1))]
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: concat!("api-gateway/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Health classification thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_health_thresholds"))]
pub struct HealthSettings {
    /// Error count above which a provider is degraded
    pub degraded_threshold: u32,

    /// Error count at which a provider is down
    #[validate(range(min = 1))]
    pub down_threshold: u32,

    /// Response-time samples kept per provider
    #[validate(range(min = 1, max = 10000))]
    pub window_size: usize,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            degraded_threshold: 3,
            down_threshold: 10,
            window_size: 100,
        }
    }
}

fn validate_health_thresholds(settings: &HealthSettings) -> Result<(), ValidationError> {
    if settings.down_threshold <= settings.degraded_threshold {
        return Err(ValidationError::new("down_threshold_not_above_degraded"));
    }
    Ok(())
}

/// Per-provider rate limit override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_provider"))]
pub struct ProviderConfig {
    /// Provider identifier used in `request` calls
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    /// Requests allowed per window
    #[validate(range(min = 1))]
    pub rate_limit: u32,

    /// Window length
    #[serde(default = "default_window", with = "humantime_serde")]
    pub window: Duration,
}

fn default_window() -> Duration {
    Duration::from_secs(60)
}

fn validate_provider(provider: &ProviderConfig) -> Result<(), ValidationError> {
    if provider.window.is_zero() {
        return Err(ValidationError::new("zero_window"));
    }
    Ok(())
}
