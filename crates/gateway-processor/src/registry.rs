//! Provider registry mapping provider identifiers to rate limiters.
//!
//! Limiters are created lazily with the default quota on first use, or
//! explicitly through [`ProviderRegistry::register`]. Re-registering a
//! provider replaces its limiter with a fresh, full bucket.

use dashmap::DashMap;
use gateway_core::GatewayError;
use gateway_resilience::{BucketStats, RateLimiter, RateLimiterConfig};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Registry of per-provider rate limiters
#[derive(Debug)]
pub struct ProviderRegistry {
    limiters: DashMap<String, Arc<RateLimiter>>,
    default_quota: RateLimiterConfig,
}

impl ProviderRegistry {
    /// Create a registry handing out `default_quota` to unknown providers
    ///
    /// # Errors
    /// Returns `GatewayError::Configuration` if the default quota is invalid
    pub fn new(default_quota: RateLimiterConfig) -> Result<Self, GatewayError> {
        default_quota.validate()?;
        Ok(Self {
            limiters: DashMap::new(),
            default_quota,
        })
    }

    /// Register or replace a provider's quota
    ///
    /// # Errors
    /// Returns `GatewayError::Configuration` for a zero limit or zero window
    pub fn register(
        &self,
        provider: &str,
        rate_limit: u32,
        window: Duration,
    ) -> Result<Arc<RateLimiter>, GatewayError> {
        let config = RateLimiterConfig::new(rate_limit, window)
            .with_burst_multiplier(self.default_quota.burst_multiplier);
        let limiter = Arc::new(RateLimiter::new(provider, config)?);
        let replaced = self
            .limiters
            .insert(provider.to_string(), Arc::clone(&limiter))
            .is_some();

        info!(
            provider,
            rate_limit,
            window_secs = window.as_secs_f64(),
            replaced,
            "Provider registered"
        );
        Ok(limiter)
    }

    /// Limiter for `provider`, registering the default quota on first use
    ///
    /// # Errors
    /// Returns `GatewayError::Configuration` if the default quota cannot
    /// build a limiter
    pub fn get_or_register(&self, provider: &str) -> Result<Arc<RateLimiter>, GatewayError> {
        if let Some(limiter) = self.limiters.get(provider) {
            return Ok(Arc::clone(limiter.value()));
        }

        let entry = self
            .limiters
            .entry(provider.to_string())
            .or_try_insert_with(|| {
                debug!(provider, "Registering provider with default quota");
                RateLimiter::new(provider, self.default_quota.clone()).map(Arc::new)
            })?;
        Ok(Arc::clone(entry.value()))
    }

    /// Limiter for `provider`, if registered
    #[must_use]
    pub fn get(&self, provider: &str) -> Option<Arc<RateLimiter>> {
        self.limiters.get(provider).map(|l| Arc::clone(l.value()))
    }

    /// Whether `provider` has a limiter
    #[must_use]
    pub fn contains(&self, provider: &str) -> bool {
        self.limiters.contains_key(provider)
    }

    /// Bucket statistics for every provider
    #[must_use]
    pub fn stats(&self) -> BTreeMap<String, BucketStats> {
        self.limiters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }

    /// Number of registered providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Whether no provider is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}
