//! Prometheus metrics for the gateway.
//!
//! Provides metrics for:
//! - Request counts and latencies per provider
//! - Retries and admission waits
//! - Cache hits and misses
//! - Provider health

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;
use tracing::error;

const NAMESPACE: &str = "api_gateway";

/// Cache lookup result label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Served from cache
    Hit,
    /// Not in cache or expired
    Miss,
}

impl CacheOutcome {
    fn as_label(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

/// Collectors owned by one processor instance
///
/// Each instance has its own [`Registry`], so several processors (or tests)
/// can coexist in one process.
pub struct GatewayMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_latency: HistogramVec,
    errors_total: IntCounterVec,
    retries_total: IntCounterVec,
    admission_wait: CounterVec,
    cache_operations: IntCounterVec,
    provider_health: GaugeVec,
}

impl GatewayMetrics {
    /// Create and register all collectors
    ///
    /// # Errors
    /// Returns error if a collector cannot be registered
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Outbound requests by provider and outcome")
                .namespace(NAMESPACE),
            &["provider", "method", "outcome"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_latency = HistogramVec::new(
            HistogramOpts::new(
                "request_duration_seconds",
                "Outbound request latency in seconds, retries included",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["provider"],
        )?;
        registry.register(Box::new(request_latency.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Failed requests by error type").namespace(NAMESPACE),
            &["provider", "error_type"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let retries_total = IntCounterVec::new(
            Opts::new("retries_total", "Retry attempts issued").namespace(NAMESPACE),
            &["provider"],
        )?;
        registry.register(Box::new(retries_total.clone()))?;

        let admission_wait = CounterVec::new(
            Opts::new(
                "admission_wait_seconds_total",
                "Time spent waiting for rate limiter admission",
            )
            .namespace(NAMESPACE),
            &["provider"],
        )?;
        registry.register(Box::new(admission_wait.clone()))?;

        let cache_operations = IntCounterVec::new(
            Opts::new("cache_lookups_total", "Cache lookups by result").namespace(NAMESPACE),
            &["result"],
        )?;
        registry.register(Box::new(cache_operations.clone()))?;

        let provider_health = GaugeVec::new(
            Opts::new(
                "provider_health",
                "Provider health (1=healthy, 0.5=degraded, 0=down)",
            )
            .namespace(NAMESPACE),
            &["provider"],
        )?;
        registry.register(Box::new(provider_health.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_latency,
            errors_total,
            retries_total,
            admission_wait,
            cache_operations,
            provider_health,
        })
    }

    /// Record a finished request
    pub fn record_request(&self, provider: &str, method: &str, success: bool, latency: Duration) {
        let outcome = if success { "success" } else { "error" };
        self.requests_total
            .with_label_values(&[provider, method, outcome])
            .inc();
        self.request_latency
            .with_label_values(&[provider])
            .observe(latency.as_secs_f64());
    }

    /// Record a failed request by error type
    pub fn record_error(&self, provider: &str, error_type: &str) {
        self.errors_total
            .with_label_values(&[provider, error_type])
            .inc();
    }

    /// Record a retry attempt
    pub fn record_retry(&self, provider: &str) {
        self.retries_total.with_label_values(&[provider]).inc();
    }

    /// Record time spent blocked on admission
    pub fn record_admission_wait(&self, provider: &str, waited: Duration) {
        self.admission_wait
            .with_label_values(&[provider])
            .inc_by(waited.as_secs_f64());
    }

    /// Record a cache lookup
    pub fn record_cache_lookup(&self, outcome: CacheOutcome) {
        self.cache_operations
            .with_label_values(&[outcome.as_label()])
            .inc();
    }

    /// Update provider health gauge
    pub fn update_provider_health(&self, provider: &str, value: f64) {
        self.provider_health.with_label_values(&[provider]).set(value);
    }

    /// Reset every collector
    pub fn reset(&self) {
        self.requests_total.reset();
        self.request_latency.reset();
        self.errors_total.reset();
        self.retries_total.reset();
        self.admission_wait.reset();
        self.cache_operations.reset();
        self.provider_health.reset();
    }

    /// Get metrics as Prometheus text format
    #[must_use]
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!(error = %e, "Failed to encode metrics");
            return String::new();
        }

        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Get the Prometheus registry
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
