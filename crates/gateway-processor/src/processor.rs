//! The request pipeline.
//!
//! [`ApiProcessor`] runs every outbound call through the same stages, in
//! order:
//!
//! 1. cache lookup (GET with caching enabled only)
//! 2. admission through the provider's token bucket, sleeping in bounded
//!    slices until a token is available
//! 3. the network call, retried with exponential backoff on transport
//!    failures, timeouts and retryable statuses
//! 4. health, counter and metric bookkeeping
//! 5. cache write for successful cacheable calls
//!
//! Failures never escape as `Err`; they come back as an [`ApiResponse`] with
//! `success == false` and the last observed error.

use crate::config::ProcessorConfig;
use crate::registry::ProviderRegistry;
use crate::stats::{ProcessorStats, RequestCounters};
use crate::transport::{HttpTransport, Transport, TransportRequest, TransportResponse};
use gateway_config::GatewayConfig;
use gateway_core::{ApiResponse, GatewayError, GatewayResult, HealthStatus, HttpMethod, RequestOptions};
use gateway_resilience::{
    with_timeout, CachedResponse, HealthMonitor, ProviderHealth, ResponseCache, RetryPolicy,
};
use gateway_telemetry::{CacheOutcome, GatewayMetrics};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Shortest admission sleep
const MIN_ADMISSION_SLICE: Duration = Duration::from_millis(1);

/// Outbound request orchestrator
///
/// Share one instance between tasks behind an [`Arc`]; every method takes
/// `&self`.
pub struct ApiProcessor {
    config: ProcessorConfig,
    transport: Arc<dyn Transport>,
    registry: ProviderRegistry,
    cache: ResponseCache,
    health: HealthMonitor,
    retry: RetryPolicy,
    counters: RequestCounters,
    metrics: GatewayMetrics,
}

impl ApiProcessor {
    /// Create a processor with a pooled `reqwest` transport
    ///
    /// # Errors
    /// Returns `GatewayError::Configuration` if any part of the configuration
    /// is invalid or the HTTP client cannot be built
    pub fn new(config: ProcessorConfig) -> GatewayResult<Self> {
        let transport = HttpTransport::new(&config.transport)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a processor from a loaded gateway configuration
    ///
    /// # Errors
    /// See [`ApiProcessor::new`]
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        Self::new(ProcessorConfig::from(config))
    }

    /// Create a processor over a caller-supplied transport
    ///
    /// # Errors
    /// Returns `GatewayError::Configuration` if a quota, the retry policy or
    /// the admission poll interval is invalid
    pub fn with_transport(
        config: ProcessorConfig,
        transport: Arc<dyn Transport>,
    ) -> GatewayResult<Self> {
        if config.admission_poll_interval.is_zero() {
            return Err(GatewayError::configuration(
                "admission poll interval must be greater than zero",
            ));
        }

        let registry = ProviderRegistry::new(config.default_rate_limit.clone())?;
        for quota in &config.providers {
            registry.register(&quota.name, quota.rate_limit, quota.window)?;
        }

        let retry = RetryPolicy::new(config.retry.clone())?;
        let metrics = GatewayMetrics::new()
            .map_err(|e| GatewayError::internal(format!("Failed to create metrics registry: {e}")))?;

        info!(
            providers = registry.len(),
            default_limit = config.default_rate_limit.requests_per_window,
            default_window_secs = config.default_rate_limit.window.as_secs_f64(),
            cache_enabled = config.cache.enabled,
            max_attempts = config.retry.max_attempts,
            "API processor initialized"
        );

        Ok(Self {
            cache: ResponseCache::new(config.cache.clone()),
            health: HealthMonitor::new(config.health.clone()),
            config,
            transport,
            registry,
            retry,
            counters: RequestCounters::default(),
            metrics,
        })
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Register or replace a provider's rate limit
    ///
    /// Requests already waiting for admission pick up the new limiter on
    /// their next poll.
    ///
    /// # Errors
    /// Returns `GatewayError::Configuration` for a zero limit or zero window
    pub fn register_provider(
        &self,
        provider: &str,
        rate_limit: u32,
        window: Duration,
    ) -> GatewayResult<()> {
        self.registry.register(provider, rate_limit, window).map(|_| ())
    }

    /// Send a request through the full pipeline
    pub async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        provider: &str,
        options: RequestOptions,
    ) -> ApiResponse {
        let request_id = Uuid::new_v4();
        let span = info_span!("api_request", %request_id, provider, %method, url);
        self.execute(method, url, provider, options)
            .instrument(span)
            .await
    }

    /// GET request
    pub async fn get(&self, url: &str, provider: &str, options: RequestOptions) -> ApiResponse {
        self.request(HttpMethod::Get, url, provider, options).await
    }

    /// POST request
    pub async fn post(&self, url: &str, provider: &str, options: RequestOptions) -> ApiResponse {
        self.request(HttpMethod::Post, url, provider, options).await
    }

    /// PUT request
    pub async fn put(&self, url: &str, provider: &str, options: RequestOptions) -> ApiResponse {
        self.request(HttpMethod::Put, url, provider, options).await
    }

    /// DELETE request
    pub async fn delete(&self, url: &str, provider: &str, options: RequestOptions) -> ApiResponse {
        self.request(HttpMethod::Delete, url, provider, options).await
    }

    async fn execute(
        &self,
        method: HttpMethod,
        url: &str,
        provider: &str,
        options: RequestOptions,
    ) -> ApiResponse {
        let cacheable = method.is_cache_eligible() && options.use_cache && self.cache.is_enabled();

        if cacheable {
            if let Some(hit) = self
                .cache
                .get(method, url, &options.params, options.body.as_ref())
            {
                self.metrics.record_cache_lookup(CacheOutcome::Hit);
                debug!("Served from cache");
                return ApiResponse::cached(provider, hit.data, hit.status_code);
            }
            self.metrics.record_cache_lookup(CacheOutcome::Miss);
        }

        let started = Instant::now();
        let (result, attempts) = match self.admit(provider).await {
            Ok(()) => self.send_with_retries(method, url, provider, &options).await,
            Err(e) => (Err(e), 0),
        };
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let success = result.is_ok();

        self.health.record_outcome(provider, success, elapsed_ms);
        self.counters.record(provider, success);
        self.metrics
            .record_request(provider, method.as_str(), success, elapsed);
        self.metrics
            .update_provider_health(provider, health_gauge(self.health.status(provider)));

        match result {
            Ok((data, status)) => {
                if cacheable {
                    self.cache.set(
                        method,
                        url,
                        CachedResponse::new(data.clone(), status),
                        &options.params,
                        options.body.as_ref(),
                        options.cache_ttl,
                    );
                }
                info!(status, attempts, response_time_ms = elapsed_ms, "Request completed");
                ApiResponse::success(provider, data, status, elapsed_ms, attempts)
            }
            Err(err) => {
                self.metrics.record_error(provider, err.error_type());
                warn!(
                    error = %err,
                    error_type = err.error_type(),
                    attempts,
                    response_time_ms = elapsed_ms,
                    "Request failed"
                );
                ApiResponse::failure(provider, &err, elapsed_ms, attempts)
            }
        }
    }

    /// Wait until the provider's bucket yields a token
    async fn admit(&self, provider: &str) -> GatewayResult<()> {
        let started = Instant::now();

        loop {
            let limiter = self.registry.get_or_register(provider)?;
            if limiter.try_acquire() {
                break;
            }

            let slice = limiter
                .wait_time()
                .min(self.config.admission_poll_interval)
                .max(MIN_ADMISSION_SLICE);
            drop(limiter);

            debug!(slice_ms = slice.as_millis() as u64, "Waiting for rate limiter");
            sleep(slice).await;
        }

        let waited = started.elapsed();
        if !waited.is_zero() {
            self.metrics.record_admission_wait(provider, waited);
            debug!(waited_ms = waited.as_millis() as u64, "Admitted after waiting");
        }
        Ok(())
    }

    async fn send_with_retries(
        &self,
        method: HttpMethod,
        url: &str,
        provider: &str,
        options: &RequestOptions,
    ) -> (GatewayResult<(Value, u16)>, u32) {
        let timeout = options
            .timeout
            .unwrap_or(self.config.transport.request_timeout);
        let request = TransportRequest {
            provider: provider.to_string(),
            method,
            url: url.to_string(),
            params: options.params.clone(),
            headers: options.headers.clone(),
            body: options.body.clone(),
            timeout,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = with_timeout(self.transport.send(request.clone()), timeout)
                .await
                .and_then(|response| self.classify(provider, response));

            match result {
                Ok(ok) => return (Ok(ok), attempt),
                Err(err) if options.retry_on_error && self.retry.should_retry(&err, attempt) => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request"
                    );
                    self.metrics.record_retry(provider);
                    sleep(delay).await;
                }
                Err(err) => return (Err(err), attempt),
            }
        }
    }

    fn classify(&self, provider: &str, response: TransportResponse) -> GatewayResult<(Value, u16)> {
        let status = response.status;
        if response.is_success() {
            return Ok((parse_payload(response.body), status));
        }

        let retryable = self.retry.is_retryable_status(status);
        debug!(status, retryable, "Provider returned error status");
        Err(GatewayError::from_status(
            provider,
            status,
            error_message(status, &response.body),
            retryable,
        ))
    }

    /// Snapshot of counters, cache, limiters and health
    #[must_use]
    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            total_requests: self.counters.total(),
            requests_by_provider: self.counters.by_provider(),
            errors_by_provider: self.counters.errors(),
            cache: self.cache.stats(),
            rate_limiters: self.registry.stats(),
            health: self.health.all_statuses().into_iter().collect(),
        }
    }

    /// Current health classification of a provider
    #[must_use]
    pub fn health_status(&self, provider: &str) -> HealthStatus {
        self.health.status(provider)
    }

    /// Detailed health of a provider
    #[must_use]
    pub fn provider_health(&self, provider: &str) -> ProviderHealth {
        self.health.health(provider)
    }

    /// Drop every cached response
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drop cached responses by method and loose URL substring match
    ///
    /// See [`ResponseCache::invalidate`].
    pub fn invalidate_cache(&self, method: Option<HttpMethod>, url: Option<&str>) {
        self.cache.invalidate(method, url);
    }

    /// Reset request counters, cache counters, health records and metrics
    ///
    /// Cached entries and rate limiter state are kept.
    pub fn reset_stats(&self) {
        self.counters.reset();
        self.cache.reset_stats();
        self.health.reset();
        self.metrics.reset();
        info!("Statistics reset");
    }

    /// Prometheus exposition text for this processor
    #[must_use]
    pub fn metrics_text(&self) -> String {
        self.metrics.gather()
    }
}

fn health_gauge(status: HealthStatus) -> f64 {
    match status {
        HealthStatus::Healthy | HealthStatus::Unknown => 1.0,
        HealthStatus::Degraded => 0.5,
        HealthStatus::Down => 0.0,
    }
}

/// JSON when the body parses, the raw text otherwise
fn parse_payload(body: String) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(_) => Value::String(body),
    }
}

fn error_message(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("error status")
            .to_string();
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}
