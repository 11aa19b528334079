//! Provider health tracking.
//!
//! Health is derived from a saturating error counter per provider. Failures
//! push the counter up and can move a provider to `Degraded` or `Down`.
//! Successes only walk it back down one step at a time, and a provider is
//! reported `Healthy` again only once the counter is back at zero. A single
//! lucky call after an outage therefore does not flip the status back.

use chrono::{DateTime, Utc};
use gateway_core::HealthStatus;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

/// Health classification thresholds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthConfig {
    /// Error count above which a provider is degraded
    pub degraded_threshold: u32,
    /// Error count at which a provider is down
    pub down_threshold: u32,
    /// Number of response-time samples kept per provider
    pub window_size: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            degraded_threshold: 3,
            down_threshold: 10,
            window_size: 100,
        }
    }
}

#[derive(Debug)]
struct HealthRecord {
    status: HealthStatus,
    error_count: u32,
    consecutive_failures: u32,
    total_requests: u64,
    total_failures: u64,
    response_times: VecDeque<f64>,
    last_check: DateTime<Utc>,
}

impl HealthRecord {
    fn new(window_size: usize) -> Self {
        Self {
            status: HealthStatus::Unknown,
            error_count: 0,
            consecutive_failures: 0,
            total_requests: 0,
            total_failures: 0,
            response_times: VecDeque::with_capacity(window_size),
            last_check: Utc::now(),
        }
    }

    fn snapshot(&self) -> ProviderHealth {
        let samples = self.response_times.len();
        let avg_response_time_ms = if samples == 0 {
            0.0
        } else {
            self.response_times.iter().sum::<f64>() / samples as f64
        };

        let p95_response_time_ms = if samples == 0 {
            0.0
        } else {
            let mut sorted: Vec<f64> = self.response_times.iter().copied().collect();
            sorted.sort_by(f64::total_cmp);
            let idx = ((samples as f64 * 0.95).ceil() as usize).clamp(1, samples) - 1;
            sorted[idx]
        };

        ProviderHealth {
            status: self.status,
            error_count: self.error_count,
            consecutive_failures: self.consecutive_failures,
            total_requests: self.total_requests,
            total_failures: self.total_failures,
            avg_response_time_ms,
            p95_response_time_ms,
            samples,
            last_check: Some(self.last_check),
        }
    }
}

/// Point-in-time view of a provider's health
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderHealth {
    /// Current classification
    pub status: HealthStatus,
    /// Hysteresis error counter
    pub error_count: u32,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Requests recorded
    pub total_requests: u64,
    /// Failures recorded
    pub total_failures: u64,
    /// Mean over the sample window
    pub avg_response_time_ms: f64,
    /// 95th percentile over the sample window
    pub p95_response_time_ms: f64,
    /// Samples currently in the window
    pub samples: usize,
    /// When the last outcome was recorded
    pub last_check: Option<DateTime<Utc>>,
}

impl ProviderHealth {
    fn unknown() -> Self {
        Self {
            status: HealthStatus::Unknown,
            error_count: 0,
            consecutive_failures: 0,
            total_requests: 0,
            total_failures: 0,
            avg_response_time_ms: 0.0,
            p95_response_time_ms: 0.0,
            samples: 0,
            last_check: None,
        }
    }
}

/// Health monitor shared by all providers
#[derive(Debug)]
pub struct HealthMonitor {
    config: HealthConfig,
    records: RwLock<HashMap<String, HealthRecord>>,
}

impl HealthMonitor {
    /// Create a new health monitor
    #[must_use]
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Create with default thresholds
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(HealthConfig::default())
    }

    /// Record the outcome of a finished request
    pub fn record_outcome(&self, provider: &str, success: bool, response_time_ms: f64) {
        let mut records = self.records.write();
        let record = records
            .entry(provider.to_string())
            .or_insert_with(|| HealthRecord::new(self.config.window_size));

        let previous = record.status;
        record.total_requests += 1;
        record.last_check = Utc::now();

        if self.config.window_size > 0 {
            if record.response_times.len() >= self.config.window_size {
                record.response_times.pop_front();
            }
            record.response_times.push_back(response_time_ms);
        }

        if success {
            record.error_count = record.error_count.saturating_sub(1);
            record.consecutive_failures = 0;
            if record.error_count == 0 {
                record.status = HealthStatus::Healthy;
            } else if record.status == HealthStatus::Down
                && record.error_count < self.config.down_threshold
            {
                record.status = HealthStatus::Degraded;
            } else if record.status == HealthStatus::Unknown {
                record.status = HealthStatus::Healthy;
            }
        } else {
            record.error_count = record.error_count.saturating_add(1);
            record.consecutive_failures = record.consecutive_failures.saturating_add(1);
            record.total_failures += 1;
            if record.error_count >= self.config.down_threshold {
                record.status = HealthStatus::Down;
            } else if record.error_count > self.config.degraded_threshold {
                record.status = HealthStatus::Degraded;
            }
        }

        if record.status != previous {
            match record.status {
                HealthStatus::Down => warn!(
                    provider,
                    error_count = record.error_count,
                    "Provider marked down"
                ),
                HealthStatus::Degraded => warn!(
                    provider,
                    error_count = record.error_count,
                    from = %previous,
                    "Provider degraded"
                ),
                _ => info!(provider, from = %previous, to = %record.status, "Provider health changed"),
            }
        } else {
            debug!(
                provider,
                success,
                error_count = record.error_count,
                response_time_ms,
                "Health outcome recorded"
            );
        }
    }

    /// Current status of a provider
    #[must_use]
    pub fn status(&self, provider: &str) -> HealthStatus {
        self.records
            .read()
            .get(provider)
            .map_or(HealthStatus::Unknown, |r| r.status)
    }

    /// Detailed health of a provider; `Unknown` if nothing was recorded
    #[must_use]
    pub fn health(&self, provider: &str) -> ProviderHealth {
        self.records
            .read()
            .get(provider)
            .map_or_else(ProviderHealth::unknown, HealthRecord::snapshot)
    }

    /// Health of every provider seen so far
    #[must_use]
    pub fn all_statuses(&self) -> HashMap<String, ProviderHealth> {
        self.records
            .read()
            .iter()
            .map(|(id, record)| (id.clone(), record.snapshot()))
            .collect()
    }

    /// Providers that should currently receive traffic
    #[must_use]
    pub fn routable_providers(&self) -> Vec<String> {
        self.records
            .read()
            .iter()
            .filter(|(_, r)| r.status.should_route())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Forget all records
    pub fn reset(&self) {
        self.records.write().clear();
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::with_defaults()
    }
}
