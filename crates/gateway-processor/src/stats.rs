//! Aggregate request counters and the statistics snapshot.

use dashmap::DashMap;
use gateway_resilience::{BucketStats, CacheStats, ProviderHealth};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of the processor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorStats {
    /// Requests that reached the network
    pub total_requests: u64,
    /// Network requests per provider
    pub requests_by_provider: BTreeMap<String, u64>,
    /// Failed requests per provider
    pub errors_by_provider: BTreeMap<String, u64>,
    /// Response cache statistics
    pub cache: CacheStats,
    /// Rate limiter state per provider
    pub rate_limiters: BTreeMap<String, BucketStats>,
    /// Health per provider
    pub health: BTreeMap<String, ProviderHealth>,
}

impl ProcessorStats {
    /// Fraction of network requests that failed, in percent
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        let errors: u64 = self.errors_by_provider.values().sum();
        errors as f64 / self.total_requests as f64 * 100.0
    }
}

/// Monotonic request counters, reset only explicitly
#[derive(Debug, Default)]
pub(crate) struct RequestCounters {
    total: AtomicU64,
    by_provider: DashMap<String, u64>,
    errors: DashMap<String, u64>,
}

impl RequestCounters {
    pub(crate) fn record(&self, provider: &str, success: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        *self.by_provider.entry(provider.to_string()).or_insert(0) += 1;
        if !success {
            *self.errors.entry(provider.to_string()).or_insert(0) += 1;
        }
    }

    pub(crate) fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub(crate) fn by_provider(&self) -> BTreeMap<String, u64> {
        Self::snapshot(&self.by_provider)
    }

    pub(crate) fn errors(&self) -> BTreeMap<String, u64> {
        Self::snapshot(&self.errors)
    }

    pub(crate) fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.by_provider.clear();
        self.errors.clear();
    }

    fn snapshot(map: &DashMap<String, u64>) -> BTreeMap<String, u64> {
        map.iter().map(|e| (e.key().clone(), *e.value())).collect()
    }
}
