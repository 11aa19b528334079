//! Response caching for idempotent provider calls.
//!
//! Provides an in-memory cache keyed by a hash of method, URL, query
//! parameters and body. Entries expire after their TTL; when the cache is
//! full the least recently accessed entry is evicted. Recency is tracked with
//! a per-entry access timestamp rather than a linked list, so eviction is a
//! linear scan over a bounded map.
//!
//! The cache does not decide what is cacheable. The processor only offers it
//! GET responses.

use gateway_core::HttpMethod;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Cache configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Maximum number of entries in the cache
    pub max_entries: usize,
    /// Default TTL for cache entries
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
            default_ttl: Duration::from_secs(300),
        }
    }
}

/// A cached provider payload
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    /// Parsed response body
    pub data: Value,
    /// Status code the provider answered with
    pub status_code: u16,
}

impl CachedResponse {
    /// Create a cached payload
    #[must_use]
    pub fn new(data: Value, status_code: u16) -> Self {
        Self { data, status_code }
    }
}

/// Stand-in deadline for TTLs too large to add to an `Instant`
const NEVER_EXPIRES: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A cached response entry
#[derive(Debug, Clone)]
struct CacheEntry {
    response: CachedResponse,
    cached_at: Instant,
    expires_at: Instant,
    last_accessed: Instant,
    size_bytes: usize,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cache key derived from a request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: HttpMethod,
    url: String,
    fingerprint: u64,
}

impl CacheKey {
    /// Build a key from request parts
    ///
    /// Parameters are already ordered; object keys inside the body are
    /// hashed in sorted order, so `{"a":1,"b":2}` and `{"b":2,"a":1}` share
    /// a key.
    #[must_use]
    pub fn new(
        method: HttpMethod,
        url: &str,
        params: &BTreeMap<String, String>,
        body: Option<&Value>,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        method.hash(&mut hasher);
        url.hash(&mut hasher);
        for (k, v) in params {
            k.hash(&mut hasher);
            v.hash(&mut hasher);
        }
        match body {
            Some(body) => {
                1u8.hash(&mut hasher);
                hash_value(body, &mut hasher);
            }
            None => 0u8.hash(&mut hasher),
        }

        Self {
            method,
            url: url.to_string(),
            fingerprint: hasher.finish(),
        }
    }

    /// Method part of the key
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// URL part of the key
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn hash_value<H: Hasher>(value: &Value, hasher: &mut H) {
    match value {
        Value::Null => 0u8.hash(hasher),
        Value::Bool(b) => {
            1u8.hash(hasher);
            b.hash(hasher);
        }
        Value::Number(n) => {
            2u8.hash(hasher);
            n.to_string().hash(hasher);
        }
        Value::String(s) => {
            3u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Array(items) => {
            4u8.hash(hasher);
            items.len().hash(hasher);
            for item in items {
                hash_value(item, hasher);
            }
        }
        Value::Object(map) => {
            5u8.hash(hasher);
            map.len().hash(hasher);
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                key.hash(hasher);
                hash_value(&map[key], hasher);
            }
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,
    /// Capacity
    pub max_size: usize,
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Hit rate as a percentage
    pub hit_rate: f64,
    /// Number of evictions (capacity and expiry)
    pub evictions: u64,
    /// Rough memory held by cached payloads
    pub approx_memory_bytes: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
    memory_bytes: usize,
}

impl CacheState {
    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.memory_bytes = self.memory_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    fn retain(&mut self, mut keep: impl FnMut(&CacheKey, &CacheEntry) -> bool) -> usize {
        let before = self.entries.len();
        let mut freed = 0;
        self.entries.retain(|k, e| {
            let kept = keep(k, e);
            if !kept {
                freed += e.size_bytes;
            }
            kept
        });
        self.memory_bytes = self.memory_bytes.saturating_sub(freed);
        before - self.entries.len()
    }
}

/// Response cache shared by all providers
pub struct ResponseCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
}

impl ResponseCache {
    /// Create a new response cache
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Create a disabled cache
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(CacheConfig {
            enabled: false,
            ..Default::default()
        })
    }

    /// Check if caching is enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.config.max_entries > 0
    }

    /// Default TTL applied when `set` is given none
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl
    }

    /// Look up a cached response
    ///
    /// Counts a hit or a miss and refreshes recency on a hit. An expired
    /// entry is dropped and counted as a miss.
    pub fn get(
        &self,
        method: HttpMethod,
        url: &str,
        params: &BTreeMap<String, String>,
        body: Option<&Value>,
    ) -> Option<CachedResponse> {
        if !self.is_enabled() {
            return None;
        }

        let key = CacheKey::new(method, url, params, body);
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let expired = match state.entries.get_mut(&key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.last_accessed = now;
                let response = entry.response.clone();
                let age_ms = now.saturating_duration_since(entry.cached_at).as_millis();
                state.hits += 1;
                debug!(%method, url, age_ms, "Cache hit");
                return Some(response);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.remove(&key);
            state.evictions += 1;
            debug!(%method, url, "Cache miss (expired)");
        } else {
            debug!(%method, url, "Cache miss");
        }
        state.misses += 1;
        None
    }

    /// Store a response
    ///
    /// Expires after `ttl`, or the configured default. When the cache is full
    /// expired entries are purged first, then the least recently accessed
    /// entry is evicted. Overwriting an existing key never evicts.
    pub fn set(
        &self,
        method: HttpMethod,
        url: &str,
        response: CachedResponse,
        params: &BTreeMap<String, String>,
        body: Option<&Value>,
        ttl: Option<Duration>,
    ) {
        if !self.is_enabled() {
            return;
        }

        let key = CacheKey::new(method, url, params, body);
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or_else(|| now + NEVER_EXPIRES);
        let size_bytes = url.len()
            + serde_json::to_vec(&response.data).map_or(0, |bytes| bytes.len());

        let mut state = self.state.lock();
        state.remove(&key);

        if state.entries.len() >= self.config.max_entries {
            self.evict(&mut state, now);
        }

        state.memory_bytes += size_bytes;
        state.entries.insert(
            key,
            CacheEntry {
                response,
                cached_at: now,
                expires_at,
                last_accessed: now,
                size_bytes,
            },
        );

        debug!(
            %method,
            url,
            ttl_ms = ttl.as_millis(),
            entries = state.entries.len(),
            "Response cached"
        );
    }

    /// Make room for one entry
    fn evict(&self, state: &mut CacheState, now: Instant) {
        let removed_expired = state.retain(|_, entry| !entry.is_expired(now));
        let mut removed = removed_expired;

        while state.entries.len() >= self.config.max_entries {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    state.remove(&key);
                    removed += 1;
                }
                None => break,
            }
        }

        state.evictions += removed as u64;
        if removed > 0 {
            debug!(removed_expired, removed_total = removed, "Cache eviction completed");
        }
    }

    /// Invalidate cached entries
    ///
    /// With neither argument every entry is dropped. Otherwise an entry is
    /// dropped when its method equals `method` (if given) and its URL
    /// *contains* `url` as a substring (if given). The URL match is loose:
    /// `"/v1/quote"` also removes `"/v1/quotes/history"`.
    pub fn invalidate(&self, method: Option<HttpMethod>, url: Option<&str>) {
        if method.is_none() && url.is_none() {
            self.clear();
            return;
        }

        let mut state = self.state.lock();
        let removed = state.retain(|key, _| {
            let method_match = method.map_or(true, |m| key.method == m);
            let url_match = url.map_or(true, |u| key.url.contains(u));
            !(method_match && url_match)
        });
        state.evictions += removed as u64;

        if removed > 0 {
            info!(?method, url, removed, "Cache entries invalidated");
        }
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.memory_bytes = 0;
        info!("Cache cleared");
    }

    /// Remove expired entries
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let removed = state.retain(|_, entry| !entry.is_expired(now));
        state.evictions += removed as u64;
        if removed > 0 {
            debug!(removed, "Expired cache entries removed");
        }
        removed
    }

    /// Reset hit / miss / eviction counters, keeping entries
    pub fn reset_stats(&self) {
        let mut state = self.state.lock();
        state.hits = 0;
        state.misses = 0;
        state.evictions = 0;
    }

    /// Number of stored entries, expired ones included until touched
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let total = state.hits + state.misses;
        CacheStats {
            size: state.entries.len(),
            max_size: self.config.max_entries,
            hits: state.hits,
            misses: state.misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                state.hits as f64 / total as f64 * 100.0
            },
            evictions: state.evictions,
            approx_memory_bytes: state.memory_bytes,
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::advance;

    fn no_params() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn payload(n: i64) -> CachedResponse {
        CachedResponse::new(json!({ "value": n }), 200)
    }

    fn small_cache(max_entries: usize) -> ResponseCache {
        ResponseCache::new(CacheConfig {
            enabled: true,
            max_entries,
            default_ttl: Duration::from_secs(3600),
        })
    }

    fn put(cache: &ResponseCache, url: &str, n: i64) {
        cache.set(HttpMethod::Get, url, payload(n), &no_params(), None, None);
    }

    fn lookup(cache: &ResponseCache, url: &str) -> Option<CachedResponse> {
        cache.get(HttpMethod::Get, url, &no_params(), None)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit() {
        let cache = ResponseCache::with_defaults();
        put(&cache, "https://api.example.com/quote", 1);

        let cached = lookup(&cache, "https://api.example.com/quote");
        assert_eq!(cached, Some(payload(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_miss() {
        let cache = ResponseCache::with_defaults();
        assert!(lookup(&cache, "https://api.example.com/quote").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_key_includes_params_and_method() {
        let cache = ResponseCache::with_defaults();
        let mut params = BTreeMap::new();
        params.insert("symbol".to_string(), "AAPL".to_string());

        cache.set(HttpMethod::Get, "/quote", payload(1), &params, None, None);

        assert!(cache.get(HttpMethod::Get, "/quote", &params, None).is_some());
        assert!(cache.get(HttpMethod::Get, "/quote", &no_params(), None).is_none());
        assert!(cache.get(HttpMethod::Post, "/quote", &params, None).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_boundary() {
        let cache = ResponseCache::with_defaults();
        cache.set(
            HttpMethod::Get,
            "/quote",
            payload(1),
            &no_params(),
            None,
            Some(Duration::from_secs(10)),
        );

        advance(Duration::from_millis(9_999)).await;
        assert!(lookup(&cache, "/quote").is_some());

        advance(Duration::from_millis(1)).await;
        assert!(lookup(&cache, "/quote").is_none());
        assert_eq!(cache.len(), 0, "expired entry is dropped on lookup");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_ttl_never_expires() {
        let cache = ResponseCache::with_defaults();
        cache.set(
            HttpMethod::Get,
            "/quote",
            payload(1),
            &no_params(),
            None,
            Some(Duration::MAX),
        );

        advance(Duration::from_secs(10 * 365 * 24 * 60 * 60)).await;
        assert_eq!(lookup(&cache, "/quote"), Some(payload(1)));
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_applies() {
        let cache = ResponseCache::new(CacheConfig {
            enabled: true,
            max_entries: 10,
            default_ttl: Duration::from_secs(5),
        });
        put(&cache, "/quote", 1);

        advance(Duration::from_secs(4)).await;
        assert!(lookup(&cache, "/quote").is_some());
        advance(Duration::from_secs(1)).await;
        assert!(lookup(&cache, "/quote").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_removes_least_recently_accessed() {
        let cache = small_cache(3);

        put(&cache, "/a", 1);
        advance(Duration::from_millis(10)).await;
        put(&cache, "/b", 2);
        advance(Duration::from_millis(10)).await;
        put(&cache, "/c", 3);
        advance(Duration::from_millis(10)).await;

        // Touch /a so /b becomes the least recently accessed
        assert!(lookup(&cache, "/a").is_some());
        advance(Duration::from_millis(10)).await;

        put(&cache, "/d", 4);

        assert_eq!(cache.len(), 3);
        assert!(lookup(&cache, "/b").is_none());
        assert!(lookup(&cache, "/a").is_some());
        assert!(lookup(&cache, "/c").is_some());
        assert!(lookup(&cache, "/d").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_never_exceeds_capacity() {
        let cache = small_cache(5);
        for i in 0..50 {
            put(&cache, &format!("/item/{i}"), i);
            advance(Duration::from_millis(1)).await;
            assert!(cache.len() <= 5);
        }
        assert_eq!(cache.stats().size, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_does_not_evict() {
        let cache = small_cache(2);
        put(&cache, "/a", 1);
        put(&cache, "/b", 2);
        put(&cache, "/a", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(lookup(&cache, "/a"), Some(payload(3)));
        assert!(lookup(&cache, "/b").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_disabled() {
        let cache = ResponseCache::disabled();
        put(&cache, "/quote", 1);
        assert!(lookup(&cache, "/quote").is_none());
        assert_eq!(cache.stats().misses, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_stats() {
        let cache = ResponseCache::with_defaults();

        lookup(&cache, "/quote");
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);

        put(&cache, "/quote", 1);
        lookup(&cache, "/quote");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 50.0).abs() < 0.1);
        assert!(stats.approx_memory_bytes > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_all() {
        let cache = ResponseCache::with_defaults();
        put(&cache, "/a", 1);
        put(&cache, "/b", 2);

        cache.invalidate(None, None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().approx_memory_bytes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_by_url_substring() {
        let cache = ResponseCache::with_defaults();
        put(&cache, "https://api.example.com/v1/quote", 1);
        put(&cache, "https://api.example.com/v1/quotes/history", 2);
        put(&cache, "https://api.example.com/v1/news", 3);

        cache.invalidate(None, Some("/v1/quote"));

        assert!(lookup(&cache, "https://api.example.com/v1/quote").is_none());
        assert!(lookup(&cache, "https://api.example.com/v1/quotes/history").is_none());
        assert!(lookup(&cache, "https://api.example.com/v1/news").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_by_method() {
        let cache = ResponseCache::with_defaults();
        put(&cache, "/a", 1);

        cache.invalidate(Some(HttpMethod::Post), None);
        assert!(lookup(&cache, "/a").is_some());

        cache.invalidate(Some(HttpMethod::Get), Some("/a"));
        assert!(lookup(&cache, "/a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_expired() {
        let cache = small_cache(10);
        cache.set(HttpMethod::Get, "/short", payload(1), &no_params(), None, Some(Duration::from_secs(1)));
        put(&cache, "/long", 2);

        advance(Duration::from_secs(2)).await;
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_key_ignores_body_key_order() {
        let a = json!({"address": "0xabc", "page": 1, "filter": {"x": 1, "y": 2}});
        let b = json!({"filter": {"y": 2, "x": 1}, "page": 1, "address": "0xabc"});

        let key_a = CacheKey::new(HttpMethod::Get, "/tx", &BTreeMap::new(), Some(&a));
        let key_b = CacheKey::new(HttpMethod::Get, "/tx", &BTreeMap::new(), Some(&b));
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn test_cache_key_different_content() {
        let key_a = CacheKey::new(HttpMethod::Get, "/tx", &BTreeMap::new(), Some(&json!({"page": 1})));
        let key_b = CacheKey::new(HttpMethod::Get, "/tx", &BTreeMap::new(), Some(&json!({"page": 2})));
        let key_c = CacheKey::new(HttpMethod::Get, "/tx", &BTreeMap::new(), None);

        assert_ne!(key_a, key_b);
        assert_ne!(key_a, key_c);
        assert_eq!(key_a.url(), "/tx");
        assert_eq!(key_a.method(), HttpMethod::Get);
    }
}
