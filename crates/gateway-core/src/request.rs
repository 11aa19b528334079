//! Request types for the gateway.
//!
//! [`RequestOptions`] carries every per-call knob of
//! `ApiProcessor::request`; unset fields fall back to the processor's
//! configured defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// HTTP method of an outbound call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
}

impl HttpMethod {
    /// Upper-case wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    /// Only side-effect-free reads may be served from cache
    #[must_use]
    pub fn is_cache_eligible(&self) -> bool {
        matches!(self, Self::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            _ => Err(format!("Unsupported HTTP method: {s}")),
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// Query parameters, kept sorted so cache keys are order-insensitive
    pub params: BTreeMap<String, String>,
    /// JSON body
    pub body: Option<Value>,
    /// Extra headers
    pub headers: BTreeMap<String, String>,
    /// Per-attempt timeout; `None` uses the processor default
    pub timeout: Option<Duration>,
    /// Whether a GET may be served from / written to the cache
    pub use_cache: bool,
    /// Cache TTL override; `None` uses the cache default
    pub cache_ttl: Option<Duration>,
    /// Whether transient failures are retried
    pub retry_on_error: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            params: BTreeMap::new(),
            body: None,
            headers: BTreeMap::new(),
            timeout: None,
            use_cache: true,
            cache_ttl: None,
            retry_on_error: true,
        }
    }
}

impl RequestOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Replace all query parameters
    #[must_use]
    pub fn with_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Set the JSON body
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable or disable caching for this call
    #[must_use]
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Override the cache TTL
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Enable or disable retries for this call
    #[must_use]
    pub fn with_retry(mut self, retry_on_error: bool) -> Self {
        self.retry_on_error = retry_on_error;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<HttpMethod>(), Ok(HttpMethod::Get));
        assert_eq!("DELETE".parse::<HttpMethod>(), Ok(HttpMethod::Delete));
        assert!("TRACE".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
    }

    #[test]
    fn test_only_get_is_cache_eligible() {
        assert!(HttpMethod::Get.is_cache_eligible());
        assert!(!HttpMethod::Post.is_cache_eligible());
        assert!(!HttpMethod::Put.is_cache_eligible());
        assert!(!HttpMethod::Delete.is_cache_eligible());
    }

    #[test]
    fn test_options_defaults() {
        let opts = RequestOptions::default();
        assert!(opts.use_cache);
        assert!(opts.retry_on_error);
        assert!(opts.timeout.is_none());
        assert!(opts.cache_ttl.is_none());
    }

    #[test]
    fn test_options_builder() {
        let opts = RequestOptions::new()
            .param("symbol", "AAPL")
            .param("interval", "1d")
            .header("X-Api-Key", "k")
            .with_body(json!({"a": 1}))
            .with_timeout(Duration::from_secs(5))
            .with_cache(false)
            .with_retry(false);

        let keys: Vec<&str> = opts.params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["interval", "symbol"]);
        assert_eq!(opts.headers.get("X-Api-Key").map(String::as_str), Some("k"));
        assert_eq!(opts.timeout, Some(Duration::from_secs(5)));
        assert!(!opts.use_cache);
        assert!(!opts.retry_on_error);
    }
}
