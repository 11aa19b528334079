//! Response envelope for the gateway.
//!
//! Every call through the processor ends in an [`ApiResponse`], whether it
//! was served from cache, succeeded after retries, or failed for good.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uniform result envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether the call succeeded
    pub success: bool,

    /// Parsed payload on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Last error message on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// HTTP status code, when the provider answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Wall-clock time spent in the call, admission wait included
    pub response_time_ms: f64,

    /// Whether the payload came from the cache
    pub cached: bool,

    /// Number of network attempts made (0 for cache hits)
    pub attempts: u32,

    /// Provider the call was addressed to
    pub provider: String,
}

impl ApiResponse {
    /// Successful network response
    #[must_use]
    pub fn success(
        provider: impl Into<String>,
        data: Value,
        status_code: u16,
        response_time_ms: f64,
        attempts: u32,
    ) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status_code: Some(status_code),
            response_time_ms,
            cached: false,
            attempts,
            provider: provider.into(),
        }
    }

    /// Response served from cache
    #[must_use]
    pub fn cached(provider: impl Into<String>, data: Value, status_code: u16) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status_code: Some(status_code),
            response_time_ms: 0.0,
            cached: true,
            attempts: 0,
            provider: provider.into(),
        }
    }

    /// Failed call carrying the last observed error
    #[must_use]
    pub fn failure(
        provider: impl Into<String>,
        error: &GatewayError,
        response_time_ms: f64,
        attempts: u32,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            status_code: error.status_code(),
            response_time_ms,
            cached: false,
            attempts,
            provider: provider.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_envelope_keeps_status() {
        let err = GatewayError::from_status("x", 404, "missing", false);
        let resp = ApiResponse::failure("x", &err, 12.5, 1);

        assert!(!resp.success);
        assert!(resp.data.is_none());
        assert_eq!(resp.status_code, Some(404));
        assert_eq!(resp.attempts, 1);
        assert!(resp.error.as_deref().unwrap_or_default().contains("404"));
    }

    #[test]
    fn test_cached_envelope() {
        let resp = ApiResponse::cached("x", json!({"price": 10}), 200);
        assert!(resp.success && resp.cached);
        assert_eq!(resp.attempts, 0);
        assert!(resp.response_time_ms.abs() < f64::EPSILON);
    }

    #[test]
    fn test_envelope_serialization_skips_empty_fields() {
        let resp = ApiResponse::success("x", json!([1, 2]), 200, 3.0, 1);
        let value = serde_json::to_value(&resp).expect("serialize");
        assert!(value.get("error").is_none());
        assert_eq!(value["status_code"], 200);
        assert_eq!(value["cached"], false);
    }
}
