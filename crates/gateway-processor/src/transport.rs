//! HTTP transport seam.
//!
//! The processor talks to providers through the [`Transport`] trait. A
//! transport reports every HTTP answer as a [`TransportResponse`], error
//! statuses included; only failures to get an answer at all are errors.
//! Status classification belongs to the processor's retry policy.

use async_trait::async_trait;
use gateway_config::TransportSettings;
use gateway_core::{GatewayError, HttpMethod};
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace};

/// A single outbound call
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// Provider the call belongs to
    pub provider: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Target URL
    pub url: String,
    /// Query parameters
    pub params: BTreeMap<String, String>,
    /// Extra headers
    pub headers: BTreeMap<String, String>,
    /// JSON body
    pub body: Option<Value>,
    /// Deadline for this attempt
    pub timeout: Duration,
}

/// Raw provider answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl TransportResponse {
    /// Create a response
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is below 400
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// Outbound HTTP transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return whatever the provider answered
    ///
    /// # Errors
    /// Returns `Transport`, `Timeout` or `InvalidRequest` when no HTTP answer
    /// was obtained
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, GatewayError>;
}

/// Transport configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Per-attempt timeout when the caller gives none
    pub request_timeout: Duration,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,
    /// How long an idle pooled connection is kept
    pub pool_idle_timeout: Duration,
    /// User-Agent header
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from(&TransportSettings::default())
    }
}

impl From<&TransportSettings> for TransportConfig {
    fn from(settings: &TransportSettings) -> Self {
        Self {
            request_timeout: settings.request_timeout,
            connect_timeout: settings.connect_timeout,
            pool_max_idle_per_host: settings.pool_max_idle_per_host,
            pool_idle_timeout: settings.pool_idle_timeout,
            user_agent: settings.user_agent.clone(),
        }
    }
}

/// `reqwest` transport with a shared connection pool
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build the pooled client
    ///
    /// # Errors
    /// Returns `GatewayError::Configuration` if the client cannot be created
    pub fn new(config: &TransportConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| GatewayError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Patch => Method::PATCH,
        }
    }

    fn map_error(provider: &str, timeout: Duration, e: &reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::timeout(timeout)
        } else if e.is_builder() {
            GatewayError::invalid_request(e.to_string())
        } else {
            GatewayError::transport(provider, e.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, GatewayError> {
        debug!(
            provider = %request.provider,
            method = %request.method,
            url = %request.url,
            "Sending request"
        );

        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url)
            .timeout(request.timeout);

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(&request.provider, request.timeout, &e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_error(&request.provider, request.timeout, &e))?;

        trace!(provider = %request.provider, status, bytes = body.len(), "Response received");
        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_from_settings() {
        let settings = TransportSettings {
            pool_max_idle_per_host: 4,
            ..TransportSettings::default()
        };
        let config = TransportConfig::from(&settings);
        assert_eq!(config.pool_max_idle_per_host, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("api-gateway/"));
    }

    #[test]
    fn test_response_success_boundary() {
        assert!(TransportResponse::new(200, "").is_success());
        assert!(TransportResponse::new(304, "").is_success());
        assert!(!TransportResponse::new(400, "").is_success());
    }

    #[tokio::test]
    async fn test_malformed_url_is_invalid_request() {
        let transport = HttpTransport::new(&TransportConfig::default()).expect("client");
        let err = transport
            .send(TransportRequest {
                provider: "x".to_string(),
                method: HttpMethod::Get,
                url: "not a url".to_string(),
                params: BTreeMap::new(),
                headers: BTreeMap::new(),
                body: None,
                timeout: Duration::from_secs(1),
            })
            .await
            .expect_err("malformed url");

        assert!(matches!(err, GatewayError::InvalidRequest { .. }));
        assert!(!err.is_retryable());
    }
}
