//! Error types and handling for the gateway.
//!
//! Every failure an outbound call can run into maps onto one variant here.
//! The retry loop only asks [`GatewayError::is_retryable`]; callers normally
//! see these errors flattened into the `error` field of an
//! [`ApiResponse`](crate::ApiResponse).

use std::time::Duration;
use thiserror::Error;

/// Result type alias using `GatewayError`
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error type covering transport, upstream and configuration failures
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The connection could not be established or broke mid-flight
    #[error("Transport error: {provider} - {message}")]
    Transport {
        /// Provider the call was addressed to
        provider: String,
        /// Error message
        message: String,
    },

    /// The call did not complete within its deadline
    #[error("Request timeout after {duration:?}")]
    Timeout {
        /// Duration after which the request timed out
        duration: Duration,
    },

    /// Upstream answered with a status worth retrying (429, 5xx)
    #[error("Provider {provider} returned retryable status {status_code}: {message}")]
    RetryableStatus {
        /// Provider that returned the error
        provider: String,
        /// HTTP status code
        status_code: u16,
        /// Response body or reason
        message: String,
    },

    /// Upstream rejected the call; retrying will not help
    #[error("Provider {provider} returned status {status_code}: {message}")]
    ClientStatus {
        /// Provider that returned the error
        provider: String,
        /// HTTP status code
        status_code: u16,
        /// Response body or reason
        message: String,
    },

    /// The request could not be built (bad URL, bad header)
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Check if this error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::RetryableStatus { .. }
        )
    }

    /// HTTP status code observed from the provider, if any
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RetryableStatus { status_code, .. } | Self::ClientStatus { status_code, .. } => {
                Some(*status_code)
            }
            _ => None,
        }
    }

    /// Get the error type string used in logs and metrics labels
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport_error",
            Self::Timeout { .. } => "timeout_error",
            Self::RetryableStatus { .. } => "retryable_server_error",
            Self::ClientStatus { .. } => "client_error",
            Self::InvalidRequest { .. } => "invalid_request_error",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Classify an HTTP error status from a provider
    ///
    /// `retryable` comes from the active retry policy, which owns the list of
    /// statuses worth retrying.
    #[must_use]
    pub fn from_status(
        provider: impl Into<String>,
        status_code: u16,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        if retryable {
            Self::RetryableStatus {
                provider: provider.into(),
                status_code,
                message: message.into(),
            }
        } else {
            Self::ClientStatus {
                provider: provider.into(),
                status_code,
                message: message.into(),
            }
        }
    }

    /// Create an invalid request error
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
