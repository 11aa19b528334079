//! Timeout helpers for outbound calls.

use gateway_core::GatewayError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Execute a fallible operation with a deadline
///
/// # Errors
/// Returns `GatewayError::Timeout` if the operation outlives `timeout`,
/// otherwise whatever the operation returned
pub async fn with_timeout<F, T>(future: F, timeout: Duration) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    if let Ok(result) = tokio::time::timeout(timeout, future).await {
        result
    } else {
        warn!(timeout_ms = timeout.as_millis(), "Request timed out");
        Err(GatewayError::timeout(timeout))
    }
}
