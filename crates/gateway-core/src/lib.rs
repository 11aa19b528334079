//! # Gateway Core
//!
//! Shared vocabulary for the outbound API gateway:
//! - Error taxonomy with retry classification
//! - HTTP method and per-request options
//! - The uniform result envelope returned to callers
//! - Provider health status

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod provider;
pub mod request;
pub mod response;

pub use error::{GatewayError, GatewayResult};
pub use provider::HealthStatus;
pub use request::{HttpMethod, RequestOptions};
pub use response::ApiResponse;
