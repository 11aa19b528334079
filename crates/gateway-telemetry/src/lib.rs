//! # Gateway Telemetry
//!
//! Observability for the outbound API gateway:
//! - `tracing-subscriber` initialisation (json, pretty or compact output)
//! - Prometheus collectors for requests, retries, admission waits and cache use

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
pub use metrics::{CacheOutcome, GatewayMetrics};
