//! # Gateway Processor
//!
//! The request pipeline of the outbound API gateway. An [`ApiProcessor`]
//! sits between an application and its rate-limited third-party APIs:
//! - per-provider token-bucket admission ([`ProviderRegistry`])
//! - TTL response caching for GET calls
//! - bounded retries with exponential backoff
//! - provider health tracking with hysteresis
//! - a pooled `reqwest` transport behind the [`Transport`] trait
//!
//! ```no_run
//! use gateway_core::RequestOptions;
//! use gateway_processor::{ApiProcessor, ProcessorConfig};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), gateway_core::GatewayError> {
//! let config = ProcessorConfig::default().with_provider("etherscan", 5, Duration::from_secs(1));
//! let processor = ApiProcessor::new(config)?;
//!
//! let response = processor
//!     .get(
//!         "https://api.etherscan.io/api",
//!         "etherscan",
//!         RequestOptions::new().param("module", "stats").param("action", "ethprice"),
//!     )
//!     .await;
//! println!("{} after {} attempts", response.success, response.attempts);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod processor;
pub mod registry;
pub mod stats;
pub mod transport;

pub use config::{ProcessorConfig, ProviderQuota};
pub use processor::ApiProcessor;
pub use registry::ProviderRegistry;
pub use stats::ProcessorStats;
pub use transport::{HttpTransport, Transport, TransportConfig, TransportRequest, TransportResponse};
