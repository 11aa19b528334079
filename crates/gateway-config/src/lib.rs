//! # Gateway Configuration
//!
//! Configuration management for the outbound API gateway, including:
//! - Configuration schema, defaults and validation
//! - Loading from YAML/TOML/JSON files or strings
//! - Environment variable substitution and overrides

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod loader;
pub mod schema;

// Re-export main types
pub use loader::{load_config, ConfigError, ConfigLoader, ConfigSource, DEFAULT_ENV_PREFIX};
pub use schema::{
    CacheSettings, GatewayConfig, HealthSettings, ProviderConfig, RateLimitSettings,
    RetrySettings, TransportSettings,
};
