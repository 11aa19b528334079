//! Configuration loading from files and environment.
//!
//! Sources are merged field by field in order on top of the defaults, then
//! environment overrides under a prefix (`API_GATEWAY_*` by default) are
//! applied, and the result is validated. File contents support `${VAR}` and `${VAR:-default}`
//! substitution before parsing.

use crate::schema::GatewayConfig;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

/// Environment prefix used by [`load_config`]
pub const DEFAULT_ENV_PREFIX: &str = "API_GATEWAY";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// The path to the file that was not found
        path: String,
    },

    /// IO error
    #[error("IO error reading configuration: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Merged sources do not form a valid configuration
    #[error("Invalid configuration value: {0}")]
    Schema(#[source] serde_json::Error),

    /// Validation error
    #[error("Configuration validation error: {0}")]
    Validation(String),

    /// Unsupported format
    #[error("Unsupported configuration format: {extension}")]
    UnsupportedFormat {
        /// The file extension that was not supported
        extension: String,
    },

    /// Environment override could not be parsed
    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnvValue {
        /// Variable name
        name: String,
        /// Raw value
        value: String,
    },
}

/// Configuration source
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// File path
    File(String),
    /// Raw YAML string
    Yaml(String),
    /// Raw TOML string
    Toml(String),
    /// Raw JSON string
    Json(String),
    /// Default configuration
    Default,
}

/// Configuration loader
#[derive(Debug, Default)]
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration source
    ///
    /// Later sources are merged into earlier ones field by field: a source
    /// that sets only `cache.default_ttl` keeps the `cache.max_size` of the
    /// sources before it. Providers are matched by `name` and merged the same
    /// way; other lists are replaced whole.
    #[must_use]
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a file source
    #[must_use]
    pub fn with_file(self, path: impl Into<String>) -> Self {
        self.with_source(ConfigSource::File(path.into()))
    }

    /// Set environment variable prefix for overrides
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Load configuration from all sources
    ///
    /// # Errors
    /// Returns error if any source fails to load, an override cannot be
    /// parsed, or the merged configuration is invalid
    pub async fn load(self) -> Result<GatewayConfig, ConfigError> {
        let mut merged = Value::Object(Map::new());
        for source in &self.sources {
            let overlay = Self::load_source(source).await?;
            merge_values(&mut merged, overlay);
        }
        let mut config: GatewayConfig =
            serde_json::from_value(merged).map_err(ConfigError::Schema)?;

        if let Some(ref prefix) = self.env_prefix {
            Self::apply_env_overrides(&mut config, prefix)?;
        }

        config
            .validate_config()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        info!(
            providers = config.providers.len(),
            default_limit = config.rate_limit.default_limit,
            "Configuration loaded"
        );
        Ok(config)
    }

    async fn load_source(source: &ConfigSource) -> Result<Value, ConfigError> {
        match source {
            ConfigSource::File(path) => Self::load_file(path).await,
            ConfigSource::Yaml(content) => Self::parse_yaml(&Self::substitute_env_vars(content)?),
            ConfigSource::Toml(content) => Self::parse_toml(&Self::substitute_env_vars(content)?),
            ConfigSource::Json(content) => Self::parse_json(&Self::substitute_env_vars(content)?),
            ConfigSource::Default => Ok(Value::Object(Map::new())),
        }
    }

    async fn load_file(path: &str) -> Result<Value, ConfigError> {
        let path = Path::new(path);

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).await?;
        let content = Self::substitute_env_vars(&content)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        debug!(path = %path.display(), format = %extension, "Loading configuration file");

        match extension.as_str() {
            "yaml" | "yml" => Self::parse_yaml(&content),
            "toml" => Self::parse_toml(&content),
            "json" => Self::parse_json(&content),
            ext => Err(ConfigError::UnsupportedFormat {
                extension: ext.to_string(),
            }),
        }
    }

    fn parse_yaml(content: &str) -> Result<Value, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn parse_toml(content: &str) -> Result<Value, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn parse_json(content: &str) -> Result<Value, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Substitute `${VAR}` and `${VAR:-default}` references
    ///
    /// Unset variables without a default are left in place and logged.
    fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::Validation(format!("substitution pattern: {e}")))?;

        let result = re.replace_all(content, |caps: &Captures<'_>| {
            let var_spec = &caps[1];
            let (var_name, default) = match var_spec.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_spec, None),
            };

            match (std::env::var(var_name), default) {
                (Ok(value), _) => value,
                (Err(_), Some(default)) => default.to_string(),
                (Err(_), None) => {
                    warn!(variable = var_name, "Environment variable not found");
                    caps[0].to_string()
                }
            }
        });

        Ok(result.into_owned())
    }

    /// Apply `{prefix}_*` environment overrides
    fn apply_env_overrides(config: &mut GatewayConfig, prefix: &str) -> Result<(), ConfigError> {
        if let Some(limit) = env_value::<u32>(prefix, "RATE_LIMIT")? {
            config.rate_limit.default_limit = limit;
        }
        if let Some(window) = env_seconds(prefix, "RATE_WINDOW")? {
            config.rate_limit.default_window = window;
        }
        if let Some(ttl) = env_seconds(prefix, "CACHE_TTL")? {
            config.cache.default_ttl = ttl;
        }
        if let Some(enabled) = env_value::<bool>(prefix, "CACHE_ENABLED")? {
            config.cache.enabled = enabled;
        }
        if let Some(retries) = env_value::<u32>(prefix, "MAX_RETRIES")? {
            config.retry.max_retries = retries;
        }
        if let Some(base) = env_value::<f64>(prefix, "BACKOFF_BASE")? {
            config.retry.backoff_base = base;
        }
        if let Some(timeout) = env_seconds(prefix, "REQUEST_TIMEOUT")? {
            config.transport.request_timeout = timeout;
        }
        if let Ok(level) = std::env::var(format!("{prefix}_LOG_LEVEL")) {
            config.logging.level = level;
        }
        Ok(())
    }
}

/// Merge `overlay` into `base`, recursing into objects
///
/// Scalars and lists in `overlay` win; `null` (an empty document) leaves
/// `base` untouched.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                if let Some(slot) = base.get_mut(&key) {
                    match (slot, value) {
                        (Value::Array(existing), Value::Array(providers)) if key == "providers" => {
                            merge_providers(existing, providers);
                        }
                        (slot, value) => merge_values(slot, value),
                    }
                } else {
                    base.insert(key, value);
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Providers with a matching `name` are merged, new ones appended
fn merge_providers(existing: &mut Vec<Value>, overlay: Vec<Value>) {
    for provider in overlay {
        let slot = match provider.get("name") {
            Some(name) => existing.iter_mut().find(|p| p.get("name") == Some(name)),
            None => None,
        };
        match slot {
            Some(slot) => merge_values(slot, provider),
            None => existing.push(provider),
        }
    }
}

fn env_value<T: FromStr>(prefix: &str, key: &str) -> Result<Option<T>, ConfigError> {
    let name = format!("{prefix}_{key}");
    match std::env::var(&name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvValue { name, value }),
        Err(_) => Ok(None),
    }
}

fn env_seconds(prefix: &str, key: &str) -> Result<Option<Duration>, ConfigError> {
    let name = format!("{prefix}_{key}");
    match env_value::<f64>(prefix, key)? {
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvValue {
                name,
                value: secs.to_string(),
            }),
        None => Ok(None),
    }
}

/// Load configuration from default locations
///
/// Looks for configuration in order:
/// 1. Path from `CONFIG_PATH` environment variable
/// 2. ./config.yaml
/// 3. ./config/default.yaml
/// 4. /etc/api-gateway/config.yaml
///
/// `API_GATEWAY_*` overrides are applied whether or not a file was found.
///
/// # Errors
/// Returns error if the file, an override or the final configuration is invalid
pub async fn load_config() -> Result<GatewayConfig, ConfigError> {
    let config_path = std::env::var("CONFIG_PATH").ok();

    let search_paths = if let Some(ref path) = config_path {
        vec![path.as_str()]
    } else {
        vec![
            "config.yaml",
            "config.yml",
            "config/default.yaml",
            "config/default.yml",
            "/etc/api-gateway/config.yaml",
        ]
    };

    let loader = ConfigLoader::new().with_env_prefix(DEFAULT_ENV_PREFIX);

    for path in &search_paths {
        if Path::new(path).exists() {
            info!(path = %path, "Loading configuration");
            return loader.with_file(*path).load().await;
        }
    }

    warn!("No configuration file found, using defaults");
    loader.with_source(ConfigSource::Default).load().await
}
