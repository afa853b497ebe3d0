//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the configured Redis URL.
pub const ENV_REDIS_URL: &str = "EDGE_PROXY_REDIS_URL";
/// Overrides the configured privileged client secret.
pub const ENV_PRIVILEGED_SECRET: &str = "EDGE_PROXY_PRIVILEGED_SECRET";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, apply environment overrides and validate.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let mut config: ProxyConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    finish(config)
}

/// Validate the built-in defaults with environment overrides applied.
pub fn default_config() -> Result<ProxyConfig, ConfigError> {
    let mut config = ProxyConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    finish(config)
}

fn finish(config: ProxyConfig) -> Result<ProxyConfig, ConfigError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Secrets are kept out of config files and injected through the environment.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_REDIS_URL).filter(|v| !v.is_empty()) {
        config.rate_limit.redis_url = Some(url);
    }
    if let Some(secret) = lookup(ENV_PRIVILEGED_SECRET).filter(|v| !v.is_empty()) {
        config.rate_limit.privileged_secret = Some(secret);
    }
}
