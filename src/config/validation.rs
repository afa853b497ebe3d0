//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and policy value ranges
//! - Detect duplicate hostnames
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{PolicyConfig, ProxyConfig};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no routes configured")]
    NoRoutes,

    #[error("duplicate route for host '{0}'")]
    DuplicateHost(String),

    #[error("route for host '{host}' has invalid target '{target}'")]
    InvalidTarget { host: String, target: String },

    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{policy} policy: period, rate and burst must all be non-zero")]
    InvalidPolicy { policy: &'static str },

    #[error("rate limiting is enabled but no redis_url is configured")]
    MissingRedisUrl,

    #[error("{field} must be non-zero")]
    ZeroTimeout { field: &'static str },
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.routes.0.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    let mut seen = HashSet::new();
    for route in &config.routes.0 {
        if !seen.insert(route.host.as_str()) {
            errors.push(ValidationError::DuplicateHost(route.host.clone()));
        }
        if route.target.parse::<axum::http::uri::Authority>().is_err() {
            errors.push(ValidationError::InvalidTarget {
                host: route.host.clone(),
                target: route.target.clone(),
            });
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: observability.metrics_address.clone(),
        });
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.enabled {
        if rate_limit.redis_url.is_none() {
            errors.push(ValidationError::MissingRedisUrl);
        }
        check_policy("anonymous", &rate_limit.anonymous, &mut errors);
        check_policy("privileged", &rate_limit.privileged, &mut errors);
        if rate_limit.store_timeout_ms == 0 {
            errors.push(ValidationError::ZeroTimeout {
                field: "rate_limit.store_timeout_ms",
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_policy(name: &'static str, policy: &PolicyConfig, errors: &mut Vec<ValidationError>) {
    if policy.period_secs == 0 || policy.rate == 0 || policy.burst == 0 {
        errors.push(ValidationError::InvalidPolicy { policy: name });
    }
}
