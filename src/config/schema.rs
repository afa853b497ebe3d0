//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Hostname to upstream mappings.
    pub routes: RoutesConfig,

    /// Hostnames that get special treatment in the pipeline.
    pub hosts: HostsConfig,

    /// Distributed rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Wrapper around the route list so an absent `[[routes]]` section falls
/// back to the built-in table while an explicit one replaces it entirely.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RoutesConfig(pub Vec<RouteConfig>);

impl Default for RoutesConfig {
    fn default() -> Self {
        let upstream = "[fdaa:0:ae33:a7b:8dd7:0:a:202]";
        Self(vec![
            RouteConfig::new("api.pluralkit.me", format!("{upstream}:5000")),
            RouteConfig::new("dash.pluralkit.me", format!("{upstream}:8080")),
            RouteConfig::new("sentry.pluralkit.me", format!("{upstream}:9000")),
        ])
    }
}

/// A single hostname → upstream mapping.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Host header to match (exact, case-sensitive).
    pub host: String,

    /// Upstream address (e.g., "127.0.0.1:5000" or "[::1]:5000").
    pub target: String,
}

impl RouteConfig {
    pub fn new(host: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            target: target.into(),
        }
    }
}

/// Hostnames and URLs driving host-specific behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostsConfig {
    /// The public API host: CORS, version checks, rate limiting, route labels.
    pub api_host: String,

    /// The dashboard host: immutable caching of hashed static assets.
    pub dashboard_host: String,

    /// Where requests for unknown hostnames are redirected.
    pub landing_url: String,

    /// Where requests for the API root are redirected.
    pub api_docs_url: String,

    /// Path prefixes of API versions that get a route label.
    pub api_version_prefixes: Vec<String>,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            api_host: "api.pluralkit.me".to_string(),
            dashboard_host: "dash.pluralkit.me".to_string(),
            landing_url: "https://pluralkit.me".to_string(),
            api_docs_url: "https://pluralkit.me/api".to_string(),
            api_version_prefixes: vec!["/v2".to_string()],
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting on the API host.
    pub enabled: bool,

    /// Redis connection URL (redis:// or rediss://).
    pub redis_url: Option<String>,

    /// Namespace prepended to every key written to the store.
    pub key_prefix: String,

    /// Header carrying the client IP as seen by the edge network.
    pub client_ip_header: String,

    /// Header carrying the privileged client credential.
    pub privileged_header: String,

    /// Secret the privileged header must equal. `None` disables the tier.
    pub privileged_secret: Option<String>,

    /// Identity used as the limiter key for privileged clients.
    pub privileged_key: String,

    /// Policy for anonymous clients, keyed by IP.
    pub anonymous: PolicyConfig,

    /// Policy for privileged clients.
    pub privileged: PolicyConfig,

    /// Upper bound on connecting to and hearing back from the store, in
    /// milliseconds. Past it the request fails closed.
    pub store_timeout_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: None,
            key_prefix: "ratelimit:".to_string(),
            client_ip_header: "Fly-Client-IP".to_string(),
            privileged_header: "X-PluralKit-App".to_string(),
            privileged_secret: None,
            privileged_key: "token2".to_string(),
            anonymous: PolicyConfig {
                period_secs: 1,
                rate: 2,
                burst: 5,
            },
            privileged: PolicyConfig {
                period_secs: 1,
                rate: 20,
                burst: 5,
            },
            store_timeout_ms: 1_000,
        }
    }
}

/// A `(period, rate, burst)` triple.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct PolicyConfig {
    pub period_secs: u64,
    pub rate: u32,
    pub burst: u32,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Maximum time to wait for upstream response headers, in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { upstream_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Requests slower than this many milliseconds are logged at warn level.
    pub slow_request_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9091".to_string(),
            slow_request_ms: 2_000,
        }
    }
}
