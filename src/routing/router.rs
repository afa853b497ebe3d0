//! Hostname lookup.
//!
//! # Responsibilities
//! - Store the hostname → upstream table
//! - Look up the upstream for a request's Host header
//! - Return the upstream or an explicit miss
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) host lookup via HashMap
//! - Exact, case-sensitive match; no wildcards or prefixes
//! - Explicit miss rather than silent default

use std::collections::HashMap;
use std::fmt;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::RouteConfig;

/// Address of the single backend serving a hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    authority: Authority,
}

impl Upstream {
    pub fn authority(&self) -> &Authority {
        &self.authority
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.authority.as_str())
    }
}

/// Error building a routing table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("duplicate route for host '{0}'")]
    DuplicateHost(String),

    #[error("invalid upstream '{target}' for host '{host}'")]
    InvalidTarget { host: String, target: String },
}

/// Immutable hostname → upstream table.
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: HashMap<String, Upstream>,
}

impl RoutingTable {
    /// Build the table from configuration, rejecting duplicates.
    pub fn from_config(routes: &[RouteConfig]) -> Result<Self, RoutingError> {
        let mut table = HashMap::with_capacity(routes.len());

        for route in routes {
            let authority = route
                .target
                .parse::<Authority>()
                .map_err(|_| RoutingError::InvalidTarget {
                    host: route.host.clone(),
                    target: route.target.clone(),
                })?;

            if table
                .insert(route.host.clone(), Upstream { authority })
                .is_some()
            {
                return Err(RoutingError::DuplicateHost(route.host.clone()));
            }
        }

        Ok(Self { routes: table })
    }

    /// Look up the upstream for a hostname.
    pub fn resolve(&self, host: &str) -> Option<&Upstream> {
        self.routes.get(host)
    }

    /// Iterate over every `(hostname, upstream)` pair.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &Upstream)> {
        self.routes.iter().map(|(host, upstream)| (host.as_str(), upstream))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RoutingTable {
        RoutingTable::from_config(&[
            RouteConfig::new("api.example.com", "127.0.0.1:5000"),
            RouteConfig::new("dash.example.com", "[::1]:8080"),
        ])
        .unwrap()
    }

    #[test]
    fn test_exact_match() {
        let table = table();
        assert_eq!(
            table.resolve("api.example.com").map(ToString::to_string),
            Some("127.0.0.1:5000".to_string())
        );
        assert_eq!(
            table.resolve("dash.example.com").map(ToString::to_string),
            Some("[::1]:8080".to_string())
        );
    }

    #[test]
    fn test_lookup_is_case_sensitive_and_not_prefix() {
        let table = table();
        assert!(table.resolve("API.EXAMPLE.COM").is_none());
        assert!(table.resolve("api.example.com:443").is_none());
        assert!(table.resolve("example.com").is_none());
        assert!(table.resolve("").is_none());
    }

    #[test]
    fn test_duplicate_host_rejected() {
        let err = RoutingTable::from_config(&[
            RouteConfig::new("a.example", "127.0.0.1:1"),
            RouteConfig::new("a.example", "127.0.0.1:2"),
        ])
        .unwrap_err();
        assert_eq!(err, RoutingError::DuplicateHost("a.example".into()));
    }

    #[test]
    fn test_iteration_covers_all_routes() {
        let table = table();
        let mut hosts: Vec<_> = table.routes().map(|(host, _)| host).collect();
        hosts.sort();
        assert_eq!(hosts, vec!["api.example.com", "dash.example.com"]);
        assert_eq!(table.len(), 2);
    }
}
