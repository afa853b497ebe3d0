//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pk_http_requests` (histogram, seconds): latency by domain, method,
//!   status, route
//! - `proxy_ratelimit_decisions_total` (counter): admissions and denials
//! - `proxy_ratelimit_store_errors_total` (counter): store failures
//! - `proxy_upstream_errors_total` (counter): upstream failures by kind
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Every label value comes from a bounded set: `domain` is a routed
//!   hostname or `unknown`, `method` a standard method or `other`, `route` a
//!   canonical template, never a raw path
//! - Scraped from a separate listener so proxy traffic never reaches it

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::Method;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUEST_LATENCY: &str = "pk_http_requests";
pub const RATELIMIT_DECISIONS: &str = "proxy_ratelimit_decisions_total";
pub const RATELIMIT_STORE_ERRORS: &str = "proxy_ratelimit_store_errors_total";
pub const UPSTREAM_ERRORS: &str = "proxy_upstream_errors_total";

/// `domain` label for hosts missing from the routing table.
pub const UNKNOWN_DOMAIN: &str = "unknown";
/// `method` label for extension methods.
pub const OTHER_METHOD: &str = "other";

/// Labels of one `pk_http_requests` observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLabels {
    pub domain: String,
    pub method: &'static str,
    pub route: String,
}

/// Fold a request method into a fixed label set.
pub fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::HEAD => "HEAD",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::PATCH => "PATCH",
        Method::DELETE => "DELETE",
        Method::OPTIONS => "OPTIONS",
        Method::CONNECT => "CONNECT",
        Method::TRACE => "TRACE",
        _ => OTHER_METHOD,
    }
}

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished (or abandoned) request.
pub fn record_request(labels: &RequestLabels, status: u16, elapsed: Duration) {
    histogram!(
        REQUEST_LATENCY,
        "domain" => labels.domain.clone(),
        "method" => labels.method,
        "status" => status.to_string(),
        "route" => labels.route.clone()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_rate_limit(allowed: bool) {
    let outcome = if allowed { "allowed" } else { "denied" };
    counter!(RATELIMIT_DECISIONS, "outcome" => outcome).increment(1);
}

pub fn record_store_error() {
    counter!(RATELIMIT_STORE_ERRORS).increment(1);
}

pub fn record_upstream_error(kind: &'static str) {
    counter!(UPSTREAM_ERRORS, "kind" => kind).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_label_is_bounded() {
        assert_eq!(method_label(&Method::GET), "GET");
        assert_eq!(method_label(&Method::DELETE), "DELETE");
        assert_eq!(method_label(&Method::from_bytes(b"PURGE").unwrap()), OTHER_METHOD);
        assert_eq!(method_label(&Method::from_bytes(b"X-ANYTHING").unwrap()), OTHER_METHOD);
    }
}
