//! Per-request state threaded through the pipeline.
//!
//! Created when a request arrives and consumed when its response leaves.
//! If the client goes away first, the handler future is dropped along with
//! the in-flight upstream call, and `Drop` records the request with status
//! 499 so abandoned requests still show up in metrics and logs.

use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap, Method, StatusCode};

use crate::observability::metrics::{self, RequestLabels};
use crate::observability::AccessLogEntry;

/// nginx's "client closed request".
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

pub struct RequestContext {
    start: Instant,
    pub method: Method,
    pub host: String,
    pub path: String,
    pub remote_ip: String,
    pub user_agent: String,
    /// Bounded values for the latency histogram. The access log keeps the raw ones.
    pub labels: RequestLabels,
    slow_threshold: Duration,
    finished: bool,
}

impl RequestContext {
    pub fn new(
        method: Method,
        headers: &HeaderMap,
        host: String,
        path: String,
        remote_ip: String,
        labels: RequestLabels,
        slow_threshold: Duration,
    ) -> Self {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Self {
            start: Instant::now(),
            method,
            host,
            path,
            remote_ip,
            user_agent,
            labels,
            slow_threshold,
            finished: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record metrics and the access log for the response being returned.
    pub fn finish(mut self, status: StatusCode) {
        self.record(status.as_u16());
        self.finished = true;
    }

    fn access_log_entry(&self, status: u16, elapsed: Duration) -> AccessLogEntry<'_> {
        AccessLogEntry {
            remote_ip: &self.remote_ip,
            method: self.method.as_str(),
            host: &self.host,
            route: &self.path,
            route_clean: &self.labels.route,
            status,
            elapsed,
            user_agent: &self.user_agent,
        }
    }

    fn record(&self, status: u16) {
        let elapsed = self.elapsed();
        metrics::record_request(&self.labels, status, elapsed);
        self.access_log_entry(status, elapsed).emit(self.slow_threshold);
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        if !self.finished {
            self.record(CLIENT_CLOSED_REQUEST);
        }
    }
}
