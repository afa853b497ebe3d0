//! Structured access log.
//!
//! One event per request on the `access_log` target, with the raw path and
//! its canonical template side by side. Requests slower than the configured
//! threshold are logged at warn level.

use std::time::Duration;

/// Fields of one access log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessLogEntry<'a> {
    pub remote_ip: &'a str,
    pub method: &'a str,
    pub host: &'a str,
    pub route: &'a str,
    pub route_clean: &'a str,
    pub status: u16,
    pub elapsed: Duration,
    pub user_agent: &'a str,
}

impl AccessLogEntry<'_> {
    pub fn is_slow(&self, threshold: Duration) -> bool {
        self.elapsed > threshold
    }

    pub fn emit(&self, slow_threshold: Duration) {
        if self.is_slow(slow_threshold) {
            tracing::warn!(
                target: "access_log",
                remote_ip = self.remote_ip,
                method = self.method,
                host = self.host,
                route = self.route,
                route_clean = self.route_clean,
                status = self.status,
                elapsed = self.elapsed.as_millis() as u64,
                user_agent = self.user_agent,
                "slow request"
            );
            return;
        }

        tracing::info!(
            target: "access_log",
            remote_ip = self.remote_ip,
            method = self.method,
            host = self.host,
            route = self.route,
            route_clean = self.route_clean,
            status = self.status,
            elapsed = self.elapsed.as_millis() as u64,
            user_agent = self.user_agent,
            "request handled"
        );
    }
}
