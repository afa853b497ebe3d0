//! Distributed rate limiting with tiered policies.
//!
//! Admission follows GCRA: each key has a theoretical arrival time kept in the
//! shared store, and a request is admitted when that time, advanced by one
//! interval, is no more than `burst` intervals ahead of now. The limiter holds
//! no state of its own; atomicity is the store's job.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;

use crate::config::{PolicyConfig, RateLimitConfig};
use crate::security::store::{GcraParams, RateLimitStore, StoreError};

/// A `(period, rate, burst)` admission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub period: Duration,
    pub rate: u32,
    pub burst: u32,
}

impl RateLimitPolicy {
    pub fn new(period: Duration, rate: u32, burst: u32) -> Self {
        Self {
            period,
            rate,
            burst,
        }
    }

    /// Nominal spacing between requests.
    pub fn interval(&self) -> Duration {
        self.period / self.rate.max(1)
    }

    fn params(&self) -> GcraParams {
        let interval_us = (self.interval().as_micros() as u64).max(1);
        GcraParams {
            interval_us,
            burst_offset_us: interval_us.saturating_mul(u64::from(self.burst)),
        }
    }
}

impl From<PolicyConfig> for RateLimitPolicy {
    fn from(config: PolicyConfig) -> Self {
        Self::new(
            Duration::from_secs(config.period_secs),
            config.rate,
            config.burst,
        )
    }
}

/// The verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests that could still be sent right now.
    pub remaining: u32,
    /// Time until the key is back to a full burst.
    pub reset_after: Duration,
    /// Time until the next request would be admitted; zero when allowed.
    pub retry_after: Duration,
}

/// Who is being limited. The store key is `<namespace><identity>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitKey {
    /// A client presenting the privileged credential.
    Privileged(String),
    /// Anyone else, by source IP.
    Anonymous(String),
}

impl RateLimitKey {
    pub fn identity(&self) -> &str {
        match self {
            RateLimitKey::Privileged(id) | RateLimitKey::Anonymous(id) => id,
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, RateLimitKey::Privileged(_))
    }
}

/// GCRA limiter over a shared store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    namespace: String,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Check and consume one unit of capacity for `key`.
    pub async fn check(
        &self,
        key: &RateLimitKey,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitDecision, StoreError> {
        let params = policy.params();
        let store_key = format!("{}{}", self.namespace, key.identity());
        let reply = self.store.apply_gcra(&store_key, params).await?;

        let ahead_us = reply.tat_us.saturating_sub(reply.now_us);
        let used = ahead_us.div_ceil(params.interval_us);
        let remaining = u64::from(policy.burst).saturating_sub(used) as u32;

        let retry_after = if reply.allowed {
            Duration::ZERO
        } else {
            let allow_at = reply
                .tat_us
                .saturating_add(params.interval_us)
                .saturating_sub(params.burst_offset_us);
            Duration::from_micros(allow_at.saturating_sub(reply.now_us))
        };

        Ok(RateLimitDecision {
            allowed: reply.allowed,
            remaining,
            reset_after: Duration::from_micros(ahead_us),
            retry_after,
        })
    }
}

/// Picks the key and policy for a request before the limiter runs.
#[derive(Debug, Clone)]
pub struct PolicySelector {
    client_ip_header: String,
    privileged_header: String,
    privileged_secret: Option<String>,
    privileged_key: String,
    anonymous: RateLimitPolicy,
    privileged: RateLimitPolicy,
}

impl PolicySelector {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            client_ip_header: config.client_ip_header.clone(),
            privileged_header: config.privileged_header.clone(),
            privileged_secret: config.privileged_secret.clone(),
            privileged_key: config.privileged_key.clone(),
            anonymous: config.anonymous.into(),
            privileged: config.privileged.into(),
        }
    }

    /// Client IP as reported by the edge network, else the TCP peer.
    pub fn client_ip(&self, headers: &HeaderMap, peer: IpAddr) -> String {
        headers
            .get(&self.client_ip_header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| peer.to_string())
    }

    pub fn select(&self, headers: &HeaderMap, peer: IpAddr) -> (RateLimitKey, RateLimitPolicy) {
        let privileged = match (&self.privileged_secret, headers.get(&self.privileged_header)) {
            (Some(secret), Some(presented)) => presented.as_bytes() == secret.as_bytes(),
            _ => false,
        };

        if privileged {
            (
                RateLimitKey::Privileged(self.privileged_key.clone()),
                self.privileged,
            )
        } else {
            (
                RateLimitKey::Anonymous(self.client_ip(headers, peer)),
                self.anonymous,
            )
        }
    }
}
