//! Responses produced by the proxy itself, and response rewriting.
//!
//! # Responsibilities
//! - Fixed JSON error bodies for the API host
//! - Redirects for unknown hosts and the API root
//! - Rate limit headers
//! - Immutable caching of hashed dashboard assets

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Serialize;

use crate::security::{RateLimitDecision, RateLimitPolicy};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const IMMUTABLE_CACHE: &str = "max-age=31536000, s-maxage=31536000, immutable";
const ASSET_PREFIX: &str = "/assets/";
const ASSET_EXTENSIONS: [&str; 3] = [".js", ".css", ".map"];

/// Errors reported to API clients with a fixed JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    UnsupportedVersion,
    InvalidPath,
    TooManyRequests { retry_after: Duration },
    Internal,
}

// Field order is part of the wire format.
#[derive(Serialize)]
struct ErrorBody {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    code: u8,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedVersion => StatusCode::GONE,
            ApiError::InvalidPath => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let (message, retry_after) = match self {
            ApiError::UnsupportedVersion => ("Unsupported API version", None),
            ApiError::InvalidPath => ("Invalid path for API version", None),
            ApiError::TooManyRequests { retry_after } => (
                "429: too many requests",
                Some(retry_after.as_millis() as u64),
            ),
            ApiError::Internal => ("500: internal server error", None),
        };
        ErrorBody {
            message,
            retry_after,
            code: 0,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::to_string(&self.body()).unwrap_or_default();
        (
            self.status(),
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

/// 302 to `location`.
pub fn found(location: &str) -> Response {
    let mut response = Redirect::to(location).into_response();
    *response.status_mut() = StatusCode::FOUND;
    response
}

/// Set `X-RateLimit-*`. Reset is the epoch millisecond at which the key is
/// back to a full burst.
pub fn apply_rate_limit_headers(
    headers: &mut HeaderMap,
    policy: &RateLimitPolicy,
    decision: &RateLimitDecision,
) {
    let reset_ms = SystemTime::now()
        .checked_add(decision.reset_after)
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis())
        .unwrap_or_default();

    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(policy.rate));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_ms as u64));
}

/// Built dashboard assets carry a content hash in their name.
pub fn is_hashed_asset(path: &str) -> bool {
    path.starts_with(ASSET_PREFIX) && ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Mark successful hashed-asset responses from the dashboard host as cacheable forever.
pub fn apply_asset_caching(
    host: &str,
    dashboard_host: &str,
    path: &str,
    status: StatusCode,
    headers: &mut HeaderMap,
) {
    if host == dashboard_host && status == StatusCode::OK && is_hashed_asset(path) {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE_CACHE));
    }
}
