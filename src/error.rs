//! Error types for the edge proxy.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response::ApiError;
use crate::routing::RoutingError;
use crate::security::StoreError;

/// Failures inside the request pipeline or while building it.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The route table could not be built.
    #[error("invalid route table: {0}")]
    Routing(#[from] RoutingError),

    /// The rate limit store failed; never treated as an admission.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The upstream could not be reached or dropped the connection.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// The upstream did not send response headers in time.
    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    /// The forwarded request could not be assembled.
    #[error("invalid upstream request: {0}")]
    UpstreamRequest(#[from] axum::http::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::Store(_) => ApiError::Internal.into_response(),
            ProxyError::Upstream(_) => {
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
            ProxyError::UpstreamTimeout(_) => {
                (StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out").into_response()
            }
            ProxyError::Routing(_) | ProxyError::UpstreamRequest(_) => {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
