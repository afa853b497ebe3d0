//! The per-request pipeline.
//!
//! ```text
//! request
//!   → guard         (no User-Agent: 403)
//!   → host lookup   (unknown host: 302 to landing page)
//!   → API policy    (CORS, OPTIONS, API root, deprecated/invalid versions)
//!   → rate limit    (API host only: 429, or 500 when the store is down)
//!   → forward       (502 unreachable, 504 timeout)
//!   → intercept     (asset caching, metrics, access log)
//! response
//! ```
//!
//! Every outcome, including early exits, passes through interception.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::Scheme;
use axum::http::{header, Method, Request, StatusCode, Uri, Version};
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::config::{HostsConfig, ProxyConfig};
use crate::error::ProxyError;
use crate::http::context::RequestContext;
use crate::http::response::{apply_asset_caching, apply_rate_limit_headers, found, ApiError};
use crate::observability::metrics::{self, RequestLabels};
use crate::observability::PathCanonicalizer;
use crate::routing::{RoutingTable, Upstream};
use crate::security::api_policy::{apply_cors, check_version, VersionCheck};
use crate::security::headers::{prepare_upstream_headers, strip_hop_by_hop};
use crate::security::{PolicySelector, RateLimiter};

/// Everything a request needs, built once at startup and shared read-only.
pub struct Dispatcher {
    routes: RoutingTable,
    hosts: HostsConfig,
    canonicalizer: PathCanonicalizer,
    limiter: Option<RateLimiter>,
    selector: PolicySelector,
    client: Client<HttpConnector, Body>,
    upstream_timeout: Duration,
    slow_request: Duration,
}

impl Dispatcher {
    /// `limiter` is `None` when rate limiting is disabled.
    pub fn new(config: &ProxyConfig, limiter: Option<RateLimiter>) -> Result<Self, ProxyError> {
        let routes = RoutingTable::from_config(&config.routes.0)?;
        let canonicalizer = PathCanonicalizer::new(
            config.hosts.api_host.clone(),
            config.hosts.api_version_prefixes.clone(),
        );
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            routes,
            hosts: config.hosts.clone(),
            canonicalizer,
            limiter,
            selector: PolicySelector::from_config(&config.rate_limit),
            client,
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
            slow_request: Duration::from_millis(config.observability.slow_request_ms),
        })
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// Run the full pipeline for one request.
    pub async fn dispatch(&self, request: Request<Body>, peer: SocketAddr) -> Response {
        let host = request_host(&request);
        let path = request.uri().path().to_string();
        let labels = self.labels(request.method(), &host, &path);
        let ctx = RequestContext::new(
            request.method().clone(),
            request.headers(),
            host,
            path,
            self.selector.client_ip(request.headers(), peer.ip()),
            labels,
            self.slow_request,
        );

        let mut response = self.route(request, peer, &ctx).await;
        self.intercept(&ctx, &mut response);
        ctx.finish(response.status());
        response
    }

    /// Histogram labels drawn only from configuration and fixed sets, so
    /// clients cannot grow the series count.
    fn labels(&self, method: &Method, host: &str, path: &str) -> RequestLabels {
        let domain = match self.routes.resolve(host) {
            Some(_) => host.to_string(),
            None => metrics::UNKNOWN_DOMAIN.to_string(),
        };
        RequestLabels {
            domain,
            method: metrics::method_label(method),
            route: self.canonicalizer.canonicalize(host, path),
        }
    }

    async fn route(&self, request: Request<Body>, peer: SocketAddr, ctx: &RequestContext) -> Response {
        if ctx.user_agent.is_empty() {
            return StatusCode::FORBIDDEN.into_response();
        }

        let Some(upstream) = self.routes.resolve(&ctx.host) else {
            tracing::debug!(host = %ctx.host, "Unknown host, redirecting to landing page");
            return found(&self.hosts.landing_url);
        };

        if ctx.host == self.hosts.api_host {
            let mut response = self.api(request, peer, upstream, ctx).await;
            apply_cors(response.headers_mut());
            return response;
        }

        self.forward(request, upstream, peer).await
    }

    async fn api(
        &self,
        request: Request<Body>,
        peer: SocketAddr,
        upstream: &Upstream,
        ctx: &RequestContext,
    ) -> Response {
        if request.method() == Method::OPTIONS {
            return StatusCode::OK.into_response();
        }
        if ctx.path == "/" {
            return found(&self.hosts.api_docs_url);
        }

        match check_version(&ctx.path) {
            VersionCheck::Deprecated => return ApiError::UnsupportedVersion.into_response(),
            VersionCheck::InvalidPath => return ApiError::InvalidPath.into_response(),
            VersionCheck::Ok => {}
        }

        let Some(limiter) = &self.limiter else {
            return self.forward(request, upstream, peer).await;
        };

        let (key, policy) = self.selector.select(request.headers(), peer.ip());
        let decision = match limiter.check(&key, &policy).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    privileged = key.is_privileged(),
                    "Rate limit store failed, rejecting request"
                );
                metrics::record_store_error();
                return ProxyError::from(e).into_response();
            }
        };
        metrics::record_rate_limit(decision.allowed);

        let mut response = if decision.allowed {
            self.forward(request, upstream, peer).await
        } else {
            tracing::debug!(
                client = %key.identity(),
                retry_after_ms = decision.retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            ApiError::TooManyRequests {
                retry_after: decision.retry_after,
            }
            .into_response()
        };

        apply_rate_limit_headers(response.headers_mut(), &policy, &decision);
        response
    }

    async fn forward(&self, request: Request<Body>, upstream: &Upstream, peer: SocketAddr) -> Response {
        match self.try_forward(request, upstream, peer).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(upstream = %upstream, error = %e, "Upstream error");
                match e {
                    ProxyError::UpstreamTimeout(_) => metrics::record_upstream_error("timeout"),
                    _ => metrics::record_upstream_error("connect"),
                }
                e.into_response()
            }
        }
    }

    async fn try_forward(
        &self,
        request: Request<Body>,
        upstream: &Upstream,
        peer: SocketAddr,
    ) -> Result<Response, ProxyError> {
        let (mut parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .to_string();
        parts.uri = Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(upstream.authority().clone())
            .path_and_query(path_and_query)
            .build()?;
        // Upstreams speak HTTP/1.1 regardless of the inbound protocol.
        parts.version = Version::HTTP_11;
        prepare_upstream_headers(&mut parts.headers, upstream, peer.ip());

        let pending = self.client.request(Request::from_parts(parts, body));
        let response = tokio::time::timeout(self.upstream_timeout, pending)
            .await
            .map_err(|_| ProxyError::UpstreamTimeout(self.upstream_timeout))??;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    fn intercept(&self, ctx: &RequestContext, response: &mut Response) {
        let status = response.status();
        apply_asset_caching(
            &ctx.host,
            &self.hosts.dashboard_host,
            &ctx.path,
            status,
            response.headers_mut(),
        );
    }
}

/// The Host header, or the URI authority for HTTP/2 requests.
fn request_host(request: &Request<Body>) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_default()
}
