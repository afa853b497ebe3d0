//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Build the rate limit store and dispatcher from configuration
//! - Serve with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::dispatcher::Dispatcher;
use crate::http::X_REQUEST_ID;
use crate::security::{RateLimitStore, RateLimiter, RedisStore};

/// HTTP server for the edge proxy.
pub struct HttpServer {
    router: Router,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Create a server whose rate limiter talks to the configured Redis.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let store: Option<Arc<dyn RateLimitStore>> = match &config.rate_limit.redis_url {
            Some(url) if config.rate_limit.enabled => {
                let timeout = Duration::from_millis(config.rate_limit.store_timeout_ms);
                Some(Arc::new(RedisStore::new(url, timeout)?))
            }
            _ => None,
        };
        Self::with_store(config, store)
    }

    /// Create a server with an explicit store. `None` or a disabled rate
    /// limit section turns limiting off.
    pub fn with_store(
        config: ProxyConfig,
        store: Option<Arc<dyn RateLimitStore>>,
    ) -> Result<Self, ProxyError> {
        let limiter = store
            .filter(|_| config.rate_limit.enabled)
            .map(|store| RateLimiter::new(store, config.rate_limit.key_prefix.clone()));
        if limiter.is_none() {
            tracing::warn!("Running without request rate limiting");
        }

        let dispatcher = Arc::new(Dispatcher::new(&config, limiter)?);
        for (host, upstream) in dispatcher.routes().routes() {
            tracing::info!(host, upstream = %upstream, "Route registered");
        }

        let router = Self::build_router(dispatcher.clone());
        Ok(Self { router, dispatcher })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(dispatcher: Arc<Dispatcher>) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(dispatcher)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.dispatcher.routes().len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown requested, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: every request goes through the dispatcher.
async fn proxy_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    dispatcher.dispatch(request, peer).await
}
