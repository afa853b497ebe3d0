//! Failure injection tests for the edge proxy.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edge_proxy::security::store::{GcraParams, GcraReply};
use edge_proxy::security::{RateLimitStore, StoreError};
use reqwest::StatusCode;

mod common;

use common::{MockResponse, API_HOST, DASH_HOST};

/// A store whose backend is always down.
struct BrokenStore;

#[async_trait]
impl RateLimitStore for BrokenStore {
    async fn apply_gcra(&self, _key: &str, _params: GcraParams) -> Result<GcraReply, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// An address nothing listens on.
async fn dead_address() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

#[tokio::test]
async fn test_store_failure_fails_closed() {
    let backend = common::start_mock_backend("should not be reached").await;
    let (proxy, shutdown) = common::start_proxy(
        common::config_for(backend, backend),
        Some(Arc::new(BrokenStore) as Arc<dyn RateLimitStore>),
    )
    .await;

    let res = common::get(proxy, API_HOST, "/v2/systems/abc").await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        res.text().await.unwrap(),
        r#"{"message":"500: internal server error","code":0}"#
    );

    // Hosts without rate limiting are unaffected.
    let res = common::get(proxy, DASH_HOST, "/").await;
    assert_eq!(res.status(), StatusCode::OK);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let dead = dead_address().await;
    let mut config = common::config_for(dead, dead);
    config.rate_limit.enabled = false;
    let (proxy, shutdown) = common::start_proxy(config, None).await;

    let res = common::get(proxy, DASH_HOST, "/").await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    shutdown.trigger();
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let backend = common::start_programmable_backend(|_| async {
        MockResponse::ok("late").delayed(Duration::from_secs(3))
    })
    .await;

    let mut config = common::config_for(backend, backend);
    config.rate_limit.enabled = false;
    config.timeouts.upstream_secs = 1;
    let (proxy, shutdown) = common::start_proxy(config, None).await;

    let res = common::get(proxy, DASH_HOST, "/slow").await;
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_errors_are_not_retried() {
    let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let c = calls.clone();
    let backend = common::start_programmable_backend(move |_| {
        c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        async { MockResponse::ok("down").status(503) }
    })
    .await;

    let mut config = common::config_for(backend, backend);
    config.rate_limit.enabled = false;
    let (proxy, shutdown) = common::start_proxy(config, None).await;

    let res = common::get(proxy, DASH_HOST, "/").await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_missing_user_agent_is_forbidden() {
    let backend = common::start_mock_backend("ok").await;
    let mut config = common::config_for(backend, backend);
    config.rate_limit.enabled = false;
    let (proxy, shutdown) = common::start_proxy(config, None).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!("http://{proxy}/"))
        .header("Host", DASH_HOST)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    shutdown.trigger();
}
