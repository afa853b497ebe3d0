//! Concurrent load across proxy instances sharing one rate limit store.

use std::sync::Arc;

use edge_proxy::security::RateLimitStore;
use reqwest::StatusCode;

mod common;

use common::API_HOST;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_instances_share_one_limit_per_client() {
    let backend = common::start_mock_backend("Hello from backend").await;
    let (store, _clock) = common::frozen_store();
    let shared = store as Arc<dyn RateLimitStore>;

    let (proxy_a, shutdown_a) =
        common::start_proxy(common::config_for(backend, backend), Some(shared.clone())).await;
    let (proxy_b, shutdown_b) =
        common::start_proxy(common::config_for(backend, backend), Some(shared)).await;

    let concurrency = 40;
    let client = common::client();
    let mut tasks = Vec::new();
    for i in 0..concurrency {
        let client = client.clone();
        let proxy = if i % 2 == 0 { proxy_a } else { proxy_b };
        tasks.push(tokio::spawn(async move {
            client
                .get(format!("http://{proxy}/v2/systems/abc"))
                .header("Host", API_HOST)
                .header("Fly-Client-IP", "198.51.100.23")
                .send()
                .await
                .map(|res| res.status())
        }));
    }

    let mut admitted = 0;
    let mut limited = 0;
    for task in tasks {
        match task.await.unwrap().expect("proxy unreachable") {
            StatusCode::OK => admitted += 1,
            StatusCode::TOO_MANY_REQUESTS => limited += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    println!("\n--- Shared Limit Results ---");
    println!("Requests:  {}", concurrency);
    println!("Admitted:  {}", admitted);
    println!("Limited:   {}", limited);
    println!("----------------------------\n");

    // Burst of 5, clock frozen: no refill can happen during the test.
    assert_eq!(admitted, 5);
    assert_eq!(limited, concurrency - 5);

    shutdown_a.trigger();
    shutdown_b.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_clients_are_limited_independently() {
    let backend = common::start_mock_backend("ok").await;
    let (store, _clock) = common::frozen_store();
    let (proxy, shutdown) = common::start_proxy(
        common::config_for(backend, backend),
        Some(store.clone() as Arc<dyn RateLimitStore>),
    )
    .await;

    let client = common::client();
    let mut tasks = Vec::new();
    for i in 0..10 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client
                .get(format!("http://{proxy}/v2/groups/g{i}"))
                .header("Host", API_HOST)
                .header("Fly-Client-IP", format!("198.51.100.{i}"))
                .send()
                .await
                .map(|res| res.status())
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), StatusCode::OK);
    }
    assert_eq!(store.len(), 10);

    shutdown.trigger();
}
