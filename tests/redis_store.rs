//! Checks against a live Redis. Skipped unless `EDGE_PROXY_TEST_REDIS_URL`
//! points at a disposable instance.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use edge_proxy::security::{RateLimitKey, RateLimitPolicy, RateLimiter, RedisStore};

fn limiter() -> Option<RateLimiter> {
    let url = std::env::var("EDGE_PROXY_TEST_REDIS_URL").ok()?;
    let store = RedisStore::new(&url, Duration::from_secs(2)).expect("invalid redis url");
    Some(RateLimiter::new(Arc::new(store), "ratelimit:test:"))
}

fn unique_key() -> RateLimitKey {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    RateLimitKey::Anonymous(format!("client-{nanos}"))
}

#[tokio::test]
async fn test_redis_burst_then_deny() {
    let Some(limiter) = limiter() else {
        eprintln!("EDGE_PROXY_TEST_REDIS_URL not set, skipping");
        return;
    };
    // Long period so the test cannot straddle a refill.
    let policy = RateLimitPolicy::new(Duration::from_secs(600), 2, 5);
    let key = unique_key();

    let mut remaining = Vec::new();
    for _ in 0..5 {
        let decision = limiter.check(&key, &policy).await.unwrap();
        assert!(decision.allowed);
        remaining.push(decision.remaining);
    }
    assert_eq!(remaining, vec![4, 3, 2, 1, 0]);

    let denied = limiter.check(&key, &policy).await.unwrap();
    assert!(!denied.allowed);
    assert!(denied.retry_after > Duration::ZERO);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_redis_concurrent_callers_share_one_slot() {
    let Some(limiter) = limiter() else {
        eprintln!("EDGE_PROXY_TEST_REDIS_URL not set, skipping");
        return;
    };
    let policy = RateLimitPolicy::new(Duration::from_secs(600), 1, 1);
    let key = unique_key();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let limiter = limiter.clone();
        let key = key.clone();
        tasks.push(tokio::spawn(async move {
            limiter.check(&key, &policy).await.unwrap().allowed
        }));
    }

    let mut admitted = 0;
    for task in tasks {
        if task.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1);
}
