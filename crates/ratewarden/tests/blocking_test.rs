//! Tests for the blocking limiter front-end.

use ratewarden::{
    BackoffStrategy, BlockingRateLimiter, LimiterOptions, MemoryStore, MockTransport,
    RetryConfig, RetryHandler, StoreOptions, SystemClock,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn blocking_limiter(transport: Arc<MockTransport>) -> BlockingRateLimiter {
    BlockingRateLimiter::with_parts(
        Arc::new(MemoryStore::new(StoreOptions::default())),
        transport,
        Arc::new(SystemClock),
        LimiterOptions::default(),
    )
    .unwrap()
}

#[test]
fn blocking_request_and_status() {
    let transport = Arc::new(MockTransport::new());
    transport.enqueue(
        200,
        &[
            ("ratelimit-limit", "60"),
            ("ratelimit-remaining", "59"),
            ("ratelimit-reset", "60"),
        ],
        b"ok",
    );

    let limiter = blocking_limiter(Arc::clone(&transport));
    let response = limiter
        .request(ratewarden::RequestIntent::get("https://api.example.com/data").unwrap())
        .unwrap();
    assert_eq!(response.status, 200);

    let status = limiter
        .status("https://api.example.com/data")
        .unwrap()
        .unwrap();
    assert_eq!(status.limit, 60);
    assert_eq!(status.remaining, 59);
}

#[test]
fn blocking_retry_waits_out_reported_window() {
    let transport = Arc::new(MockTransport::new());
    transport.enqueue(429, &[("retry-after", "1")], b"slow down");
    transport.enqueue(200, &[], b"ok");

    let limiter = blocking_limiter(Arc::clone(&transport));
    let handler = RetryHandler::new(
        RetryConfig::builder()
            .max_attempts(2u32)
            .strategy(BackoffStrategy::Constant)
            .base_delay(Duration::from_millis(200))
            .build()
            .unwrap(),
    );

    let started = Instant::now();
    let response = limiter
        .request_with_retry(
            ratewarden::RequestIntent::get("https://api.example.com/data").unwrap(),
            &handler,
        )
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(transport.calls(), 2);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[test]
fn blocking_set_limit_seeds_state() {
    let transport = Arc::new(MockTransport::new());
    let limiter = blocking_limiter(transport);

    limiter
        .set_limit("api.example.com", 1000, Duration::from_secs(3600))
        .unwrap();
    let status = limiter.status("api.example.com").unwrap().unwrap();
    assert_eq!(status.limit, 1000);
    assert_eq!(status.remaining, 1000);
    assert!((status.utilization).abs() < 1e-9);
}
