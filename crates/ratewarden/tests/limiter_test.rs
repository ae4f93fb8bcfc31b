//! End-to-end orchestrator tests against the mock transport.

use chrono::{TimeDelta, Utc};
use ratewarden::Clock;
use ratewarden::{
    AdmissionErrorKind, BackoffStrategy, EndpointKey, LimitStore, LimiterOptions, ManualClock,
    MemoryStore, MockTransport, Pace, RateLimitDescriptor, RateLimiter, RatewardenErrorKind,
    RequestIntent, RetryConfig, RetryHandler, StoreOptions, SystemClock,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn limiter_with(
    transport: Arc<MockTransport>,
    clock: Arc<dyn ratewarden::Clock>,
    options: LimiterOptions,
) -> RateLimiter {
    let store = Arc::new(MemoryStore::new(StoreOptions {
        bucket_idle_ttl: options.bucket_idle_ttl,
    }));
    RateLimiter::with_parts(store, transport, clock, options)
}

#[tokio::test]
async fn rate_limited_call_retries_and_succeeds() {
    let transport = Arc::new(MockTransport::new());
    transport.enqueue(429, &[("retry-after", "2")], b"slow down");
    transport.enqueue(200, &[], b"ok");

    let limiter = limiter_with(
        Arc::clone(&transport),
        Arc::new(SystemClock),
        LimiterOptions::default(),
    );
    let handler = RetryHandler::new(
        RetryConfig::builder()
            .max_attempts(2u32)
            .strategy(BackoffStrategy::Exponential)
            .base_delay(Duration::from_secs(1))
            .build()
            .unwrap(),
    );

    let started = Instant::now();
    let response = limiter
        .request_with_retry(
            RequestIntent::get("https://api.example.com/data").unwrap(),
            &handler,
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(transport.calls(), 2);
    // Retry backoff plus the admission wait for the reported window.
    assert!(
        started.elapsed() >= Duration::from_secs(2),
        "finished too early: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn exhausted_window_forces_wait_before_dispatch() {
    let transport = Arc::new(MockTransport::new());
    transport.enqueue(200, &[], b"ok");

    let limiter = limiter_with(
        Arc::clone(&transport),
        Arc::new(SystemClock),
        LimiterOptions::default(),
    );

    let key = EndpointKey::resolve("https://api.example.com/data").unwrap();
    let now = Utc::now();
    limiter
        .store()
        .set_descriptor(&RateLimitDescriptor::new(
            key,
            10,
            0,
            now + TimeDelta::milliseconds(300),
            Duration::from_secs(1),
        ))
        .await
        .unwrap();

    let started = Instant::now();
    let response = limiter
        .request(RequestIntent::get("https://api.example.com/data").unwrap())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(started.elapsed() >= Duration::from_millis(290));
}

#[tokio::test]
async fn wait_budget_exceeded_surfaces_admission_error() {
    let transport = Arc::new(MockTransport::new());
    let limiter = limiter_with(
        Arc::clone(&transport),
        Arc::new(SystemClock),
        LimiterOptions::builder()
            .max_total_wait(Duration::from_millis(100))
            .build()
            .unwrap(),
    );

    let key = EndpointKey::resolve("https://api.example.com/data").unwrap();
    limiter
        .store()
        .set_descriptor(&RateLimitDescriptor::new(
            key,
            10,
            0,
            Utc::now() + TimeDelta::seconds(60),
            Duration::from_secs(60),
        ))
        .await
        .unwrap();

    let error = limiter
        .request(RequestIntent::get("https://api.example.com/data").unwrap())
        .await
        .unwrap_err();

    match error.kind() {
        RatewardenErrorKind::Admission(admission) => {
            assert!(matches!(
                admission.kind(),
                AdmissionErrorKind::DeadlineExceeded { .. }
            ));
        }
        other => panic!("expected Admission kind, got {other:?}"),
    }
    assert_eq!(transport.calls(), 0, "the request must never dispatch");
}

#[tokio::test]
async fn cancellation_aborts_wait_without_state_update() {
    let transport = Arc::new(MockTransport::new());
    let limiter = Arc::new(limiter_with(
        Arc::clone(&transport),
        Arc::new(SystemClock),
        LimiterOptions::default(),
    ));

    let key = EndpointKey::resolve("https://api.example.com/data").unwrap();
    limiter
        .store()
        .set_descriptor(&RateLimitDescriptor::new(
            key.clone(),
            10,
            0,
            Utc::now() + TimeDelta::seconds(60),
            Duration::from_secs(60),
        ))
        .await
        .unwrap();

    let token = CancellationToken::new();
    let mut intent = RequestIntent::get("https://api.example.com/data").unwrap();
    intent.cancel = Some(token.clone());

    let call = {
        let limiter = Arc::clone(&limiter);
        tokio::spawn(async move { limiter.request(intent).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let error = call.await.unwrap().unwrap_err();
    match error.kind() {
        RatewardenErrorKind::Admission(admission) => {
            assert_eq!(admission.kind(), &AdmissionErrorKind::Cancelled);
        }
        other => panic!("expected Admission kind, got {other:?}"),
    }
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn set_limit_is_idempotent() {
    let transport = Arc::new(MockTransport::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let limiter = limiter_with(
        Arc::clone(&transport),
        Arc::clone(&clock) as Arc<dyn ratewarden::Clock>,
        LimiterOptions::default(),
    );

    limiter
        .set_limit("https://api.example.com", 100, Duration::from_secs(3600))
        .await
        .unwrap();
    let key = EndpointKey::resolve("https://api.example.com").unwrap();
    let first = limiter
        .store()
        .descriptor(&key, clock.now())
        .await
        .unwrap()
        .unwrap();

    clock.advance(Duration::from_secs(10));
    limiter
        .set_limit("https://api.example.com", 100, Duration::from_secs(3600))
        .await
        .unwrap();
    let second = limiter
        .store()
        .descriptor(&key, clock.now())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.reset_at, second.reset_at, "reset must not drift");

    // Changed arguments do reseed the window.
    limiter
        .set_limit("https://api.example.com", 50, Duration::from_secs(3600))
        .await
        .unwrap();
    let third = limiter
        .store()
        .descriptor(&key, clock.now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(third.limit, 50);
    assert!(third.reset_at > first.reset_at);
}

#[tokio::test]
async fn status_is_none_until_something_is_recorded() {
    let transport = Arc::new(MockTransport::new());
    let limiter = limiter_with(
        Arc::clone(&transport),
        Arc::new(SystemClock),
        LimiterOptions::default(),
    );
    assert!(
        limiter
            .status("https://api.example.com/unseen")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn detected_headers_update_status() {
    let transport = Arc::new(MockTransport::new());
    transport.enqueue(
        200,
        &[
            ("x-ratelimit-limit", "100"),
            ("x-ratelimit-remaining", "42"),
            ("x-ratelimit-reset", "60"),
        ],
        b"ok",
    );

    let limiter = limiter_with(
        Arc::clone(&transport),
        Arc::new(SystemClock),
        LimiterOptions::default(),
    );
    limiter
        .request(RequestIntent::get("https://api.example.com/users?page=2").unwrap())
        .await
        .unwrap();

    // Same endpoint, different query string: same key.
    let status = limiter
        .status("https://api.example.com/users?page=9")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.limit, 100);
    assert_eq!(status.remaining, 42);
    assert!((status.utilization - 0.58).abs() < 1e-9);
    assert!(status.reset_in_seconds > 55.0);
}

#[tokio::test]
async fn pacing_bucket_throttles_without_server_limits() {
    let transport = Arc::new(MockTransport::new());
    transport.enqueue(200, &[], b"one");
    transport.enqueue(200, &[], b"two");

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let limiter = limiter_with(
        Arc::clone(&transport),
        Arc::clone(&clock) as Arc<dyn ratewarden::Clock>,
        LimiterOptions::default(),
    );

    limiter
        .set_pace(
            "https://api.example.com/data",
            Pace {
                capacity: 2.0,
                refill_rate: 0.0,
            },
        )
        .await
        .unwrap();

    for _ in 0..2 {
        limiter
            .request(RequestIntent::get("https://api.example.com/data").unwrap())
            .await
            .unwrap();
    }

    // Tokens spent and nothing replenishing: fail fast, not forever-wait.
    let error = limiter
        .request(RequestIntent::get("https://api.example.com/data").unwrap())
        .await
        .unwrap_err();
    match error.kind() {
        RatewardenErrorKind::Admission(admission) => {
            assert_eq!(admission.kind(), &AdmissionErrorKind::Starved);
        }
        other => panic!("expected Admission kind, got {other:?}"),
    }
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn pacing_wait_is_bounded_and_replenishes() {
    let transport = Arc::new(MockTransport::new());
    transport.enqueue(200, &[], b"one");
    transport.enqueue(200, &[], b"two");

    let limiter = limiter_with(
        Arc::clone(&transport),
        Arc::new(SystemClock),
        LimiterOptions::default(),
    );
    limiter
        .set_pace(
            "https://api.example.com/data",
            Pace {
                capacity: 1.0,
                refill_rate: 10.0,
            },
        )
        .await
        .unwrap();

    let started = Instant::now();
    for _ in 0..2 {
        limiter
            .request(RequestIntent::get("https://api.example.com/data").unwrap())
            .await
            .unwrap();
    }
    assert!(
        started.elapsed() >= Duration::from_millis(90),
        "second call skipped the pacing wait"
    );
}

#[tokio::test]
async fn outcomes_are_published_to_subscribers() {
    let transport = Arc::new(MockTransport::new());
    transport.enqueue(200, &[("x-ratelimit-limit", "10")], b"ok");

    let limiter = limiter_with(
        Arc::clone(&transport),
        Arc::new(SystemClock),
        LimiterOptions::default(),
    );
    let mut events = limiter.events();

    limiter
        .request(RequestIntent::get("https://api.example.com/data").unwrap())
        .await
        .unwrap();

    let outcome = events.recv().await.unwrap();
    assert_eq!(outcome.status, 200);
    assert_eq!(
        outcome.key,
        EndpointKey::resolve("https://api.example.com/data").unwrap()
    );
    // Nothing was recorded before this first call.
    assert!(outcome.descriptor.is_none());
}

#[tokio::test]
async fn unknown_storage_scheme_fails_at_construction() {
    let error = RateLimiter::new(
        LimiterOptions::builder()
            .storage("consul://localhost:8500".to_string())
            .build()
            .unwrap(),
    )
    .await
    .unwrap_err();
    assert!(matches!(error.kind(), RatewardenErrorKind::Config(_)));
}
