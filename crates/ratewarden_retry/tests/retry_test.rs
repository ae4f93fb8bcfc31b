//! Tests for retry classification and drivers.

use ratewarden_core::TransportResponse;
use ratewarden_error::{RatewardenErrorKind, RatewardenResult, TransportError};
use ratewarden_retry::{BackoffStrategy, RetryConfig, RetryHandler};
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use url::Url;

fn response(status: u16) -> TransportResponse {
    TransportResponse::new(
        status,
        HeaderMap::new(),
        Vec::new(),
        Url::parse("https://api.example.com/data").unwrap(),
    )
}

fn fast_config(max_attempts: u32) -> RetryConfig {
    RetryConfig::builder()
        .max_attempts(max_attempts)
        .strategy(BackoffStrategy::Constant)
        .base_delay(Duration::from_millis(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn retries_until_success() {
    let handler = RetryHandler::new(fast_config(5));
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_op = Arc::clone(&calls);

    let result = handler
        .retry_async(|| {
            let calls = Arc::clone(&calls_in_op);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Ok(response(503))
                } else {
                    Ok(response(200))
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(result.status, 200);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhaustion_surfaces_last_status() {
    let handler = RetryHandler::new(fast_config(3));
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_op = Arc::clone(&calls);

    let error = handler
        .retry_async(|| {
            let calls = Arc::clone(&calls_in_op);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(response(429))
            }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    match error.kind() {
        RatewardenErrorKind::Retry(exhausted) => {
            assert_eq!(exhausted.attempts, 3);
            assert_eq!(exhausted.last_status, Some(429));
        }
        other => panic!("expected Retry kind, got {other:?}"),
    }
}

#[tokio::test]
async fn exhaustion_carries_last_transient_error() {
    let handler = RetryHandler::new(fast_config(2));

    let error = handler
        .retry_async(|| async {
            Err::<TransportResponse, _>(TransportError::new("connection reset").into())
        })
        .await
        .unwrap_err();

    match error.kind() {
        RatewardenErrorKind::Retry(exhausted) => {
            assert_eq!(exhausted.attempts, 2);
            assert!(exhausted.last_status.is_none());
            let source = exhausted.source.as_deref().expect("source preserved");
            assert!(source.to_string().contains("connection reset"));
        }
        other => panic!("expected Retry kind, got {other:?}"),
    }
}

#[tokio::test]
async fn fatal_failure_surfaces_unwrapped() {
    let mut config = fast_config(5);
    config.retry_transport_errors = false;
    let handler = RetryHandler::new(config);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_op = Arc::clone(&calls);

    let error = handler
        .retry_async(|| {
            let calls = Arc::clone(&calls_in_op);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<TransportResponse, _>(TransportError::new("tls handshake failed").into())
            }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1, "fatal failures never retry");
    assert!(matches!(error.kind(), RatewardenErrorKind::Transport(_)));
}

#[tokio::test]
async fn statuses_outside_the_set_are_success() {
    let handler = RetryHandler::new(fast_config(3));
    let result = handler
        .retry_async(|| async { Ok(response(404)) })
        .await
        .unwrap();
    assert_eq!(result.status, 404);
}

#[tokio::test]
async fn delays_follow_the_schedule() {
    let config = RetryConfig::builder()
        .max_attempts(3u32)
        .strategy(BackoffStrategy::Linear)
        .base_delay(Duration::from_millis(30))
        .max_delay(Duration::from_millis(500))
        .build()
        .unwrap();
    let handler = RetryHandler::new(config);

    // Linear schedule: 30ms then 60ms between three attempts.
    let started = Instant::now();
    let _ = handler.retry_async(|| async { Ok(response(429)) }).await;
    assert!(started.elapsed() >= Duration::from_millis(90));
}

#[test]
fn blocking_driver_matches_async_semantics() {
    let handler = RetryHandler::new(fast_config(3));
    let calls = AtomicUsize::new(0);

    let result: RatewardenResult<TransportResponse> = handler.retry_blocking(|| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 { Ok(response(502)) } else { Ok(response(200)) }
    });

    assert_eq!(result.unwrap().status, 200);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn blocking_driver_exhaustion() {
    let handler = RetryHandler::new(fast_config(2));
    let error = handler.retry_blocking(|| Ok(response(503))).unwrap_err();
    match error.kind() {
        RatewardenErrorKind::Retry(exhausted) => {
            assert_eq!(exhausted.attempts, 2);
            assert_eq!(exhausted.last_status, Some(503));
        }
        other => panic!("expected Retry kind, got {other:?}"),
    }
}
