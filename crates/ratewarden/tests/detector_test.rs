//! Tests for header-based limit detection.

use chrono::{TimeDelta, Utc};
use ratewarden::detector::detect;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    map
}

#[test]
fn ietf_draft_headers_round_trip() {
    let now = Utc::now();
    let found = detect(
        200,
        &headers(&[
            ("ratelimit-limit", "100"),
            ("ratelimit-remaining", "42"),
            ("ratelimit-reset", "60"),
        ]),
        now,
    )
    .unwrap();

    assert_eq!(found.limit, 100);
    assert_eq!(found.remaining, 42);
    let delta = (found.reset_at - now).num_seconds();
    assert_eq!(delta, 60);
}

#[test]
fn vendor_headers_with_epoch_reset() {
    let now = Utc::now();
    let reset_epoch = (now + TimeDelta::seconds(90)).timestamp();
    let found = detect(
        200,
        &headers(&[
            ("x-ratelimit-limit", "5000"),
            ("x-ratelimit-remaining", "4999"),
            ("x-ratelimit-reset", &reset_epoch.to_string()),
        ]),
        now,
    )
    .unwrap();

    assert_eq!(found.limit, 5000);
    assert_eq!(found.remaining, 4999);
    let delta = (found.reset_at - now).num_seconds();
    assert!((89..=91).contains(&delta), "epoch reset misread: {delta}s");
}

#[test]
fn standard_convention_preferred_over_vendor() {
    let now = Utc::now();
    let found = detect(
        200,
        &headers(&[
            ("ratelimit-limit", "10"),
            ("ratelimit-remaining", "1"),
            ("ratelimit-reset", "30"),
            ("x-ratelimit-limit", "9999"),
            ("x-ratelimit-remaining", "9999"),
            ("x-ratelimit-reset", "9999"),
        ]),
        now,
    )
    .unwrap();
    assert_eq!(found.limit, 10);
}

#[test]
fn retry_after_seconds_synthesizes_spent_window() {
    let now = Utc::now();
    let found = detect(429, &headers(&[("retry-after", "30")]), now).unwrap();

    assert_eq!(found.limit, 0);
    assert_eq!(found.remaining, 0);
    assert_eq!((found.reset_at - now).num_seconds(), 30);
    assert_eq!(found.window, Duration::from_secs(30));
}

#[test]
fn retry_after_http_date() {
    let now = Utc::now();
    let at = (now + TimeDelta::seconds(45)).to_rfc2822();
    let found = detect(503, &headers(&[("retry-after", &at)]), now).unwrap();

    assert_eq!(found.remaining, 0);
    let delta = (found.reset_at - now).num_seconds();
    assert!((43..=46).contains(&delta), "http-date misread: {delta}s");
}

#[test]
fn pair_beats_retry_after() {
    let now = Utc::now();
    let found = detect(
        429,
        &headers(&[
            ("x-ratelimit-limit", "100"),
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset", "10"),
            ("retry-after", "300"),
        ]),
        now,
    )
    .unwrap();
    assert_eq!(found.limit, 100);
    assert_eq!((found.reset_at - now).num_seconds(), 10);
}

#[test]
fn partial_pair_falls_back_to_retry_after_for_reset() {
    let now = Utc::now();
    let found = detect(
        429,
        &headers(&[
            ("x-ratelimit-limit", "100"),
            ("x-ratelimit-remaining", "0"),
            ("retry-after", "20"),
        ]),
        now,
    )
    .unwrap();
    assert_eq!(found.limit, 100);
    assert_eq!(found.remaining, 0);
    assert_eq!((found.reset_at - now).num_seconds(), 20);
}

#[test]
fn no_headers_detects_nothing() {
    assert!(detect(200, &HeaderMap::new(), Utc::now()).is_none());
    // A 429 without headers is still "none detected", not a guess.
    assert!(detect(429, &HeaderMap::new(), Utc::now()).is_none());
}

#[test]
fn unparsable_values_detect_nothing() {
    let now = Utc::now();
    assert!(
        detect(
            200,
            &headers(&[
                ("ratelimit-limit", "lots"),
                ("ratelimit-remaining", "42"),
                ("ratelimit-reset", "60"),
            ]),
            now,
        )
        .is_none()
    );
    assert!(detect(429, &headers(&[("retry-after", "soon")]), now).is_none());
    // Negative counts are malformed, not a limit of zero.
    assert!(
        detect(
            200,
            &headers(&[
                ("ratelimit-limit", "-5"),
                ("ratelimit-remaining", "0"),
                ("ratelimit-reset", "60"),
            ]),
            now,
        )
        .is_none()
    );
}
