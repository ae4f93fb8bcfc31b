//! Auto-detection of rate limits from HTTP response headers.
//!
//! The detector is a pure function from `(status, headers, now)` to an
//! optional limit fragment. It recognizes the IETF draft `RateLimit-*`
//! headers, the vendor `X-RateLimit-*` convention, and a `Retry-After`
//! fallback, preferring the most specific convention present.
//!
//! Header detection reflects the limits the server is actually enforcing
//! right now, so a detected limit always overwrites locally estimated
//! state for the same key.

use chrono::{DateTime, TimeDelta, Utc};
use ratewarden_core::{EndpointKey, RateLimitDescriptor};
use ratewarden_error::DetectError;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Reset values below this are delta-seconds; at or above, epoch seconds.
const EPOCH_THRESHOLD: i64 = 100_000_000;

/// Window assumed when a convention reports no reset at all.
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// A limit parsed out of one response, not yet bound to an endpoint key.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedLimit {
    /// Total requests allowed in the current window.
    pub limit: u64,
    /// Requests still allowed in the current window.
    pub remaining: u64,
    /// Instant the window resets.
    pub reset_at: DateTime<Utc>,
    /// Length of the window, derived from the reset distance.
    pub window: Duration,
}

impl DetectedLimit {
    /// Bind the fragment to an endpoint key.
    pub fn into_descriptor(self, key: EndpointKey) -> RateLimitDescriptor {
        RateLimitDescriptor::new(key, self.limit, self.remaining, self.reset_at, self.window)
    }
}

/// Inspect a response for rate limit headers.
///
/// Returns `None` when no convention is recognizable; callers treat that as
/// "unconstrained", never as an error. Present-but-unparsable values are
/// logged and also yield `None` - malformed server data never aborts the
/// call that carried it.
pub fn detect(status: u16, headers: &HeaderMap, now: DateTime<Utc>) -> Option<DetectedLimit> {
    for prefix in ["ratelimit", "x-ratelimit"] {
        match detect_convention(prefix, headers, now) {
            Ok(Some(found)) => {
                debug!(
                    convention = prefix,
                    limit = found.limit,
                    remaining = found.remaining,
                    "Detected rate limit headers"
                );
                return Some(found);
            }
            Ok(None) => {}
            Err(error) => {
                // Malformed server data is treated as "no limit", loudly.
                warn!(status, %error, "Ignoring unparsable rate limit headers");
                return None;
            }
        }
    }
    match detect_retry_after(headers, now) {
        Ok(found) => found,
        Err(error) => {
            warn!(status, %error, "Ignoring unparsable Retry-After header");
            None
        }
    }
}

/// Parse one `{prefix}-limit` / `{prefix}-remaining` / `{prefix}-reset`
/// triple. `Ok(None)` means the convention is absent; `Err` means present
/// but unparsable.
fn detect_convention(
    prefix: &str,
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Result<Option<DetectedLimit>, DetectError> {
    let limit_name = format!("{prefix}-limit");
    let Some(limit) = integer_header(headers, &limit_name)? else {
        return Ok(None);
    };
    let remaining_name = format!("{prefix}-remaining");
    let Some(remaining) = integer_header(headers, &remaining_name)? else {
        return Ok(None);
    };
    let limit = u64::try_from(limit).map_err(|_| DetectError::new(limit_name, limit.to_string()))?;
    let remaining = u64::try_from(remaining)
        .map_err(|_| DetectError::new(remaining_name, remaining.to_string()))?;
    let reset_at = match integer_header(headers, &format!("{prefix}-reset"))? {
        Some(value) => parse_reset(value, now),
        // Partial triple: the pair still beats Retry-After, which at most
        // refines the reset instant.
        None => match retry_after(headers, now)? {
            Some(delta) => now + delta,
            None => now + TimeDelta::from_std(DEFAULT_WINDOW).expect("constant window fits"),
        },
    };
    let window = (reset_at - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .max(Duration::from_secs(1));
    Ok(Some(DetectedLimit {
        limit,
        remaining,
        reset_at,
        window,
    }))
}

/// `Retry-After` alone: synthesize a spent window to force a wait.
fn detect_retry_after(
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Result<Option<DetectedLimit>, DetectError> {
    let Some(delta) = retry_after(headers, now)? else {
        return Ok(None);
    };
    let window = delta.to_std().unwrap_or(Duration::ZERO).max(Duration::from_secs(1));
    Ok(Some(DetectedLimit {
        limit: 0,
        remaining: 0,
        reset_at: now + delta,
        window,
    }))
}

/// `Retry-After` as a delta from now: delta-seconds or an HTTP-date.
fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Result<Option<TimeDelta>, DetectError> {
    let Some(value) = headers.get("retry-after") else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| DetectError::new("retry-after", format!("{value:?}")))?;
    if let Ok(seconds) = raw.trim().parse::<i64>() {
        return Ok(Some(TimeDelta::seconds(seconds.max(0))));
    }
    match DateTime::parse_from_rfc2822(raw.trim()) {
        Ok(at) => Ok(Some((at.with_timezone(&Utc) - now).max(TimeDelta::zero()))),
        Err(_) => Err(DetectError::new("retry-after", raw)),
    }
}

/// An integer header. `Ok(None)` when absent.
fn integer_header(headers: &HeaderMap, name: &str) -> Result<Option<i64>, DetectError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| DetectError::new(name, format!("{value:?}")))?;
    raw.trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|_| DetectError::new(name, raw))
}

fn parse_reset(value: i64, now: DateTime<Utc>) -> DateTime<Utc> {
    let value = value.max(0);
    if value >= EPOCH_THRESHOLD {
        DateTime::<Utc>::from_timestamp(value, 0).unwrap_or(now)
    } else {
        now + TimeDelta::seconds(value)
    }
}
