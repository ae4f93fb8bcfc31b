//! Server-reported rate limit descriptors.

use crate::EndpointKey;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Normalized representation of a server-reported rate limit window.
///
/// Descriptors are created or overwritten on every successful header
/// detection, read on every admission check, and removed only by TTL
/// eviction. `remaining <= limit` is enforced at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDescriptor {
    /// Endpoint the limit applies to.
    pub key: EndpointKey,
    /// Total requests allowed in the current window.
    pub limit: u64,
    /// Requests still allowed in the current window.
    pub remaining: u64,
    /// Instant the window resets.
    pub reset_at: DateTime<Utc>,
    /// Length of the reporting window.
    pub window: Duration,
}

impl RateLimitDescriptor {
    /// Create a descriptor, clamping `remaining` to `limit`.
    pub fn new(
        key: EndpointKey,
        limit: u64,
        remaining: u64,
        reset_at: DateTime<Utc>,
        window: Duration,
    ) -> Self {
        Self {
            key,
            limit,
            remaining: remaining.min(limit),
            reset_at,
            window,
        }
    }

    /// Whether the window is spent and has not yet reset.
    pub fn is_exhausted(&self, now: DateTime<Utc>) -> bool {
        self.remaining == 0 && now < self.reset_at
    }

    /// Time until the window resets, if it has not already.
    pub fn wait_until_reset(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.reset_at - now).to_std().ok().filter(|d| !d.is_zero())
    }

    /// Whether the descriptor has outlived its window by a full grace
    /// window and should be evicted.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        let grace = TimeDelta::from_std(self.window).unwrap_or_else(|_| TimeDelta::seconds(60));
        now > self.reset_at + grace
    }

    /// Read-only view of the descriptor for callers and metrics consumers.
    pub fn status(&self, now: DateTime<Utc>) -> LimitStatus {
        let reset_in_seconds = (self.reset_at - now).to_std().map(|d| d.as_secs_f64()).unwrap_or(0.0);
        let utilization = if self.limit == 0 {
            1.0
        } else {
            1.0 - self.remaining as f64 / self.limit as f64
        };
        LimitStatus {
            limit: self.limit,
            remaining: self.remaining,
            reset_in_seconds,
            utilization,
        }
    }
}

/// Point-in-time view of a recorded limit, exposed by `status()`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LimitStatus {
    /// Total requests allowed in the current window.
    pub limit: u64,
    /// Requests still allowed in the current window.
    pub remaining: u64,
    /// Seconds until the window resets, clamped to zero.
    pub reset_in_seconds: f64,
    /// Fraction of the window consumed, `1 - remaining/limit`.
    pub utilization: f64,
}
