//! Token-bucket admission state.

use crate::EndpointKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tolerance for accumulated floating point error in token arithmetic.
const TOKEN_EPSILON: f64 = 1e-9;

/// Local pacing parameters for a bucket: how large it is and how fast it
/// replenishes, in tokens per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pace {
    /// Maximum tokens the bucket can hold.
    pub capacity: f64,
    /// Tokens credited per second.
    pub refill_rate: f64,
}

/// Outcome of an atomic refill-then-consume attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsumeOutcome {
    /// The cost was consumed; the call may proceed.
    Admitted,
    /// Insufficient tokens; retrying after the given wait will succeed
    /// absent contention.
    MustWait(Duration),
    /// Insufficient tokens and a refill rate of zero: the bucket is not
    /// replenishing, so waiting cannot help.
    Starved,
}

/// Token-bucket state for one endpoint key.
///
/// Buckets are owned by storage and mutated only through
/// [`TokenBucket::refill_then_consume`], which backends execute as a single
/// atomic unit per key. Tokens never exceed capacity and `last_refill` is
/// monotonic non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBucket {
    /// Endpoint the bucket paces.
    pub key: EndpointKey,
    /// Maximum tokens the bucket can hold.
    pub capacity: f64,
    /// Tokens currently available, in `[0, capacity]`.
    pub tokens: f64,
    /// Tokens credited per second.
    pub refill_rate: f64,
    /// Instant of the last refill.
    pub last_refill: DateTime<Utc>,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(key: EndpointKey, pace: Pace, now: DateTime<Utc>) -> Self {
        let capacity = pace.capacity.max(0.0);
        Self {
            key,
            capacity,
            tokens: capacity,
            refill_rate: pace.refill_rate.max(0.0),
            last_refill: now,
        }
    }

    /// The bucket's pacing parameters.
    pub fn pace(&self) -> Pace {
        Pace {
            capacity: self.capacity,
            refill_rate: self.refill_rate,
        }
    }

    /// Credit tokens for the time elapsed since the last refill.
    ///
    /// Clock skew is tolerated: a `now` before `last_refill` credits nothing
    /// and leaves `last_refill` unchanged, preserving monotonicity.
    pub fn refill(&mut self, now: DateTime<Utc>) {
        let elapsed = (now - self.last_refill).to_std().unwrap_or(Duration::ZERO);
        if !elapsed.is_zero() {
            self.tokens =
                (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Consume `cost` tokens if available, otherwise report the required wait.
    ///
    /// Callers must refill first; [`TokenBucket::refill_then_consume`] is the
    /// canonical entry point.
    pub fn consume(&mut self, cost: f64) -> ConsumeOutcome {
        if self.tokens + TOKEN_EPSILON >= cost {
            self.tokens = (self.tokens - cost).max(0.0);
            return ConsumeOutcome::Admitted;
        }
        if self.refill_rate > 0.0 {
            let wait = (cost - self.tokens) / self.refill_rate;
            ConsumeOutcome::MustWait(Duration::from_secs_f64(wait))
        } else {
            ConsumeOutcome::Starved
        }
    }

    /// Refill for elapsed time, then attempt to consume `cost`.
    ///
    /// Refill runs before every consumption attempt, including the very
    /// first, so a bucket never earns credit for time it did not exist.
    /// Storage backends execute this as one atomic unit per key.
    pub fn refill_then_consume(&mut self, now: DateTime<Utc>, cost: f64) -> ConsumeOutcome {
        self.refill(now);
        self.consume(cost)
    }

    /// Whether the bucket has been idle longer than `idle_ttl`.
    pub fn is_idle(&self, now: DateTime<Utc>, idle_ttl: Duration) -> bool {
        match (now - self.last_refill).to_std() {
            Ok(idle) => idle > idle_ttl,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn bucket(capacity: f64, refill_rate: f64, now: DateTime<Utc>) -> TokenBucket {
        TokenBucket::new(
            EndpointKey::resolve("https://api.example.com").unwrap(),
            Pace {
                capacity,
                refill_rate,
            },
            now,
        )
    }

    #[test]
    fn refill_caps_at_capacity() {
        let now = Utc::now();
        let mut b = bucket(5.0, 10.0, now);
        b.tokens = 1.0;
        b.refill(now + TimeDelta::seconds(60));
        assert_eq!(b.tokens, 5.0);
    }

    #[test]
    fn refill_ignores_backwards_clock() {
        let now = Utc::now();
        let mut b = bucket(5.0, 1.0, now);
        b.tokens = 2.0;
        b.refill(now - TimeDelta::seconds(30));
        assert_eq!(b.tokens, 2.0);
        assert_eq!(b.last_refill, now);
    }

    #[test]
    fn consume_reports_wait() {
        let now = Utc::now();
        let mut b = bucket(5.0, 2.0, now);
        b.tokens = 0.5;
        match b.consume(1.0) {
            ConsumeOutcome::MustWait(wait) => {
                assert!((wait.as_secs_f64() - 0.25).abs() < 1e-9);
            }
            other => panic!("expected MustWait, got {other:?}"),
        }
        // A failed consume leaves tokens unchanged.
        assert_eq!(b.tokens, 0.5);
    }

    #[test]
    fn zero_rate_starves() {
        let now = Utc::now();
        let mut b = bucket(5.0, 0.0, now);
        b.tokens = 0.0;
        assert_eq!(b.consume(1.0), ConsumeOutcome::Starved);
    }

    #[test]
    fn exhausted_bucket_admits_once_after_one_second() {
        let now = Utc::now();
        let mut b = bucket(5.0, 1.0, now);
        b.tokens = 0.0;
        let later = now + TimeDelta::seconds(1);
        assert_eq!(b.refill_then_consume(later, 1.0), ConsumeOutcome::Admitted);
        assert!(b.tokens.abs() < 1e-6);
        assert!(matches!(
            b.refill_then_consume(later, 1.0),
            ConsumeOutcome::MustWait(_)
        ));
    }
}
