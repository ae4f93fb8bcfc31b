//! Storage trait definition.

use chrono::{DateTime, Utc};
use ratewarden_core::{ConsumeOutcome, EndpointKey, Pace, RateLimitDescriptor, TokenBucket};
use ratewarden_error::RatewardenResult;
use std::time::Duration;

/// Tuning shared by every backend.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long an untouched pacing bucket survives before eviction.
    pub bucket_idle_ttl: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            bucket_idle_ttl: Duration::from_secs(3600),
        }
    }
}

/// Trait for pluggable limit-state backends.
///
/// Implementations store [`RateLimitDescriptor`]s (server-reported truth)
/// and [`TokenBucket`]s (local pacing state) per endpoint key. Only
/// [`refill_consume`], [`set_descriptor`] and [`set_bucket`] mutate state,
/// and all three must be safe under arbitrary interleaving - across
/// processes, for the distributed backend.
///
/// Time is always passed in by the caller so that a limiter and its store
/// share a single logical clock; a store never reads the wall clock to make
/// an admission decision.
///
/// [`refill_consume`]: LimitStore::refill_consume
/// [`set_descriptor`]: LimitStore::set_descriptor
/// [`set_bucket`]: LimitStore::set_bucket
#[async_trait::async_trait]
pub trait LimitStore: Send + Sync {
    /// Read the descriptor for `key`, evicting it if stale.
    ///
    /// `None` means nothing has ever been recorded for the key - a valid
    /// state, not a fault.
    async fn descriptor(
        &self,
        key: &EndpointKey,
        now: DateTime<Utc>,
    ) -> RatewardenResult<Option<RateLimitDescriptor>>;

    /// Write a descriptor, overwriting any prior state for its key.
    ///
    /// Callers write the freshest server-reported truth here; ordering is
    /// last-writer-wins by response arrival.
    async fn set_descriptor(&self, descriptor: &RateLimitDescriptor) -> RatewardenResult<()>;

    /// Read the pacing bucket for `key`, if one has been seeded.
    async fn bucket(&self, key: &EndpointKey) -> RatewardenResult<Option<TokenBucket>>;

    /// Write a pacing bucket, overwriting any prior state for its key.
    async fn set_bucket(&self, bucket: &TokenBucket) -> RatewardenResult<()>;

    /// Atomically refill the bucket for `key` and consume `cost` tokens.
    ///
    /// Refill and consume execute as one indivisible unit per key: two
    /// concurrent callers must never both observe sufficient tokens for a
    /// cost only one of them can satisfy.
    ///
    /// A key with no bucket is lazily seeded from `default_pace`; with no
    /// default pace either, the key is unconstrained and the call admits
    /// without storing anything.
    async fn refill_consume(
        &self,
        key: &EndpointKey,
        cost: f64,
        default_pace: Option<Pace>,
        now: DateTime<Utc>,
    ) -> RatewardenResult<ConsumeOutcome>;

    /// Evict stale descriptors and idle buckets, returning how many entries
    /// were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> RatewardenResult<usize>;
}
