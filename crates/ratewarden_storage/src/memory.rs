//! In-process storage backend.

use crate::{LimitStore, StoreOptions};
use chrono::{DateTime, Utc};
use ratewarden_core::{ConsumeOutcome, EndpointKey, Pace, RateLimitDescriptor, TokenBucket};
use ratewarden_error::RatewardenResult;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Shelf {
    descriptors: HashMap<EndpointKey, RateLimitDescriptor>,
    buckets: HashMap<EndpointKey, TokenBucket>,
}

/// Single-process backend: a map guarded by one async lock.
///
/// `refill_consume` holds the write lock across refill and consume, so the
/// two steps are one atomic unit per key. State dies with the process;
/// sharing across processes requires the Redis backend.
#[derive(Debug)]
pub struct MemoryStore {
    shelf: RwLock<Shelf>,
    options: StoreOptions,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(options: StoreOptions) -> Self {
        debug!(
            bucket_idle_ttl = ?options.bucket_idle_ttl,
            "Creating in-memory limit store"
        );
        Self {
            shelf: RwLock::new(Shelf::default()),
            options,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

#[async_trait::async_trait]
impl LimitStore for MemoryStore {
    async fn descriptor(
        &self,
        key: &EndpointKey,
        now: DateTime<Utc>,
    ) -> RatewardenResult<Option<RateLimitDescriptor>> {
        {
            let shelf = self.shelf.read().await;
            match shelf.descriptors.get(key) {
                None => return Ok(None),
                Some(descriptor) if !descriptor.is_stale(now) => {
                    return Ok(Some(descriptor.clone()));
                }
                Some(_) => {}
            }
        }
        // Stale entry: lazily evict under the write lock and re-check, since
        // another task may have replaced it in the meantime.
        let mut shelf = self.shelf.write().await;
        match shelf.descriptors.get(key) {
            Some(descriptor) if descriptor.is_stale(now) => {
                debug!(key = %key, "Evicting stale descriptor");
                shelf.descriptors.remove(key);
                Ok(None)
            }
            other => Ok(other.cloned()),
        }
    }

    async fn set_descriptor(&self, descriptor: &RateLimitDescriptor) -> RatewardenResult<()> {
        let mut shelf = self.shelf.write().await;
        shelf
            .descriptors
            .insert(descriptor.key.clone(), descriptor.clone());
        Ok(())
    }

    async fn bucket(&self, key: &EndpointKey) -> RatewardenResult<Option<TokenBucket>> {
        let shelf = self.shelf.read().await;
        Ok(shelf.buckets.get(key).cloned())
    }

    async fn set_bucket(&self, bucket: &TokenBucket) -> RatewardenResult<()> {
        let mut shelf = self.shelf.write().await;
        shelf.buckets.insert(bucket.key.clone(), bucket.clone());
        Ok(())
    }

    async fn refill_consume(
        &self,
        key: &EndpointKey,
        cost: f64,
        default_pace: Option<Pace>,
        now: DateTime<Utc>,
    ) -> RatewardenResult<ConsumeOutcome> {
        let mut shelf = self.shelf.write().await;
        if let Some(bucket) = shelf.buckets.get_mut(key) {
            return Ok(bucket.refill_then_consume(now, cost));
        }
        let Some(pace) = default_pace.filter(|p| p.capacity.is_finite()) else {
            // No bucket and no pace configured: the key is unconstrained.
            return Ok(ConsumeOutcome::Admitted);
        };
        let mut bucket = TokenBucket::new(key.clone(), pace, now);
        let outcome = bucket.refill_then_consume(now, cost);
        shelf.buckets.insert(key.clone(), bucket);
        Ok(outcome)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> RatewardenResult<usize> {
        let mut shelf = self.shelf.write().await;
        let before = shelf.descriptors.len() + shelf.buckets.len();
        shelf.descriptors.retain(|_, d| !d.is_stale(now));
        let idle_ttl = self.options.bucket_idle_ttl;
        shelf.buckets.retain(|_, b| !b.is_idle(now, idle_ttl));
        let removed = before - shelf.descriptors.len() - shelf.buckets.len();
        if removed > 0 {
            debug!(removed, "Purged expired limit state");
        }
        Ok(removed)
    }
}
