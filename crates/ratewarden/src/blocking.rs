//! Blocking front-end over the async limiter.

use crate::limiter::{LimiterOptions, RateLimiter};
use crate::transport::{RequestIntent, Transport};
use ratewarden_core::{Clock, LimitStatus, Pace, TransportResponse};
use ratewarden_error::{ConfigError, RatewardenResult};
use ratewarden_retry::RetryHandler;
use ratewarden_storage::LimitStore;
use std::sync::Arc;
use std::time::Duration;

/// Synchronous rate limiter for callers without an async runtime.
///
/// Wraps a [`RateLimiter`] over a dedicated runtime, the way blocking HTTP
/// clients wrap their async cores. Admission WAIT blocks the calling
/// thread; a worker pool may share one instance, with each thread blocking
/// on its own calls. Semantics are otherwise identical to the async
/// limiter, including the storage backend contract.
pub struct BlockingRateLimiter {
    inner: RateLimiter,
    runtime: tokio::runtime::Runtime,
}

impl BlockingRateLimiter {
    /// Connect storage per `options` and front the default async client.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use ratewarden::{BlockingRateLimiter, LimiterOptions, RequestIntent};
    ///
    /// # fn main() -> ratewarden_error::RatewardenResult<()> {
    /// let limiter = BlockingRateLimiter::new(LimiterOptions::default())?;
    /// let response = limiter.request(RequestIntent::get("https://api.github.com/users/octocat")?)?;
    /// println!("{}", response.status);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(options: LimiterOptions) -> RatewardenResult<Self> {
        let runtime = Self::build_runtime()?;
        let inner = runtime.block_on(RateLimiter::new(options))?;
        Ok(Self { inner, runtime })
    }

    /// Assemble a blocking limiter from explicit parts.
    pub fn with_parts(
        store: Arc<dyn LimitStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        options: LimiterOptions,
    ) -> RatewardenResult<Self> {
        Ok(Self {
            inner: RateLimiter::with_parts(store, transport, clock, options),
            runtime: Self::build_runtime()?,
        })
    }

    fn build_runtime() -> RatewardenResult<tokio::runtime::Runtime> {
        // One worker drives timers and IO; any number of caller threads may
        // block on calls concurrently.
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| ConfigError::new(format!("failed to build blocking runtime: {e}")).into())
    }

    /// Issue `intent`, blocking through admission waits and the dispatch.
    pub fn request(&self, intent: RequestIntent) -> RatewardenResult<TransportResponse> {
        self.runtime.block_on(self.inner.request(intent))
    }

    /// [`request`] wrapped in a retry policy.
    ///
    /// [`request`]: BlockingRateLimiter::request
    pub fn request_with_retry(
        &self,
        intent: RequestIntent,
        handler: &RetryHandler,
    ) -> RatewardenResult<TransportResponse> {
        self.runtime
            .block_on(self.inner.request_with_retry(intent, handler))
    }

    /// Current view of the recorded limit for `endpoint`.
    pub fn status(&self, endpoint: &str) -> RatewardenResult<Option<LimitStatus>> {
        self.runtime.block_on(self.inner.status(endpoint))
    }

    /// Seed a limit for `endpoint` without waiting for a server response.
    pub fn set_limit(&self, endpoint: &str, limit: u64, window: Duration) -> RatewardenResult<()> {
        self.runtime
            .block_on(self.inner.set_limit(endpoint, limit, window))
    }

    /// Seed a local pacing bucket for `endpoint`.
    pub fn set_pace(&self, endpoint: &str, pace: Pace) -> RatewardenResult<()> {
        self.runtime.block_on(self.inner.set_pace(endpoint, pace))
    }

    /// Evict stale descriptors and idle buckets from storage.
    pub fn purge_expired(&self) -> RatewardenResult<usize> {
        self.runtime.block_on(self.inner.purge_expired())
    }

    /// The wrapped async limiter.
    pub fn inner(&self) -> &RateLimiter {
        &self.inner
    }
}
