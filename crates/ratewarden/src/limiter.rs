//! The limiter orchestrator.
//!
//! Each call runs the state machine
//! `RESOLVE_KEY -> CHECK_ADMISSION -> (WAIT)* -> DISPATCH -> OBSERVE ->
//! UPDATE_STATE -> RETURN`: normalize the endpoint to a bucket key, consult
//! storage, wait out any reported window, delegate to the injected
//! transport, then feed detected headers back into storage. The caller gets
//! the response unmodified.

use crate::detector;
use crate::events::RequestOutcome;
use crate::transport::{ReqwestTransport, RequestIntent, Transport};
use chrono::{DateTime, TimeDelta, Utc};
use ratewarden_core::{
    AdmissionDecision, Clock, EndpointKey, LimitStatus, Pace, RateLimitDescriptor, SystemClock,
    TokenBucket, TransportResponse,
};
use ratewarden_error::{
    AdmissionError, AdmissionErrorKind, ConfigError, RatewardenError, RatewardenErrorKind,
    RatewardenResult,
};
use ratewarden_retry::RetryHandler;
use ratewarden_storage::{LimitStore, StoreOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Limiter construction options.
///
/// # Examples
///
/// ```
/// use ratewarden::LimiterOptions;
/// use std::time::Duration;
///
/// let options = LimiterOptions::builder()
///     .storage("sqlite://rate_limits.db".to_string())
///     .max_total_wait(Duration::from_secs(30))
///     .build()
///     .unwrap();
/// assert_eq!(options.storage, "sqlite://rate_limits.db");
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
pub struct LimiterOptions {
    /// Storage backend URI: `memory://`, `sqlite://PATH`, or
    /// `redis://HOST:PORT/DB`. Unrecognized schemes fail at construction.
    #[builder(default = "\"memory://\".to_string()")]
    pub storage: String,

    /// Upper bound on total admission wait per call.
    #[builder(default = "Duration::from_secs(300)")]
    pub max_total_wait: Duration,

    /// Pace applied to keys with no seeded bucket. `None` leaves such keys
    /// unconstrained until a limit is detected or set.
    #[builder(default)]
    pub default_pace: Option<Pace>,

    /// How long an untouched pacing bucket survives before eviction.
    #[builder(default = "Duration::from_secs(3600)")]
    pub bucket_idle_ttl: Duration,

    /// Buffered capacity of the request-outcome event channel.
    #[builder(default = "256")]
    pub event_capacity: usize,
}

impl Default for LimiterOptions {
    fn default() -> Self {
        LimiterOptionsBuilder::default()
            .build()
            .expect("builder defaults are complete")
    }
}

impl LimiterOptions {
    /// Creates a new limiter options builder.
    pub fn builder() -> LimiterOptionsBuilder {
        LimiterOptionsBuilder::default()
    }
}

/// Async rate limiter fronting an injected transport.
///
/// One instance is shared by any number of concurrent tasks; all shared
/// state lives in the [`LimitStore`]. With the memory or sqlite backend
/// that state is confined to this process; only the redis backend may be
/// shared across processes.
///
/// # Examples
///
/// ```rust,no_run
/// use ratewarden::{LimiterOptions, RateLimiter, RequestIntent};
///
/// # #[tokio::main]
/// # async fn main() -> ratewarden_error::RatewardenResult<()> {
/// let limiter = RateLimiter::new(LimiterOptions::default()).await?;
/// let response = limiter
///     .request(RequestIntent::get("https://api.github.com/users/octocat")?)
///     .await?;
/// println!("{}", response.status);
/// # Ok(())
/// # }
/// ```
pub struct RateLimiter {
    store: Arc<dyn LimitStore>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    options: LimiterOptions,
    events: broadcast::Sender<RequestOutcome>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Connect storage per `options` and front the default async client.
    pub async fn new(options: LimiterOptions) -> RatewardenResult<Self> {
        let store = ratewarden_storage::connect(
            &options.storage,
            StoreOptions {
                bucket_idle_ttl: options.bucket_idle_ttl,
            },
        )
        .await?;
        Ok(Self::with_parts(
            store,
            Arc::new(ReqwestTransport::default()),
            Arc::new(SystemClock),
            options,
        ))
    }

    /// Assemble a limiter from explicit parts.
    ///
    /// This is the injection seam: tests swap in a [`MockTransport`] and a
    /// `ManualClock`, embedders swap in their own store or client.
    ///
    /// [`MockTransport`]: crate::MockTransport
    pub fn with_parts(
        store: Arc<dyn LimitStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        options: LimiterOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Self {
            store,
            transport,
            clock,
            options,
            events,
        }
    }

    /// Subscribe to request outcomes.
    pub fn events(&self) -> broadcast::Receiver<RequestOutcome> {
        self.events.subscribe()
    }

    /// The store this limiter writes through.
    pub fn store(&self) -> &Arc<dyn LimitStore> {
        &self.store
    }

    /// Current view of the recorded limit for `endpoint`.
    ///
    /// `None` means nothing has been recorded - a valid state, not a fault.
    pub async fn status(&self, endpoint: &str) -> RatewardenResult<Option<LimitStatus>> {
        let key = EndpointKey::resolve(endpoint)?;
        let now = self.clock.now();
        Ok(self
            .store
            .descriptor(&key, now)
            .await?
            .map(|d| d.status(now)))
    }

    /// Seed a limit for `endpoint` without waiting for a server response.
    ///
    /// Idempotent: repeating the call with identical arguments while the
    /// seeded window is still open leaves the descriptor untouched, so the
    /// reset instant does not drift.
    #[instrument(skip(self))]
    pub async fn set_limit(
        &self,
        endpoint: &str,
        limit: u64,
        window: Duration,
    ) -> RatewardenResult<()> {
        let key = EndpointKey::resolve(endpoint)?;
        let now = self.clock.now();
        if let Some(existing) = self.store.descriptor(&key, now).await? {
            if existing.limit == limit && existing.window == window && now < existing.reset_at {
                debug!(key = %key, "Limit already seeded; keeping existing window");
                return Ok(());
            }
        }
        let delta = TimeDelta::from_std(window)
            .map_err(|_| ConfigError::new(format!("window out of range: {window:?}")))?;
        let descriptor = RateLimitDescriptor::new(key, limit, limit, now + delta, window);
        self.store.set_descriptor(&descriptor).await
    }

    /// Seed a local pacing bucket for `endpoint`.
    ///
    /// Pacing throttles calls client-side even when the server reports no
    /// limits; a server-reported descriptor still takes precedence for the
    /// wait decision.
    #[instrument(skip(self))]
    pub async fn set_pace(&self, endpoint: &str, pace: Pace) -> RatewardenResult<()> {
        let key = EndpointKey::resolve(endpoint)?;
        let bucket = TokenBucket::new(key, pace, self.clock.now());
        self.store.set_bucket(&bucket).await
    }

    /// Evict stale descriptors and idle buckets from storage.
    pub async fn purge_expired(&self) -> RatewardenResult<usize> {
        self.store.purge_expired(self.clock.now()).await
    }

    /// Issue `intent` through the admission state machine.
    #[instrument(skip(self, intent), fields(method = %intent.method, url = %intent.url))]
    pub async fn request(&self, intent: RequestIntent) -> RatewardenResult<TransportResponse> {
        let key = EndpointKey::normalize(&intent.url);
        let wait_budget = match intent.deadline {
            Some(deadline) => deadline.min(self.options.max_total_wait),
            None => self.options.max_total_wait,
        };
        let mut waited = Duration::ZERO;

        // CHECK_ADMISSION / WAIT loop.
        let descriptor_at_call = loop {
            if let Some(token) = &intent.cancel {
                if token.is_cancelled() {
                    return Err(AdmissionError::new(AdmissionErrorKind::Cancelled).into());
                }
            }
            let now = self.clock.now();
            let (decision, descriptor) = self.check_admission(&key, now).await?;
            match decision {
                AdmissionDecision::Admitted => break descriptor,
                AdmissionDecision::MustWait(wait) => {
                    if waited + wait > wait_budget {
                        warn!(key = %key, ?waited, ?wait, "Admission wait budget exhausted");
                        return Err(AdmissionError::new(AdmissionErrorKind::DeadlineExceeded {
                            waited,
                            outstanding: wait,
                        })
                        .into());
                    }
                    debug!(key = %key, ?wait, "Rate limited, waiting for admission");
                    wait_or_cancel(wait, intent.cancel.as_ref()).await?;
                    waited += wait;
                }
                AdmissionDecision::Unavailable(error) => {
                    return Err(error.into());
                }
            }
        };

        // DISPATCH. A cancelled call returns here, before any state update.
        let response = match &intent.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => {
                        return Err(AdmissionError::new(AdmissionErrorKind::Cancelled).into());
                    }
                    outcome = self.transport.execute(&intent) => outcome?,
                }
            }
            None => self.transport.execute(&intent).await?,
        };

        // OBSERVE / UPDATE_STATE.
        let now = self.clock.now();
        if let Some(found) = detector::detect(response.status, &response.headers, now) {
            let descriptor = found.into_descriptor(key.clone());
            debug!(
                key = %key,
                limit = descriptor.limit,
                remaining = descriptor.remaining,
                "Recording server-reported limit"
            );
            if let Err(error) = self.store.set_descriptor(&descriptor).await {
                // The response is already in hand; report the lost write and
                // return the response anyway.
                warn!(key = %key, %error, "Failed to record detected limit");
            }
        }

        let _ = self.events.send(RequestOutcome {
            key,
            status: response.status,
            descriptor: descriptor_at_call,
            at: now,
        });

        Ok(response)
    }

    /// [`request`] wrapped in a retry policy.
    ///
    /// Retry backoff recovers from failures; the admission WAIT inside each
    /// attempt paces the call. The two waits are independent and may both
    /// occur for one logical call.
    ///
    /// [`request`]: RateLimiter::request
    pub async fn request_with_retry(
        &self,
        intent: RequestIntent,
        handler: &RetryHandler,
    ) -> RatewardenResult<TransportResponse> {
        handler.retry_async(|| self.request(intent.clone())).await
    }

    /// Read the descriptor and run the pacing bucket for one admission
    /// check.
    ///
    /// A server-reported descriptor takes precedence for the wait decision;
    /// the bucket alone decides only for keys with no recorded descriptor.
    async fn check_admission(
        &self,
        key: &EndpointKey,
        now: DateTime<Utc>,
    ) -> RatewardenResult<(AdmissionDecision, Option<RateLimitDescriptor>)> {
        let descriptor = match self.store.descriptor(key, now).await {
            Ok(descriptor) => descriptor,
            Err(error) => return Ok((unavailable(error)?, None)),
        };
        if let Some(descriptor) = &descriptor {
            if descriptor.is_exhausted(now) {
                let wait = descriptor
                    .wait_until_reset(now)
                    .unwrap_or(Duration::from_millis(1));
                return Ok((AdmissionDecision::MustWait(wait), Some(descriptor.clone())));
            }
        }
        let outcome = match self
            .store
            .refill_consume(key, 1.0, self.options.default_pace, now)
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => return Ok((unavailable(error)?, descriptor)),
        };
        use ratewarden_core::ConsumeOutcome;
        let decision = match outcome {
            ConsumeOutcome::Admitted => AdmissionDecision::Admitted,
            // Descriptor precedence: a key with recorded server truth is
            // admitted on that truth alone.
            ConsumeOutcome::MustWait(_) | ConsumeOutcome::Starved if descriptor.is_some() => {
                AdmissionDecision::Admitted
            }
            ConsumeOutcome::MustWait(wait) => AdmissionDecision::MustWait(wait),
            ConsumeOutcome::Starved => {
                return Err(AdmissionError::new(AdmissionErrorKind::Starved).into());
            }
        };
        Ok((decision, descriptor))
    }
}

/// Map a storage failure into the explicit `Unavailable` admission variant;
/// anything that is not a storage error propagates.
fn unavailable(error: RatewardenError) -> RatewardenResult<AdmissionDecision> {
    match error.into_kind() {
        RatewardenErrorKind::Storage(storage) => Ok(AdmissionDecision::Unavailable(storage)),
        other => Err(RatewardenError::new(other)),
    }
}

async fn wait_or_cancel(
    wait: Duration,
    cancel: Option<&CancellationToken>,
) -> RatewardenResult<()> {
    match cancel {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => {
                    Err(AdmissionError::new(AdmissionErrorKind::Cancelled).into())
                }
                _ = tokio::time::sleep(wait) => Ok(()),
            }
        }
        None => {
            tokio::time::sleep(wait).await;
            Ok(())
        }
    }
}
