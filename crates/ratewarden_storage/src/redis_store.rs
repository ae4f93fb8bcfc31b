//! Distributed storage backend on Redis.

use crate::{LimitStore, StoreOptions};
use chrono::{DateTime, Utc};
use ratewarden_core::{ConsumeOutcome, EndpointKey, Pace, RateLimitDescriptor, TokenBucket};
use ratewarden_error::{RatewardenResult, StorageError};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_PREFIX: &str = "ratewarden:";

/// Refill-then-consume as one server-side script.
///
/// Running the whole read-modify-write inside Redis is what makes the
/// operation atomic across processes: contending clients serialize on the
/// script, never on a client-side round trip that could lose updates.
/// The caller's clock is passed in as an argument so all backends share one
/// logical time base.
const REFILL_CONSUME_SCRIPT: &str = r#"
    local bucket_key = KEYS[1]
    local cost = tonumber(ARGV[1])
    local capacity = tonumber(ARGV[2])
    local refill_rate = tonumber(ARGV[3])
    local now_ms = tonumber(ARGV[4])
    local idle_ttl = tonumber(ARGV[5])

    local data = redis.call("HMGET", bucket_key, "capacity", "tokens", "refill_rate", "last_refill_ms")

    local tokens
    local last_ms
    if data[1] then
        capacity = tonumber(data[1])
        tokens = tonumber(data[2])
        refill_rate = tonumber(data[3])
        last_ms = tonumber(data[4])
    else
        if capacity < 0 then
            return {"admitted", 0}
        end
        tokens = capacity
        last_ms = now_ms
    end

    local elapsed = (now_ms - last_ms) / 1000.0
    if elapsed > 0 then
        tokens = math.min(capacity, tokens + elapsed * refill_rate)
        last_ms = now_ms
    end

    local result
    local wait_ms = 0
    if tokens + 1e-9 >= cost then
        tokens = math.max(0, tokens - cost)
        result = "admitted"
    elseif refill_rate > 0 then
        result = "wait"
        wait_ms = math.ceil((cost - tokens) / refill_rate * 1000.0)
    else
        result = "starved"
    end

    redis.call("HSET", bucket_key,
        "capacity", capacity,
        "tokens", tokens,
        "refill_rate", refill_rate,
        "last_refill_ms", last_ms)
    redis.call("EXPIRE", bucket_key, idle_ttl)

    return {result, wait_ms}
"#;

/// Distributed backend: limit state shared by every process pointed at the
/// same Redis instance.
///
/// This is the only backend safe for multi-process or multi-host sharing.
/// An unreachable server surfaces as `StorageErrorKind::Unavailable`, never
/// as unconstrained admission.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    options: StoreOptions,
    prefix: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to the Redis instance at `url`.
    #[instrument(skip(options))]
    pub async fn connect(url: &str, options: StoreOptions) -> RatewardenResult<Self> {
        let client = redis::Client::open(url).map_err(StorageError::from)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(StorageError::from)?;
        debug!(url, "Connected redis limit store");
        Ok(Self {
            manager,
            options,
            prefix: DEFAULT_PREFIX.to_string(),
        })
    }

    fn descriptor_key(&self, key: &EndpointKey) -> String {
        format!("{}desc:{}", self.prefix, key)
    }

    fn bucket_key(&self, key: &EndpointKey) -> String {
        format!("{}bucket:{}", self.prefix, key)
    }

    fn idle_ttl_secs(&self) -> i64 {
        self.options.bucket_idle_ttl.as_secs().max(1) as i64
    }
}

#[async_trait::async_trait]
impl LimitStore for RedisStore {
    async fn descriptor(
        &self,
        key: &EndpointKey,
        now: DateTime<Utc>,
    ) -> RatewardenResult<Option<RateLimitDescriptor>> {
        let mut manager = self.manager.clone();
        let raw: Option<String> = manager
            .get(self.descriptor_key(key))
            .await
            .map_err(StorageError::from)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let descriptor: RateLimitDescriptor = serde_json::from_str(&raw)
            .map_err(|e| StorageError::corrupt(format!("descriptor for {key}: {e}")))?;
        // Key TTLs normally handle eviction; the staleness check keeps the
        // observable contract identical to the other backends.
        if descriptor.is_stale(now) {
            let _: () = manager
                .del(self.descriptor_key(key))
                .await
                .map_err(StorageError::from)?;
            return Ok(None);
        }
        Ok(Some(descriptor))
    }

    async fn set_descriptor(&self, descriptor: &RateLimitDescriptor) -> RatewardenResult<()> {
        let raw = serde_json::to_string(descriptor)
            .map_err(|e| StorageError::backend(format!("encoding descriptor: {e}")))?;
        // TTL mirrors the staleness rule: one grace window past reset.
        let window = descriptor.window.max(Duration::from_secs(1));
        let until_reset = (descriptor.reset_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let ttl = (until_reset + window).as_secs().max(1);
        let mut manager = self.manager.clone();
        let _: () = manager
            .set_ex(self.descriptor_key(&descriptor.key), raw, ttl)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn bucket(&self, key: &EndpointKey) -> RatewardenResult<Option<TokenBucket>> {
        let mut manager = self.manager.clone();
        let fields: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(self.bucket_key(key))
            .arg("capacity")
            .arg("tokens")
            .arg("refill_rate")
            .arg("last_refill_ms")
            .query_async(&mut manager)
            .await
            .map_err(StorageError::from)?;
        let [Some(capacity), Some(tokens), Some(refill_rate), Some(last_refill_ms)] =
            fields.as_slice()
        else {
            return Ok(None);
        };
        let parse_f64 = |name: &str, raw: &str| {
            raw.parse::<f64>()
                .map_err(|e| StorageError::corrupt(format!("bucket {name} for {key}: {e}")))
        };
        let last_ms = last_refill_ms
            .parse::<i64>()
            .map_err(|e| StorageError::corrupt(format!("bucket last_refill for {key}: {e}")))?;
        let last_refill = DateTime::<Utc>::from_timestamp_millis(last_ms)
            .ok_or_else(|| StorageError::corrupt(format!("last_refill out of range: {last_ms}")))?;
        Ok(Some(TokenBucket {
            key: key.clone(),
            capacity: parse_f64("capacity", capacity)?,
            tokens: parse_f64("tokens", tokens)?,
            refill_rate: parse_f64("refill_rate", refill_rate)?,
            last_refill,
        }))
    }

    async fn set_bucket(&self, bucket: &TokenBucket) -> RatewardenResult<()> {
        let mut manager = self.manager.clone();
        let _: () = redis::pipe()
            .hset_multiple(
                self.bucket_key(&bucket.key),
                &[
                    ("capacity", bucket.capacity.to_string()),
                    ("tokens", bucket.tokens.to_string()),
                    ("refill_rate", bucket.refill_rate.to_string()),
                    ("last_refill_ms", bucket.last_refill.timestamp_millis().to_string()),
                ],
            )
            .expire(self.bucket_key(&bucket.key), self.idle_ttl_secs())
            .query_async(&mut manager)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn refill_consume(
        &self,
        key: &EndpointKey,
        cost: f64,
        default_pace: Option<Pace>,
        now: DateTime<Utc>,
    ) -> RatewardenResult<ConsumeOutcome> {
        let pace = default_pace.filter(|p| p.capacity.is_finite());
        let (capacity, refill_rate) = match pace {
            Some(p) => (p.capacity, p.refill_rate),
            // Negative capacity tells the script "no default pace".
            None => (-1.0, 0.0),
        };
        let script = redis::Script::new(REFILL_CONSUME_SCRIPT);
        let mut manager = self.manager.clone();
        let (result, wait_ms): (String, u64) = script
            .key(self.bucket_key(key))
            .arg(cost)
            .arg(capacity)
            .arg(refill_rate)
            .arg(now.timestamp_millis())
            .arg(self.idle_ttl_secs())
            .invoke_async(&mut manager)
            .await
            .map_err(StorageError::from)?;
        match result.as_str() {
            "admitted" => Ok(ConsumeOutcome::Admitted),
            "wait" => Ok(ConsumeOutcome::MustWait(Duration::from_millis(wait_ms))),
            "starved" => Ok(ConsumeOutcome::Starved),
            other => Err(StorageError::backend(format!(
                "unexpected script result: {other}"
            ))
            .into()),
        }
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> RatewardenResult<usize> {
        // Redis key TTLs already evict stale entries server-side.
        Ok(0)
    }
}
