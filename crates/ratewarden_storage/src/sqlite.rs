//! Embedded-durable storage backend on SQLite.

use crate::{LimitStore, StoreOptions};
use chrono::{DateTime, Utc};
use ratewarden_core::{ConsumeOutcome, EndpointKey, Pace, RateLimitDescriptor, TokenBucket};
use ratewarden_error::{RatewardenResult, StorageError};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use tracing::{debug, instrument};

/// Embedded-durable backend: limit state survives process restarts.
///
/// Every mutating call executes inside one transaction, so refill and
/// consume commit together; writers serialize on a single pooled
/// connection. Like [`MemoryStore`], this backend is confined to one
/// process - the file must not be shared between processes.
///
/// [`MemoryStore`]: crate::MemoryStore
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    options: StoreOptions,
}

impl SqliteStore {
    /// Open (and create, if missing) the database at `path`.
    ///
    /// `":memory:"` opens a transient in-memory database, useful for tests.
    #[instrument(skip(options))]
    pub async fn open(path: &str, options: StoreOptions) -> RatewardenResult<Self> {
        let connect = if path == ":memory:" {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };
        // One connection: writers serialize at the pool, and a transient
        // in-memory database is never dropped between calls.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect)
            .await
            .map_err(StorageError::from)?;
        let store = Self { pool, options };
        store.migrate().await?;
        debug!(path, "Opened sqlite limit store");
        Ok(store)
    }

    async fn migrate(&self) -> RatewardenResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS descriptors (
                key TEXT PRIMARY KEY,
                limit_total INTEGER NOT NULL,
                remaining INTEGER NOT NULL,
                reset_at_ms INTEGER NOT NULL,
                window_ms INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS buckets (
                key TEXT PRIMARY KEY,
                capacity REAL NOT NULL,
                tokens REAL NOT NULL,
                refill_rate REAL NOT NULL,
                last_refill_ms INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(())
    }

    fn descriptor_from_row(row: &sqlx::sqlite::SqliteRow) -> RatewardenResult<RateLimitDescriptor> {
        let key: String = row.try_get("key").map_err(StorageError::from)?;
        let limit: i64 = row.try_get("limit_total").map_err(StorageError::from)?;
        let remaining: i64 = row.try_get("remaining").map_err(StorageError::from)?;
        let reset_at_ms: i64 = row.try_get("reset_at_ms").map_err(StorageError::from)?;
        let window_ms: i64 = row.try_get("window_ms").map_err(StorageError::from)?;
        let reset_at = DateTime::<Utc>::from_timestamp_millis(reset_at_ms)
            .ok_or_else(|| StorageError::corrupt(format!("reset_at out of range: {reset_at_ms}")))?;
        Ok(RateLimitDescriptor::new(
            EndpointKey::from_raw(key),
            limit.max(0) as u64,
            remaining.max(0) as u64,
            reset_at,
            Duration::from_millis(window_ms.max(0) as u64),
        ))
    }

    fn bucket_from_row(row: &sqlx::sqlite::SqliteRow) -> RatewardenResult<TokenBucket> {
        let key: String = row.try_get("key").map_err(StorageError::from)?;
        let capacity: f64 = row.try_get("capacity").map_err(StorageError::from)?;
        let tokens: f64 = row.try_get("tokens").map_err(StorageError::from)?;
        let refill_rate: f64 = row.try_get("refill_rate").map_err(StorageError::from)?;
        let last_refill_ms: i64 = row.try_get("last_refill_ms").map_err(StorageError::from)?;
        let last_refill = DateTime::<Utc>::from_timestamp_millis(last_refill_ms).ok_or_else(
            || StorageError::corrupt(format!("last_refill out of range: {last_refill_ms}")),
        )?;
        Ok(TokenBucket {
            key: EndpointKey::from_raw(key),
            capacity,
            tokens,
            refill_rate,
            last_refill,
        })
    }

    async fn upsert_bucket<'e, E>(executor: E, bucket: &TokenBucket) -> RatewardenResult<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO buckets (key, capacity, tokens, refill_rate, last_refill_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(key) DO UPDATE SET
                capacity = excluded.capacity,
                tokens = excluded.tokens,
                refill_rate = excluded.refill_rate,
                last_refill_ms = excluded.last_refill_ms
            "#,
        )
        .bind(bucket.key.as_str())
        .bind(bucket.capacity)
        .bind(bucket.tokens)
        .bind(bucket.refill_rate)
        .bind(bucket.last_refill.timestamp_millis())
        .execute(executor)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LimitStore for SqliteStore {
    async fn descriptor(
        &self,
        key: &EndpointKey,
        now: DateTime<Utc>,
    ) -> RatewardenResult<Option<RateLimitDescriptor>> {
        let row = sqlx::query("SELECT * FROM descriptors WHERE key = ?1")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let descriptor = Self::descriptor_from_row(&row)?;
        if descriptor.is_stale(now) {
            debug!(key = %key, "Evicting stale descriptor");
            sqlx::query("DELETE FROM descriptors WHERE key = ?1")
                .bind(key.as_str())
                .execute(&self.pool)
                .await
                .map_err(StorageError::from)?;
            return Ok(None);
        }
        Ok(Some(descriptor))
    }

    async fn set_descriptor(&self, descriptor: &RateLimitDescriptor) -> RatewardenResult<()> {
        sqlx::query(
            r#"
            INSERT INTO descriptors (key, limit_total, remaining, reset_at_ms, window_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(key) DO UPDATE SET
                limit_total = excluded.limit_total,
                remaining = excluded.remaining,
                reset_at_ms = excluded.reset_at_ms,
                window_ms = excluded.window_ms
            "#,
        )
        .bind(descriptor.key.as_str())
        .bind(descriptor.limit as i64)
        .bind(descriptor.remaining as i64)
        .bind(descriptor.reset_at.timestamp_millis())
        .bind(descriptor.window.as_millis() as i64)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    async fn bucket(&self, key: &EndpointKey) -> RatewardenResult<Option<TokenBucket>> {
        let row = sqlx::query("SELECT * FROM buckets WHERE key = ?1")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        row.as_ref().map(Self::bucket_from_row).transpose()
    }

    async fn set_bucket(&self, bucket: &TokenBucket) -> RatewardenResult<()> {
        Self::upsert_bucket(&self.pool, bucket).await
    }

    async fn refill_consume(
        &self,
        key: &EndpointKey,
        cost: f64,
        default_pace: Option<Pace>,
        now: DateTime<Utc>,
    ) -> RatewardenResult<ConsumeOutcome> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let row = sqlx::query("SELECT * FROM buckets WHERE key = ?1")
            .bind(key.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(StorageError::from)?;

        let mut bucket = match row {
            Some(row) => Self::bucket_from_row(&row)?,
            None => {
                let Some(pace) = default_pace.filter(|p| p.capacity.is_finite()) else {
                    // No bucket and no pace configured: unconstrained.
                    return Ok(ConsumeOutcome::Admitted);
                };
                TokenBucket::new(key.clone(), pace, now)
            }
        };

        let outcome = bucket.refill_then_consume(now, cost);
        Self::upsert_bucket(&mut *tx, &bucket).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(outcome)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> RatewardenResult<usize> {
        let now_ms = now.timestamp_millis();
        let descriptors = sqlx::query("DELETE FROM descriptors WHERE ?1 > reset_at_ms + window_ms")
            .bind(now_ms)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?
            .rows_affected();
        let idle_ttl_ms = self.options.bucket_idle_ttl.as_millis() as i64;
        let buckets = sqlx::query("DELETE FROM buckets WHERE last_refill_ms < ?1 - ?2")
            .bind(now_ms)
            .bind(idle_ttl_ms)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?
            .rows_affected();
        let removed = (descriptors + buckets) as usize;
        if removed > 0 {
            debug!(removed, "Purged expired limit state");
        }
        Ok(removed)
    }
}
