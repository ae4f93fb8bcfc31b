//! TOML configuration for the limiter.
//!
//! Configuration merges three layers, later layers winning:
//! - Bundled defaults (`include_str!` from ratewarden.toml)
//! - `./ratewarden.toml` in the working directory
//! - `~/.config/ratewarden/ratewarden.toml`

use crate::limiter::LimiterOptions;
use config::{Config, File, FileFormat};
use ratewarden_error::{ConfigError, RatewardenResult};
use ratewarden_retry::{BackoffStrategy, RetryConfig};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../ratewarden.toml");

/// Storage section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Backend URI: `memory://`, `sqlite://PATH`, or `redis://HOST:PORT/DB`.
    pub uri: String,
    /// Seconds an untouched pacing bucket survives before eviction.
    pub bucket_idle_ttl_secs: u64,
}

/// Limiter section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LimiterSettings {
    /// Upper bound in seconds on total admission wait per call.
    pub max_total_wait_secs: u64,
}

/// Retry section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// `"constant"`, `"linear"`, or `"exponential"`.
    pub strategy: String,
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier for the exponential strategy.
    pub backoff_factor: f64,
    /// Response statuses treated as retryable.
    pub retryable_statuses: Vec<u16>,
    /// Multiply delays by a uniform random factor in `[0, 1]`.
    pub jitter: bool,
}

/// Full configuration tree.
///
/// # Examples
///
/// ```
/// use ratewarden::RatewardenConfig;
///
/// let config = RatewardenConfig::load().unwrap();
/// assert_eq!(config.storage.uri, "memory://");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RatewardenConfig {
    /// Storage backend selection.
    pub storage: StorageSettings,
    /// Admission bounds.
    pub limiter: LimiterSettings,
    /// Default retry policy.
    pub retry: RetrySettings,
}

impl RatewardenConfig {
    /// Load configuration: bundled defaults merged with user overrides.
    #[instrument]
    pub fn load() -> RatewardenResult<Self> {
        let mut builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::new("ratewarden", FileFormat::Toml).required(false));
        if let Some(config_dir) = dirs::config_dir() {
            let user_path = config_dir.join("ratewarden").join("ratewarden.toml");
            builder = builder.add_source(
                File::from(user_path.clone()).required(false),
            );
            debug!(path = %user_path.display(), "Considering user config");
        }
        builder
            .build()
            .map_err(|e| ConfigError::new(format!("loading configuration: {e}")))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("parsing configuration: {e}")).into())
    }

    /// Load configuration from one explicit file over the bundled defaults.
    pub fn from_file(path: &str) -> RatewardenResult<Self> {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::new(path, FileFormat::Toml))
            .build()
            .map_err(|e| ConfigError::new(format!("loading {path}: {e}")))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("parsing {path}: {e}")).into())
    }

    /// Limiter options described by this configuration.
    pub fn limiter_options(&self) -> LimiterOptions {
        LimiterOptions {
            storage: self.storage.uri.clone(),
            max_total_wait: Duration::from_secs(self.limiter.max_total_wait_secs),
            default_pace: None,
            bucket_idle_ttl: Duration::from_secs(self.storage.bucket_idle_ttl_secs),
            event_capacity: 256,
        }
    }

    /// Retry policy described by this configuration.
    pub fn retry_config(&self) -> RatewardenResult<RetryConfig> {
        let strategy = BackoffStrategy::from_str(&self.retry.strategy).map_err(|_| {
            ConfigError::new(format!("unknown retry strategy: {:?}", self.retry.strategy))
        })?;
        Ok(RetryConfig {
            max_attempts: self.retry.max_attempts,
            strategy,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            backoff_factor: self.retry.backoff_factor,
            retryable_statuses: self.retry.retryable_statuses.iter().copied().collect(),
            jitter: self.retry.jitter,
            retry_transport_errors: true,
        })
    }
}
