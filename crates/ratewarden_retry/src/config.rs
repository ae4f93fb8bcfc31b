//! Retry policy configuration.

use crate::BackoffSchedule;
use ratewarden_error::{RatewardenError, RatewardenErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// How the delay between attempts grows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Every delay is `base_delay`.
    Constant,
    /// Delay is `base_delay * attempt`, capped at `max_delay`.
    Linear,
    /// Delay is `base_delay * backoff_factor^(attempt - 1)`, capped at
    /// `max_delay`.
    Exponential,
}

/// Immutable retry policy, shared read-only across concurrent invocations.
///
/// # Examples
///
/// ```
/// use ratewarden_retry::{BackoffStrategy, RetryConfig};
/// use std::time::Duration;
///
/// let config = RetryConfig::builder()
///     .max_attempts(5u32)
///     .strategy(BackoffStrategy::Exponential)
///     .base_delay(Duration::from_secs(1))
///     .build()
///     .unwrap();
/// assert_eq!(config.max_attempts, 5);
/// ```
#[derive(Debug, Clone, PartialEq, derive_builder::Builder)]
pub struct RetryConfig {
    /// Total attempts, including the first. Zero behaves like one.
    #[builder(default = "3")]
    pub max_attempts: u32,

    /// Delay growth strategy.
    #[builder(default = "BackoffStrategy::Exponential")]
    pub strategy: BackoffStrategy,

    /// Base delay fed to the strategy.
    #[builder(default = "Duration::from_secs(1)")]
    pub base_delay: Duration,

    /// Upper bound on any single delay.
    #[builder(default = "Duration::from_secs(60)")]
    pub max_delay: Duration,

    /// Multiplier for the exponential strategy.
    #[builder(default = "2.0")]
    pub backoff_factor: f64,

    /// Response statuses treated as retryable failures.
    #[builder(default = "default_retryable_statuses()")]
    pub retryable_statuses: HashSet<u16>,

    /// Multiply each delay by a uniform random factor in `[0, 1]`.
    #[builder(default = "false")]
    pub jitter: bool,

    /// Treat transport errors as transient (the designated transient error
    /// class for retries).
    #[builder(default = "true")]
    pub retry_transport_errors: bool,
}

fn default_retryable_statuses() -> HashSet<u16> {
    [429, 500, 502, 503, 504].into_iter().collect()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            strategy: BackoffStrategy::Exponential,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            retryable_statuses: default_retryable_statuses(),
            jitter: false,
            retry_transport_errors: true,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config builder.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Whether a response status classifies as a retryable failure.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Whether an error classifies as transient for this policy.
    pub fn is_transient_error(&self, error: &RatewardenError) -> bool {
        self.retry_transport_errors && matches!(error.kind(), RatewardenErrorKind::Transport(_))
    }

    /// The delay sequence this policy produces, one entry per allowed retry.
    pub fn schedule(&self) -> std::iter::Take<BackoffSchedule> {
        BackoffSchedule::new(
            self.strategy,
            self.base_delay,
            self.max_delay,
            self.backoff_factor,
            self.jitter,
        )
        .take(self.max_attempts.saturating_sub(1) as usize)
    }
}
