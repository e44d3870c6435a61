//! Retry logic with exponential backoff
//!
//! Every networked operation in the pipeline runs through [`with_retry`].
//! Two policies are configured: [`Config::retry`](crate::config::Config::retry)
//! for ordinary requests and downloads, and
//! [`Config::polling`](crate::config::Config::polling) for waiting on remote
//! processing.
//!
//! # Example
//!
//! ```no_run
//! use asset_bundler::config::RetryConfig;
//! use asset_bundler::error::Error;
//! use asset_bundler::retry::with_retry;
//!
//! # async fn example() -> Result<(), Error> {
//! let policy = RetryConfig::default();
//! let value = with_retry(&policy, "lookup", || async {
//!     Ok::<_, Error>(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use rand::Rng;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, 5xx responses, pending
/// remote work) return `true`. Permanent failures (bad configuration,
/// corrupt archives, service faults, 4xx responses) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.is_body()
                    || e.status().is_some_and(|s| {
                        s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS
                    })
            }
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            // Transport and protocol hiccups on the metadata service
            Error::Service { .. } => true,
            // Remote job still running
            Error::NotReady { .. } => true,
            Error::ServiceFault(_) => false,
            Error::Config { .. } => false,
            // Already wrapped by an inner retry loop
            Error::Download { .. } | Error::RetryExhausted { .. } => false,
            Error::Archive(_) => false,
            Error::PartialBatch { .. } => false,
            Error::FormatUnavailable { .. } => false,
            Error::CatalogNotFound { .. } => false,
            Error::Csv(_) => false,
            Error::Serialization(_) => false,
            Error::Other(_) => false,
        }
    }
}

/// Attempt bookkeeping for one invocation of [`with_retry`]
#[derive(Debug)]
struct RetryContext<'a> {
    policy: &'a RetryConfig,
    attempt: u32,
}

impl<'a> RetryContext<'a> {
    fn new(policy: &'a RetryConfig) -> Self {
        Self { policy, attempt: 0 }
    }

    fn can_retry(&self) -> bool {
        self.attempt < self.policy.retries
    }

    /// Record a failed attempt and return how long to wait before the next one
    fn next_delay(&mut self) -> Duration {
        let delay = backoff_delay(self.policy, self.attempt);
        self.attempt += 1;
        delay
    }

    fn invocations(&self) -> u32 {
        self.attempt + 1
    }
}

/// Delay before retry number `retry_index` (zero-based)
///
/// `min_timeout * factor^retry_index`, optionally randomized, capped at
/// `max_timeout`.
pub fn backoff_delay(policy: &RetryConfig, retry_index: u32) -> Duration {
    let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
    let mut nanos = policy.min_timeout.as_nanos() as f64 * policy.factor.powi(exponent);
    if policy.randomize {
        nanos *= rand::thread_rng().gen_range(1.0..=2.0);
    }
    if !nanos.is_finite() || nanos >= policy.max_timeout.as_nanos() as f64 {
        return policy.max_timeout;
    }
    Duration::from_nanos(nanos.round() as u64)
}

/// Execute an async operation with exponential backoff retry logic
///
/// The operation is invoked at most `policy.retries + 1` times. Retryable
/// failures are absorbed until the policy is exhausted, at which point the
/// last failure is returned wrapped in [`Error::RetryExhausted`].
/// Non-retryable failures are returned unchanged on the spot.
///
/// # Arguments
///
/// * `policy` - Backoff parameters
/// * `operation` - Name used in logs and in the exhausted error
/// * `op` - Closure producing a fresh attempt each time it is called
pub async fn with_retry<F, Fut, T>(policy: &RetryConfig, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut ctx = RetryContext::new(policy);

    loop {
        match op().await {
            Ok(value) => {
                if ctx.attempt > 0 {
                    tracing::info!(
                        operation,
                        attempts = ctx.invocations(),
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && ctx.can_retry() => {
                let delay = ctx.next_delay();

                tracing::warn!(
                    operation,
                    error = %e,
                    attempt = ctx.attempt,
                    retries = policy.retries,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
            Err(e) if e.is_retryable() => {
                tracing::error!(
                    operation,
                    error = %e,
                    attempts = ctx.invocations(),
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(Error::RetryExhausted {
                    operation: operation.to_string(),
                    attempts: ctx.invocations(),
                    source: Box::new(e),
                });
            }
            Err(e) => {
                tracing::error!(
                    operation,
                    error = %e,
                    "Operation failed with non-retryable error"
                );
                return Err(e);
            }
        }
    }
}
