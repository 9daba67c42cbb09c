use std::future::Future;
use std::time::Duration;

use log::warn;
use rand::Rng;
use sea_orm::sqlx::Error as SqlxError;
use sea_orm::{DbErr, RuntimeErr};
use tokio::time::sleep;

use crate::{RetryConfig, RetryStrategy};
use docflow_core::DocflowError;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_DELAY_MS: u64 = 3_000;
const DEFAULT_MAX_DELAY_MS: u64 = 60_000;
const DEFAULT_JITTER_MS: u64 = 250;
const MAX_BACKOFF_SHIFT: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 0 means unbounded.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
    pub strategy: RetryStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(None)
    }
}

impl RetryPolicy {
    pub fn from_config(config: Option<&RetryConfig>) -> Self {
        let config = config.cloned().unwrap_or_default();
        Self {
            max_attempts: config.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            base_delay: Duration::from_millis(config.base_delay_ms.unwrap_or(DEFAULT_BASE_DELAY_MS)),
            max_delay: Duration::from_millis(config.max_delay_ms.unwrap_or(DEFAULT_MAX_DELAY_MS)),
            jitter: Duration::from_millis(config.jitter_ms.unwrap_or(DEFAULT_JITTER_MS)),
            strategy: config.strategy.unwrap_or(RetryStrategy::Exponential),
        }
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt < self.max_attempts
    }

    /// Delay before the attempt following `attempt`, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        match self.strategy {
            RetryStrategy::Fixed => self.base_delay,
            RetryStrategy::Exponential => {
                let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
                self.base_delay
                    .saturating_mul(1_u32 << shift)
                    .min(self.max_delay)
            }
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.backoff(attempt) + Duration::from_millis(jitter)
    }
}

/// Connection-level failures that a fresh attempt can recover from. A
/// pooled connection dropped mid-statement surfaces through `Exec`/`Query`.
pub fn is_transient(err: &DbErr) -> bool {
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => true,
        DbErr::Exec(RuntimeErr::SqlxError(source)) | DbErr::Query(RuntimeErr::SqlxError(source)) => {
            matches!(
                source.as_ref(),
                SqlxError::Io(_)
                    | SqlxError::PoolTimedOut
                    | SqlxError::PoolClosed
                    | SqlxError::Protocol(_)
                    | SqlxError::WorkerCrashed
            )
        }
        _ => false,
    }
}

#[derive(Debug)]
pub enum RetryError {
    /// Every allowed attempt hit a transient failure.
    Exhausted {
        operation: String,
        attempts: u32,
        source: DbErr,
    },
    /// A failure that retrying cannot fix.
    Failed(DbErr),
}

impl From<RetryError> for DocflowError {
    fn from(value: RetryError) -> Self {
        match value {
            RetryError::Exhausted {
                operation,
                attempts,
                source,
            } => DocflowError::unavailable(format!(
                "{operation} gave up after {attempts} attempts: {source}"
            )),
            RetryError::Failed(source) => DocflowError::from(source),
        }
    }
}

/// Run `attempt` until it succeeds, fails non-transiently, or the policy
/// runs out of attempts.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let mut attempts = 0u32;
    loop {
        attempts = attempts.saturating_add(1);
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) => {
                if !policy.allows_retry(attempts) {
                    return Err(RetryError::Exhausted {
                        operation: operation.to_string(),
                        attempts,
                        source: err,
                    });
                }
                let delay = policy.delay(attempts);
                warn!("{operation}: transient failure on attempt {attempts}: {err}; retrying in {delay:?}");
                sleep(delay).await;
            }
            Err(err) => return Err(RetryError::Failed(err)),
        }
    }
}
