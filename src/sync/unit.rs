//! Unit execution policy
//!
//! The blocking part of a unit (version control reads and the generator
//! call) runs under the unit deadline and is retried while the failure is
//! transient. Writes happen afterwards, outside the retry loop.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use serde::Serialize;
use tracing::warn;

use crate::ai::{TimeoutConfig, with_timeout};
use crate::config::Config;
use crate::types::{Result, SyncError};

/// Final state of one unit within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum UnitOutcome {
    Succeeded,
    /// Nothing to do: already synced or no input available yet
    Skipped,
    /// Transient failure; nothing was written and the next run picks it up
    Requeued(String),
    Failed(String),
}

impl UnitOutcome {
    pub fn from_error(err: &SyncError) -> Self {
        if err.is_transient() {
            Self::Requeued(err.to_string())
        } else {
            Self::Failed(err.to_string())
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Requeued(_) | Self::Failed(_))
    }
}

impl fmt::Display for UnitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Skipped => write!(f, "skipped"),
            Self::Requeued(reason) => write!(f, "requeued: {}", reason),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnitRunner {
    retries: usize,
    backoff: Duration,
    deadline: Duration,
}

impl UnitRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            retries: config.sync.retry_count as usize,
            backoff: Duration::from_secs(config.sync.rate_limit_backoff_secs),
            deadline: TimeoutConfig::from_config(config).unit,
        }
    }

    /// Run the blocking step of `label`, retrying transient failures.
    ///
    /// Each attempt is bounded by the unit deadline; an expired attempt is
    /// a transient `Timeout`.
    pub async fn attempt<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let deadline = self.deadline;
        let backoff = ConstantBuilder::default()
            .with_delay(self.backoff)
            .with_max_times(self.retries);

        (|| with_timeout(deadline, operation(), label))
            .retry(backoff)
            .when(|e: &SyncError| e.is_transient())
            .adjust(|e: &SyncError, delay: Option<Duration>| {
                // a provider's Retry-After wins over the configured delay when longer
                delay.map(|d| e.retry_hint().map_or(d, |hint| hint.max(d)))
            })
            .notify(|e: &SyncError, delay: Duration| {
                warn!(unit = label, error = %e, delay_secs = delay.as_secs(), "Transient failure, retrying");
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LlmError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn runner(retry_count: u32, unit_timeout_secs: u64) -> UnitRunner {
        let mut config = Config::default();
        config.sync.retry_count = retry_count;
        config.sync.rate_limit_backoff_secs = 0;
        config.sync.unit_timeout_secs = unit_timeout_secs;
        UnitRunner::new(&config)
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let calls = AtomicUsize::new(0);
        let result = runner(2, 5)
            .attempt("a.rs", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SyncError::from(LlmError::rate_limited("429")))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_requeue() {
        let calls = AtomicUsize::new(0);
        let err = runner(1, 5)
            .attempt("a.rs", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(SyncError::from(LlmError::rate_limited("429")))
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(UnitOutcome::from_error(&err), UnitOutcome::Requeued(_)));
    }

    #[tokio::test]
    async fn test_permanent_failures_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let err = runner(3, 5)
            .attempt("a.rs", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(SyncError::invalid_response("a.rs", "placeholder"))
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(UnitOutcome::from_error(&err), UnitOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_transient() {
        let err = runner(0, 1)
            .attempt("slow.rs", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout { .. }));
        assert!(matches!(UnitOutcome::from_error(&err), UnitOutcome::Requeued(_)));
    }
}
