//! Timeout helpers
//!
//! Wraps the blocking calls of a sync unit (version control, generator)
//! in a wall-clock deadline.
//!
//! ```ignore
//! let timeouts = TimeoutConfig::from_config(&config);
//! let tiers = with_timeout(timeouts.unit, generator.generate_tiers(req), "generate").await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::types::{Result, SyncError};

/// Timeouts applied to each kind of blocking operation
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// One version-control subprocess
    pub vcs: Duration,
    /// Whole-unit deadline covering its vcs and generator calls
    pub unit: Duration,
}

impl TimeoutConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            vcs: Duration::from_secs(config.sync.vcs_timeout_secs),
            unit: Duration::from_secs(config.sync.unit_timeout_secs),
        }
    }
}

/// Execute an async operation with a timeout
///
/// Returns `SyncError::Timeout` if the operation doesn't complete within `timeout`.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.sync.unit_timeout_secs = 42;
        config.sync.vcs_timeout_secs = 7;
        let timeouts = TimeoutConfig::from_config(&config);
        assert_eq!(timeouts.unit, Duration::from_secs(42));
        assert_eq!(timeouts.vcs, Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, SyncError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, SyncError>(42)
            },
            "slow operation",
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, SyncError::Timeout { .. }));
        assert!(err.is_transient());
    }
}
