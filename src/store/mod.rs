//! Alert state: DOWN flags with expiry plus the run lock guarding overlapping scans

pub mod memory;
pub mod rest;

use crate::errors::{Result, SentinelError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

pub use memory::InMemoryStore;
pub use rest::RestKvStore;

pub const RUN_LOCK_KEY: &str = "last-health-check-run";
pub const LAST_CHECK_KEY: &str = "last_check";

pub fn down_flag_key(service_name: &str, env_name: &str) -> String {
    format!("alert:down:{}:{}", service_name, env_name)
}

/// Shared key-value state consulted by the reconciler.
///
/// `try_acquire_run_lock` must be an atomic check-and-set at the backend: when the
/// recorded start is missing or older than `window`, record `now` with `ttl` and
/// return `true`, otherwise return `false`.
#[async_trait]
pub trait AlertStateStore: Send + Sync {
    async fn try_acquire_run_lock(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        ttl: Duration,
    ) -> Result<bool>;

    async fn has_down_flag(&self, service_name: &str, env_name: &str) -> Result<bool>;

    async fn set_down_flag(&self, service_name: &str, env_name: &str, ttl: Duration) -> Result<()>;

    async fn clear_down_flag(&self, service_name: &str, env_name: &str) -> Result<()>;

    async fn record_last_scan(&self, timestamp: DateTime<Utc>) -> Result<()>;
}

/// Wraps a store so that every call is time-boxed and no failure escapes.
///
/// Failures read as "flag absent" and "lock free", which means alerts may repeat
/// while the backend is unavailable.
#[derive(Clone)]
pub struct BestEffortStore {
    inner: Arc<dyn AlertStateStore>,
    timeout: Duration,
}

impl BestEffortStore {
    pub fn new(inner: Arc<dyn AlertStateStore>, call_timeout: Duration) -> Self {
        Self {
            inner,
            timeout: call_timeout,
        }
    }

    pub async fn try_acquire_run_lock(&self, now: DateTime<Utc>, window: Duration, ttl: Duration) -> bool {
        self.guard("acquire run lock", self.inner.try_acquire_run_lock(now, window, ttl))
            .await
            .unwrap_or(true)
    }

    pub async fn has_down_flag(&self, service_name: &str, env_name: &str) -> bool {
        self.guard("read down flag", self.inner.has_down_flag(service_name, env_name))
            .await
            .unwrap_or(false)
    }

    pub async fn set_down_flag(&self, service_name: &str, env_name: &str, ttl: Duration) {
        self.guard("set down flag", self.inner.set_down_flag(service_name, env_name, ttl))
            .await;
    }

    pub async fn clear_down_flag(&self, service_name: &str, env_name: &str) {
        self.guard("clear down flag", self.inner.clear_down_flag(service_name, env_name))
            .await;
    }

    pub async fn record_last_scan(&self, timestamp: DateTime<Utc>) {
        self.guard("record last scan", self.inner.record_last_scan(timestamp))
            .await;
    }

    async fn guard<T>(&self, operation: &str, call: impl Future<Output = Result<T>>) -> Option<T> {
        let outcome = timeout(self.timeout, call).await.unwrap_or_else(|_| {
            Err(SentinelError::Timeout(format!(
                "alert store call after {}ms",
                self.timeout.as_millis()
            )))
        });

        match outcome {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Alert store failed to {}: {}", operation, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UnavailableStore;

    #[async_trait]
    impl AlertStateStore for UnavailableStore {
        async fn try_acquire_run_lock(&self, _: DateTime<Utc>, _: Duration, _: Duration) -> Result<bool> {
            Err(SentinelError::Store("connection refused".to_string()))
        }

        async fn has_down_flag(&self, _: &str, _: &str) -> Result<bool> {
            Err(SentinelError::Store("connection refused".to_string()))
        }

        async fn set_down_flag(&self, _: &str, _: &str, _: Duration) -> Result<()> {
            Err(SentinelError::Store("connection refused".to_string()))
        }

        async fn clear_down_flag(&self, _: &str, _: &str) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        }

        async fn record_last_scan(&self, _: DateTime<Utc>) -> Result<()> {
            Err(SentinelError::Store("connection refused".to_string()))
        }
    }

    #[test]
    fn test_down_flag_key_format() {
        assert_eq!(down_flag_key("Data API", "PROD"), "alert:down:Data API:PROD");
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades_to_defaults() {
        let store = BestEffortStore::new(Arc::new(UnavailableStore), Duration::from_millis(50));
        let now = Utc::now();

        assert!(store.try_acquire_run_lock(now, Duration::from_secs(480), Duration::from_secs(600)).await);
        assert!(!store.has_down_flag("svc", "PROD").await);
        store.set_down_flag("svc", "PROD", Duration::from_secs(60)).await;
        store.record_last_scan(now).await;

        let start = std::time::Instant::now();
        store.clear_down_flag("svc", "PROD").await;
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
