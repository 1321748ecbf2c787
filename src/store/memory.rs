//! Process-local alert state with TTL expiry

use super::{down_flag_key, AlertStateStore, LAST_CHECK_KEY, RUN_LOCK_KEY};
use crate::clock::Clock;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory stand-in for the shared KV store. Only dedupes within one process.
#[derive(Debug)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, StoredValue>>,
    clock: Clock,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Clock::system())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Current value of a key, ignoring expired entries
    pub async fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at.is_none_or(|at| at > now))
            .map(|entry| entry.value.clone())
    }

    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|entry| entry.expires_at.is_none_or(|at| at > now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        let expires_at = ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok().map(|ttl| self.clock.now() + ttl));
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), StoredValue { value, expires_at });
    }
}

#[async_trait]
impl AlertStateStore for InMemoryStore {
    async fn try_acquire_run_lock(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        ttl: Duration,
    ) -> Result<bool> {
        let mut entries = self.entries.write().await;

        let last_start = entries
            .get(RUN_LOCK_KEY)
            .filter(|entry| entry.expires_at.is_none_or(|at| at > now))
            .and_then(|entry| entry.value.parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis);

        if let Some(last_start) = last_start {
            let since = now.signed_duration_since(last_start);
            if since.to_std().is_ok_and(|since| since < window) || since < chrono::Duration::zero() {
                debug!("Run lock held since {}", last_start);
                return Ok(false);
            }
        }

        let expires_at = chrono::Duration::from_std(ttl).ok().map(|ttl| now + ttl);
        entries.insert(
            RUN_LOCK_KEY.to_string(),
            StoredValue {
                value: now.timestamp_millis().to_string(),
                expires_at,
            },
        );

        Ok(true)
    }

    async fn has_down_flag(&self, service_name: &str, env_name: &str) -> Result<bool> {
        Ok(self.get(&down_flag_key(service_name, env_name)).await.as_deref() == Some("true"))
    }

    async fn set_down_flag(&self, service_name: &str, env_name: &str, ttl: Duration) -> Result<()> {
        self.set(&down_flag_key(service_name, env_name), "true".to_string(), Some(ttl))
            .await;
        Ok(())
    }

    async fn clear_down_flag(&self, service_name: &str, env_name: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(&down_flag_key(service_name, env_name));
        Ok(())
    }

    async fn record_last_scan(&self, timestamp: DateTime<Utc>) -> Result<()> {
        self.set(LAST_CHECK_KEY, timestamp.to_rfc3339(), None).await;
        Ok(())
    }
}
