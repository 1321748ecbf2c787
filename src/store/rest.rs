//! Redis-over-REST alert store (Upstash / Vercel KV wire format)

use super::{down_flag_key, AlertStateStore, LAST_CHECK_KEY, RUN_LOCK_KEY};
use crate::errors::{Result, SentinelError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Compare-and-set for the run lock, executed server side so that two scanners
/// racing on the same key cannot both win.
const RUN_LOCK_SCRIPT: &str = r#"
local last = tonumber(redis.call('GET', KEYS[1]))
if last and (tonumber(ARGV[1]) - last) < tonumber(ARGV[2]) then
  return 0
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
return 1
"#;

/// Sends commands as JSON arrays to a REST endpoint fronting Redis
#[derive(Debug, Clone)]
pub struct RestKvStore {
    client: Client,
    base_url: String,
    token: String,
}

impl RestKvStore {
    pub fn new(base_url: String, token: String, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(format!("health_sentinel/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SentinelError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Run one command and return its `result` field
    async fn command(&self, args: Value) -> Result<Value> {
        debug!("KV command {}", args[0]);

        let response = self
            .client
            .post(&self.base_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .json(&args)
            .send()
            .await
            .map_err(SentinelError::Http)?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if let Some(error) = body.get("error").and_then(Value::as_str) {
            return Err(SentinelError::Store(format!("{} ({})", error, status)));
        }

        if !status.is_success() {
            return Err(SentinelError::Store(format!(
                "KV endpoint returned status {}",
                status
            )));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| SentinelError::Store("KV response had no result field".to_string()))
    }
}

#[async_trait]
impl AlertStateStore for RestKvStore {
    async fn try_acquire_run_lock(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        ttl: Duration,
    ) -> Result<bool> {
        let result = self
            .command(json!([
                "EVAL",
                RUN_LOCK_SCRIPT,
                "1",
                RUN_LOCK_KEY,
                now.timestamp_millis().to_string(),
                window.as_millis().to_string(),
                ttl.as_secs().to_string(),
            ]))
            .await?;

        Ok(result.as_i64() == Some(1))
    }

    async fn has_down_flag(&self, service_name: &str, env_name: &str) -> Result<bool> {
        let result = self
            .command(json!(["GET", down_flag_key(service_name, env_name)]))
            .await?;

        Ok(result.as_str() == Some("true"))
    }

    async fn set_down_flag(&self, service_name: &str, env_name: &str, ttl: Duration) -> Result<()> {
        self.command(json!([
            "SET",
            down_flag_key(service_name, env_name),
            "true",
            "EX",
            ttl.as_secs().to_string(),
        ]))
        .await?;
        Ok(())
    }

    async fn clear_down_flag(&self, service_name: &str, env_name: &str) -> Result<()> {
        self.command(json!(["DEL", down_flag_key(service_name, env_name)]))
            .await?;
        Ok(())
    }

    async fn record_last_scan(&self, timestamp: DateTime<Utc>) -> Result<()> {
        self.command(json!(["SET", LAST_CHECK_KEY, timestamp.to_rfc3339()]))
            .await?;
        Ok(())
    }
}
