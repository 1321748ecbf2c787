//! Microsoft Teams incoming-webhook channel

use super::{describe_status_code, FailingEnv, Notifier, RecoveredEnv};
use crate::errors::{Result, SentinelError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const DOWN_THEME: &str = "d70000";
const RECOVERY_THEME: &str = "2eb886";

/// Posts legacy MessageCard payloads to a Teams webhook
#[derive(Debug, Clone)]
pub struct TeamsNotifier {
    client: Client,
    webhook_url: String,
}

impl TeamsNotifier {
    pub fn new(webhook_url: String, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(SentinelError::Http)?;

        Ok(Self { client, webhook_url })
    }

    async fn post_card(&self, service_name: &str, card: &Value) -> Result<()> {
        debug!("Posting Teams card for {}", service_name);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(card)
            .send()
            .await
            .map_err(SentinelError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SentinelError::Notifier(format!(
                "Teams webhook responded with status {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

pub(crate) fn down_card(service_name: &str, failing: &[FailingEnv]) -> Value {
    let env_names: Vec<&str> = failing.iter().map(|e| e.env_name.as_str()).collect();

    let mut facts: Vec<Value> = failing
        .iter()
        .map(|env| {
            json!({
                "name": format!("Environment: {}", env.env_name),
                "value": format!("Status: {}", describe_status_code(env.status_code)),
            })
        })
        .collect();
    facts.push(json!({ "name": "Time", "value": Utc::now().to_rfc2822() }));

    let subtitle = match failing {
        [single] => format!("Environment: **{}**", single.env_name),
        _ => format!("Failing in **{} environments**", failing.len()),
    };

    json!({
        "@type": "MessageCard",
        "@context": "http://schema.org/extensions",
        "themeColor": DOWN_THEME,
        "summary": format!("{} is DOWN in {}", service_name, env_names.join(", ")),
        "sections": [{
            "activityTitle": format!("🚨 Service Down: **{}**", service_name),
            "activitySubtitle": subtitle,
            "facts": facts,
            "markdown": true,
        }],
        "potentialAction": failing
            .iter()
            .map(|env| open_uri_action(&env.env_name, &env.url))
            .collect::<Vec<_>>(),
    })
}

pub(crate) fn recovery_card(service_name: &str, recovered: &[RecoveredEnv]) -> Value {
    let env_names: Vec<&str> = recovered.iter().map(|e| e.env_name.as_str()).collect();

    let mut facts: Vec<Value> = recovered
        .iter()
        .map(|env| {
            json!({
                "name": format!("Environment: {}", env.env_name),
                "value": "Status: UP",
            })
        })
        .collect();
    facts.push(json!({ "name": "Time", "value": Utc::now().to_rfc2822() }));

    json!({
        "@type": "MessageCard",
        "@context": "http://schema.org/extensions",
        "themeColor": RECOVERY_THEME,
        "summary": format!("{} recovered in {}", service_name, env_names.join(", ")),
        "sections": [{
            "activityTitle": format!("✅ Service Recovered: **{}**", service_name),
            "activitySubtitle": format!("Back up in **{}**", env_names.join(", ")),
            "facts": facts,
            "markdown": true,
        }],
        "potentialAction": recovered
            .iter()
            .map(|env| open_uri_action(&env.env_name, &env.url))
            .collect::<Vec<_>>(),
    })
}

fn open_uri_action(env_name: &str, url: &str) -> Value {
    json!({
        "@type": "OpenUri",
        "name": format!("Check {} Health", env_name),
        "targets": [{ "os": "default", "uri": url }],
    })
}

#[async_trait]
impl Notifier for TeamsNotifier {
    async fn send_down_alert(&self, service_name: &str, failing: &[FailingEnv]) -> Result<()> {
        self.post_card(service_name, &down_card(service_name, failing)).await?;
        info!("Teams DOWN alert sent for {} ({} envs)", service_name, failing.len());
        Ok(())
    }

    async fn send_recovery_alert(&self, service_name: &str, recovered: &[RecoveredEnv]) -> Result<()> {
        self.post_card(service_name, &recovery_card(service_name, recovered)).await?;
        info!("Teams RECOVERY alert sent for {} ({} envs)", service_name, recovered.len());
        Ok(())
    }
}
