//! Alert delivery contracts and the built-in channels

pub mod teams;

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use teams::TeamsNotifier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailingEnv {
    pub env_name: String,
    pub url: String,
    pub status_code: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveredEnv {
    pub env_name: String,
    pub url: String,
}

/// A channel that receives grouped alerts, one call per service
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_down_alert(&self, service_name: &str, failing: &[FailingEnv]) -> Result<()>;

    async fn send_recovery_alert(&self, service_name: &str, recovered: &[RecoveredEnv]) -> Result<()>;
}

/// Writes alerts to the log only. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_down_alert(&self, service_name: &str, failing: &[FailingEnv]) -> Result<()> {
        for env in failing {
            warn!(
                service = service_name,
                env = %env.env_name,
                status_code = env.status_code,
                "Service DOWN: {} ({}) {}",
                service_name,
                env.env_name,
                env.url
            );
        }
        Ok(())
    }

    async fn send_recovery_alert(&self, service_name: &str, recovered: &[RecoveredEnv]) -> Result<()> {
        for env in recovered {
            info!(
                service = service_name,
                env = %env.env_name,
                "Service RECOVERED: {} ({}) {}",
                service_name,
                env.env_name,
                env.url
            );
        }
        Ok(())
    }
}

/// Human-readable status code, 0 meaning no response
pub fn describe_status_code(status_code: u16) -> String {
    if status_code == 0 {
        "Timeout".to_string()
    } else {
        status_code.to_string()
    }
}
