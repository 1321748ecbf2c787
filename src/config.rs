//! Configuration management for the health sentinel

use crate::errors::{Result, SentinelError};
use crate::models::Endpoint;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the JSON service list
    pub services_file: String,

    /// Hard timeout for a single probe
    pub probe_timeout: Duration,

    /// Upper bound on in-flight probes, 0 for unbounded
    pub max_concurrent_probes: usize,

    /// Interval between cycles in watch mode
    pub scan_interval: Duration,

    /// A scan starting within this window of the previous one is skipped
    pub run_lock_window: Duration,

    /// Expiry of the run-lock key
    pub run_lock_ttl: Duration,

    /// How long a DOWN alert suppresses repeats for the same endpoint
    pub down_flag_ttl: Duration,

    /// Per-call budget for alert store commands
    pub store_timeout: Duration,

    /// Per-call budget for notifier deliveries
    pub notifier_timeout: Duration,

    /// REST endpoint of the shared KV store
    pub kv_url: Option<String>,

    /// Bearer token for the KV store
    pub kv_token: Option<String>,

    /// Teams incoming webhook
    pub teams_webhook_url: Option<String>,

    /// Body classifier to layer on top of the status code
    pub body_classifier: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            services_file: "services.json".to_string(),
            probe_timeout: Duration::from_secs(8),
            max_concurrent_probes: 0,
            scan_interval: Duration::from_secs(600),
            run_lock_window: Duration::from_secs(8 * 60),
            run_lock_ttl: Duration::from_secs(10 * 60),
            down_flag_ttl: Duration::from_secs(24 * 60 * 60),
            store_timeout: Duration::from_millis(2000),
            notifier_timeout: Duration::from_secs(10),
            kv_url: None,
            kv_token: None,
            teams_webhook_url: None,
            body_classifier: "auto".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(services_file) = env::var("SERVICES_FILE") {
            config.services_file = services_file;
        }

        if let Some(seconds) = parse_var::<u64>("PROBE_TIMEOUT_SECONDS") {
            config.probe_timeout = Duration::from_secs(seconds);
        }

        if let Some(limit) = parse_var("MAX_CONCURRENT_PROBES") {
            config.max_concurrent_probes = limit;
        }

        if let Some(seconds) = parse_var::<u64>("SCAN_INTERVAL_SECONDS") {
            config.scan_interval = Duration::from_secs(seconds);
        }

        if let Some(seconds) = parse_var::<u64>("RUN_LOCK_WINDOW_SECONDS") {
            config.run_lock_window = Duration::from_secs(seconds);
        }

        if let Some(seconds) = parse_var::<u64>("RUN_LOCK_TTL_SECONDS") {
            config.run_lock_ttl = Duration::from_secs(seconds);
        }

        if let Some(seconds) = parse_var::<u64>("DOWN_FLAG_TTL_SECONDS") {
            config.down_flag_ttl = Duration::from_secs(seconds);
        }

        if let Some(ms) = parse_var::<u64>("STORE_TIMEOUT_MS") {
            config.store_timeout = Duration::from_millis(ms);
        }

        if let Some(seconds) = parse_var::<u64>("NOTIFIER_TIMEOUT_SECONDS") {
            config.notifier_timeout = Duration::from_secs(seconds);
        }

        config.kv_url = non_empty_var("KV_REST_API_URL");
        config.kv_token = non_empty_var("KV_REST_API_TOKEN");
        config.teams_webhook_url = non_empty_var("TEAMS_WEBHOOK_URL");

        if let Ok(classifier) = env::var("BODY_CLASSIFIER") {
            config.body_classifier = classifier;
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.services_file.is_empty() {
            return Err("services_file cannot be empty".to_string());
        }

        if self.probe_timeout.is_zero() {
            return Err("probe_timeout must be greater than 0".to_string());
        }

        if self.scan_interval < self.run_lock_window {
            return Err("scan_interval must not be shorter than run_lock_window".to_string());
        }

        if self.run_lock_ttl < self.run_lock_window {
            return Err("run_lock_ttl must not be shorter than run_lock_window".to_string());
        }

        if self.down_flag_ttl.as_secs() == 0 {
            return Err("down_flag_ttl must be at least one second".to_string());
        }

        if self.store_timeout.is_zero() || self.notifier_timeout.is_zero() {
            return Err("store and notifier timeouts must be greater than 0".to_string());
        }

        if self.kv_url.is_some() != self.kv_token.is_some() {
            return Err("KV_REST_API_URL and KV_REST_API_TOKEN must be set together".to_string());
        }

        Ok(())
    }

    pub fn has_kv(&self) -> bool {
        self.kv_url.is_some() && self.kv_token.is_some()
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse().ok())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceEnv {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub id: String,
    pub name: String,
    pub environments: Vec<ServiceEnv>,
}

/// Flatten the service list into endpoints, in file order
pub fn endpoints_from(services: &[ServiceConfig]) -> Result<Vec<Endpoint>> {
    let mut seen = HashSet::new();
    let mut endpoints = Vec::new();

    for service in services {
        for env in &service.environments {
            if env.url.trim().is_empty() {
                return Err(SentinelError::Config(format!(
                    "{} ({}) has an empty url",
                    service.name, env.name
                )));
            }

            if !seen.insert((service.name.as_str(), env.name.as_str())) {
                return Err(SentinelError::Config(format!(
                    "{} ({}) is listed more than once",
                    service.name, env.name
                )));
            }

            endpoints.push(Endpoint::new(&service.id, &service.name, &env.name, &env.url));
        }
    }

    Ok(endpoints)
}

/// Read the JSON service list and flatten it into endpoints
pub fn load_endpoints(path: impl AsRef<Path>) -> Result<Vec<Endpoint>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        SentinelError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    let services: Vec<ServiceConfig> = serde_json::from_str(&raw)?;
    endpoints_from(&services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.probe_timeout, Duration::from_secs(8));
        assert_eq!(config.down_flag_ttl.as_secs(), 86400);
        assert!(!config.has_kv());
    }

    #[test]
    fn test_validation_rejects_half_configured_kv() {
        let config = Config {
            kv_url: Some("https://kv.example".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_interval_inside_lock_window() {
        let config = Config {
            scan_interval: Duration::from_secs(300),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_short_lock_ttl() {
        let config = Config {
            run_lock_ttl: Duration::from_secs(60),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_endpoints_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": "crop-service", "name": "Crop Service", "environments": [
                    {{"name": "Dev1", "url": "https://crop-dev1.example/health"}},
                    {{"name": "PROD", "url": "https://crop.example/health"}}
                ]}},
                {{"id": "data-api", "name": "Data API", "environments": [
                    {{"name": "QA1", "url": "https://data-qa1.example/health"}}
                ]}}
            ]"#
        )
        .unwrap();

        let endpoints = load_endpoints(file.path()).unwrap();

        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0].service_id, "crop-service");
        assert_eq!(endpoints[1].env_name, "PROD");
        assert_eq!(endpoints[2].service_name, "Data API");
    }

    #[test]
    fn test_duplicate_environment_is_rejected() {
        let services = vec![ServiceConfig {
            id: "data-api".to_string(),
            name: "Data API".to_string(),
            environments: vec![
                ServiceEnv {
                    name: "QA1".to_string(),
                    url: "https://a.example".to_string(),
                },
                ServiceEnv {
                    name: "QA1".to_string(),
                    url: "https://b.example".to_string(),
                },
            ],
        }];

        assert!(matches!(endpoints_from(&services), Err(SentinelError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let err = load_endpoints("/nonexistent/services.json").unwrap_err();
        assert!(matches!(err, SentinelError::Config(_)));
    }
}
