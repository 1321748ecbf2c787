//! Endpoint, probe outcome and scan summary data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One monitored (service, environment) pair
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub service_id: String,
    pub service_name: String,
    pub env_name: String,
    pub url: String,
}

impl Endpoint {
    pub fn new(service_id: &str, service_name: &str, env_name: &str, url: &str) -> Self {
        Self {
            service_id: service_id.to_string(),
            service_name: service_name.to_string(),
            env_name: env_name.to_string(),
            url: url.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeStatus {
    Up,
    Down,
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Up => write!(f, "UP"),
            ProbeStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// Result of a single probe. `status_code` is 0 when no HTTP response arrived.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    pub status: ProbeStatus,
    pub status_code: u16,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ProbeOutcome {
    pub fn new(endpoint: Endpoint, status: ProbeStatus, status_code: u16, duration_ms: u64) -> Self {
        Self {
            endpoint,
            status,
            status_code,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    /// Outcome for a probe that produced no HTTP response at all
    pub fn unreachable(endpoint: Endpoint, duration_ms: u64) -> Self {
        Self::new(endpoint, ProbeStatus::Down, 0, duration_ms)
    }

    pub fn is_up(&self) -> bool {
        self.status == ProbeStatus::Up
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownEndpoint {
    pub service: String,
    pub env: String,
    pub status_code: u16,
}

impl From<&ProbeOutcome> for DownEndpoint {
    fn from(outcome: &ProbeOutcome) -> Self {
        Self {
            service: outcome.endpoint.service_name.clone(),
            env: outcome.endpoint.env_name.clone(),
            status_code: outcome.status_code,
        }
    }
}

/// Aggregate of a single scan, independent of alert suppression
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub summary: String,
    pub total: usize,
    pub up: usize,
    pub down: usize,
    pub down_services: Vec<DownEndpoint>,
    pub timestamp: DateTime<Utc>,
}

impl ScanSummary {
    pub fn from_outcomes(outcomes: &[ProbeOutcome], timestamp: DateTime<Utc>) -> Self {
        let down_services: Vec<DownEndpoint> = outcomes
            .iter()
            .filter(|o| !o.is_up())
            .map(DownEndpoint::from)
            .collect();

        Self {
            summary: format!("Checked {} endpoints", outcomes.len()),
            total: outcomes.len(),
            up: outcomes.len() - down_services.len(),
            down: down_services.len(),
            down_services,
            timestamp,
        }
    }
}

/// What the trigger operation hands back to its caller
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ScanResult {
    Completed(ScanSummary),
    Skipped { reason: String },
}

impl ScanResult {
    pub fn is_skipped(&self) -> bool {
        matches!(self, ScanResult::Skipped { .. })
    }

    pub fn summary(&self) -> Option<&ScanSummary> {
        match self {
            ScanResult::Completed(summary) => Some(summary),
            ScanResult::Skipped { .. } => None,
        }
    }
}
