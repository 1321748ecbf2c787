//! Fleet Health Sentinel Library
//!
//! This library probes a fleet of HTTP health endpoints, classifies each as UP or DOWN,
//! and emits deduplicated DOWN and RECOVERY alerts backed by a shared key-value store.

pub mod classifier;
pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod monitor;
pub mod notifier;
pub mod prober;
pub mod reconciler;
pub mod scanner;
pub mod store;

pub use config::{load_endpoints, Config};
pub use errors::{Result, SentinelError};
pub use models::{Endpoint, ProbeOutcome, ProbeStatus, ScanResult, ScanSummary};
pub use monitor::HealthMonitor;
