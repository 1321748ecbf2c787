//! Scan-and-reconcile cycle and the watch loop driving it

use crate::classifier::ClassifierFactory;
use crate::clock::Clock;
use crate::config::Config;
use crate::errors::{Result, SentinelError};
use crate::models::{Endpoint, ScanResult};
use crate::notifier::{LogNotifier, Notifier, TeamsNotifier};
use crate::prober::EndpointProber;
use crate::reconciler::AlertReconciler;
use crate::scanner::FleetScanner;
use crate::store::{AlertStateStore, BestEffortStore, InMemoryStore, RestKvStore};

use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Owns the fleet and everything needed to run one health-check cycle
pub struct HealthMonitor {
    config: Config,
    endpoints: Vec<Endpoint>,
    scanner: FleetScanner,
    store: BestEffortStore,
    reconciler: AlertReconciler,
    clock: Clock,
}

impl HealthMonitor {
    /// Wire up the production components described by `config`
    pub fn new(config: Config, endpoints: Vec<Endpoint>) -> Result<Self> {
        config.validate().map_err(SentinelError::Config)?;

        let prober = EndpointProber::new(
            config.probe_timeout,
            ClassifierFactory::create_classifier(&config.body_classifier),
        )?;
        let scanner = FleetScanner::new(Arc::new(prober), config.max_concurrent_probes);

        let store: Arc<dyn AlertStateStore> = match (&config.kv_url, &config.kv_token) {
            (Some(url), Some(token)) => Arc::new(RestKvStore::new(
                url.clone(),
                token.clone(),
                config.store_timeout,
            )?),
            _ => {
                warn!("KV not configured, alert suppression is local to this process");
                Arc::new(InMemoryStore::new())
            }
        };

        let notifier: Arc<dyn Notifier> = match &config.teams_webhook_url {
            Some(url) => Arc::new(TeamsNotifier::new(url.clone(), config.notifier_timeout)?),
            None => {
                warn!("TEAMS_WEBHOOK_URL is not set, alerts will only be logged");
                Arc::new(LogNotifier)
            }
        };

        Ok(Self::with_components(
            config,
            endpoints,
            scanner,
            store,
            notifier,
            Clock::system(),
        ))
    }

    /// Assemble a monitor from explicit parts
    pub fn with_components(
        config: Config,
        endpoints: Vec<Endpoint>,
        scanner: FleetScanner,
        store: Arc<dyn AlertStateStore>,
        notifier: Arc<dyn Notifier>,
        clock: Clock,
    ) -> Self {
        let store = BestEffortStore::new(store, config.store_timeout);
        let reconciler = AlertReconciler::new(
            store.clone(),
            notifier,
            config.down_flag_ttl,
            config.notifier_timeout,
        );

        Self {
            config,
            endpoints,
            scanner,
            store,
            reconciler,
            clock,
        }
    }

    /// Run one cycle: take the run lock, probe the fleet, reconcile alerts.
    ///
    /// Returns `Skipped` when another cycle started within the lock window.
    #[instrument(skip(self), fields(cycle_id = %Uuid::new_v4()))]
    pub async fn run_cycle(&self) -> ScanResult {
        let started = self.clock.now();

        if !self
            .store
            .try_acquire_run_lock(started, self.config.run_lock_window, self.config.run_lock_ttl)
            .await
        {
            info!(
                "Skipping health check, previous run started less than {}s ago",
                self.config.run_lock_window.as_secs()
            );
            return ScanResult::Skipped {
                reason: "a health check ran recently".to_string(),
            };
        }

        info!("Starting health check of {} endpoints", self.endpoints.len());

        let outcomes = self.scanner.scan_all(&self.endpoints).await;
        let summary = self.reconciler.reconcile(&outcomes).await;

        self.store.record_last_scan(self.clock.now()).await;

        info!(
            "Health check complete: {} up, {} down of {}",
            summary.up, summary.down, summary.total
        );

        ScanResult::Completed(summary)
    }

    /// Run a cycle on every tick until Ctrl-C
    pub async fn watch(&self) -> Result<()> {
        info!(
            "Watching {} endpoints every {}s",
            self.endpoints.len(),
            self.config.scan_interval.as_secs()
        );

        let mut ticker = interval(self.config.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let ScanResult::Completed(summary) = self.run_cycle().await {
                        if summary.down > 0 {
                            warn!("{} endpoint(s) currently down", summary.down);
                        }
                    }
                }
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        error!("Failed to wait for shutdown signal: {}", e);
                        return Err(SentinelError::Io(e));
                    }
                    info!("Shutting down health monitor");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProbeOutcome, ProbeStatus};
    use crate::reconciler::tests::{RecordingNotifier, Sent};
    use crate::scanner::Probe;
    use crate::store::LAST_CHECK_KEY;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Reports DOWN for every env listed in `down`
    #[derive(Default)]
    struct ScriptedProbe {
        down: Mutex<HashSet<String>>,
    }

    impl ScriptedProbe {
        fn set_down(&self, envs: &[&str]) {
            *self.down.lock().unwrap() = envs.iter().map(|e| e.to_string()).collect();
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome {
            if self.down.lock().unwrap().contains(&endpoint.env_name) {
                ProbeOutcome::new(endpoint.clone(), ProbeStatus::Down, 503, 3)
            } else {
                ProbeOutcome::new(endpoint.clone(), ProbeStatus::Up, 200, 3)
            }
        }
    }

    struct Harness {
        monitor: HealthMonitor,
        probe: Arc<ScriptedProbe>,
        store: Arc<InMemoryStore>,
        notifier: Arc<RecordingNotifier>,
        clock: Clock,
    }

    fn harness(start: DateTime<Utc>) -> Harness {
        let clock = Clock::manual(start);
        let probe = Arc::new(ScriptedProbe::default());
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let notifier = Arc::new(RecordingNotifier::default());
        let endpoints = vec![
            Endpoint::new("data-api", "Data API", "QA1", "https://qa1.example/health"),
            Endpoint::new("data-api", "Data API", "PROD", "https://prod.example/health"),
        ];

        let monitor = HealthMonitor::with_components(
            Config::default(),
            endpoints,
            FleetScanner::new(probe.clone(), 0),
            store.clone(),
            notifier.clone(),
            clock.clone(),
        );

        Harness {
            monitor,
            probe,
            store,
            notifier,
            clock,
        }
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_skipped() {
        let h = harness(Utc::now());
        h.probe.set_down(&["QA1"]);

        let first = h.monitor.run_cycle().await;
        assert_eq!(first.summary().map(|s| s.down), Some(1));
        assert_eq!(h.notifier.calls().len(), 1);

        // Flag expiry must not be what keeps the second trigger quiet
        h.store.clear_down_flag("Data API", "QA1").await.unwrap();
        h.clock.advance(chrono::Duration::minutes(2));
        let second = h.monitor.run_cycle().await;
        assert!(second.is_skipped());
        assert_eq!(h.notifier.calls().len(), 1);

        h.clock.advance(chrono::Duration::minutes(7));
        let third = h.monitor.run_cycle().await;
        assert!(!third.is_skipped());
        assert_eq!(h.notifier.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_default_interval_never_lands_inside_lock_window() {
        let h = harness(Utc::now());
        let interval = Config::default().scan_interval;

        for _ in 0..4 {
            assert!(!h.monitor.run_cycle().await.is_skipped());
            h.clock.advance(chrono::Duration::from_std(interval).unwrap());
        }
    }

    #[tokio::test]
    async fn test_failure_then_recovery_across_cycles() {
        let h = harness(Utc::now());

        h.probe.set_down(&["QA1", "PROD"]);
        h.monitor.run_cycle().await;

        h.clock.advance(chrono::Duration::minutes(10));
        h.monitor.run_cycle().await;

        h.probe.set_down(&[]);
        h.clock.advance(chrono::Duration::minutes(10));
        let result = h.monitor.run_cycle().await;

        assert_eq!(result.summary().map(|s| s.up), Some(2));
        let calls = h.notifier.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[0], Sent::Down(_, envs) if envs.len() == 2));
        assert!(matches!(&calls[1], Sent::Recovery(_, envs) if envs.len() == 2));
    }

    #[tokio::test]
    async fn test_last_check_is_recorded() {
        let start = Utc::now();
        let h = harness(start);

        h.monitor.run_cycle().await;

        assert_eq!(h.store.get(LAST_CHECK_KEY).await, Some(start.to_rfc3339()));
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = Config {
            probe_timeout: Duration::ZERO,
            ..Config::default()
        };

        assert!(matches!(
            HealthMonitor::new(config, Vec::new()),
            Err(SentinelError::Config(_))
        ));
    }
}
