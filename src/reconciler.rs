//! Turns scan outcomes into deduplicated DOWN and RECOVERY alerts

use crate::errors::{Result, SentinelError};
use crate::models::{ProbeOutcome, ScanSummary};
use crate::notifier::{FailingEnv, Notifier, RecoveredEnv};
use crate::store::BestEffortStore;
use chrono::Utc;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

/// Alert decisions made for one service in one cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceAlerts {
    pub new_failures: Vec<FailingEnv>,
    pub suppressed: usize,
    pub recovered: Vec<RecoveredEnv>,
}

pub struct AlertReconciler {
    store: BestEffortStore,
    notifier: Arc<dyn Notifier>,
    down_flag_ttl: Duration,
    notifier_timeout: Duration,
}

impl AlertReconciler {
    pub fn new(
        store: BestEffortStore,
        notifier: Arc<dyn Notifier>,
        down_flag_ttl: Duration,
        notifier_timeout: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            down_flag_ttl,
            notifier_timeout,
        }
    }

    /// Consult and update the flags, send grouped alerts, and summarize the scan.
    ///
    /// The summary always reflects every outcome, whether or not its alert was suppressed.
    pub async fn reconcile(&self, outcomes: &[ProbeOutcome]) -> ScanSummary {
        let mut new_failures = 0;
        let mut suppressed = 0;
        let mut recovered = 0;

        for (service_name, results) in group_by_service(outcomes) {
            let alerts = self.reconcile_service(service_name, &results).await;
            new_failures += alerts.new_failures.len();
            suppressed += alerts.suppressed;
            recovered += alerts.recovered.len();
        }

        info!(
            "Reconciled {} outcomes: {} new failures, {} suppressed, {} recovered",
            outcomes.len(),
            new_failures,
            suppressed,
            recovered
        );

        ScanSummary::from_outcomes(outcomes, Utc::now())
    }

    /// Handle one service's outcomes: at most one DOWN call and one RECOVERY call
    pub async fn reconcile_service(&self, service_name: &str, results: &[&ProbeOutcome]) -> ServiceAlerts {
        let (up, down): (Vec<&ProbeOutcome>, Vec<&ProbeOutcome>) =
            results.iter().copied().partition(|o| o.is_up());

        let mut alerts = ServiceAlerts::default();

        let down_checks = join_all(down.iter().map(|outcome| async move {
            let env = &outcome.endpoint.env_name;
            if self.store.has_down_flag(service_name, env).await {
                None
            } else {
                self.store
                    .set_down_flag(service_name, env, self.down_flag_ttl)
                    .await;
                Some(FailingEnv {
                    env_name: env.clone(),
                    url: outcome.endpoint.url.clone(),
                    status_code: outcome.status_code,
                })
            }
        }))
        .await;

        for check in down_checks {
            match check {
                Some(failing) => alerts.new_failures.push(failing),
                None => alerts.suppressed += 1,
            }
        }

        if alerts.suppressed > 0 {
            info!(
                "Skipping {} already-alerted environment(s) for {}",
                alerts.suppressed, service_name
            );
        }

        if !alerts.new_failures.is_empty() {
            info!(
                "Sending grouped DOWN alert for {} ({} new envs)",
                service_name,
                alerts.new_failures.len()
            );
            self.deliver(
                "DOWN",
                service_name,
                self.notifier.send_down_alert(service_name, &alerts.new_failures),
            )
            .await;
        }

        let up_checks = join_all(up.iter().map(|outcome| async move {
            let env = &outcome.endpoint.env_name;
            if self.store.has_down_flag(service_name, env).await {
                self.store.clear_down_flag(service_name, env).await;
                Some(RecoveredEnv {
                    env_name: env.clone(),
                    url: outcome.endpoint.url.clone(),
                })
            } else {
                None
            }
        }))
        .await;

        alerts.recovered = up_checks.into_iter().flatten().collect();

        if !alerts.recovered.is_empty() {
            info!(
                "Sending grouped RECOVERY alert for {} ({} envs)",
                service_name,
                alerts.recovered.len()
            );
            self.deliver(
                "RECOVERY",
                service_name,
                self.notifier.send_recovery_alert(service_name, &alerts.recovered),
            )
            .await;
        }

        alerts
    }

    /// Await a notifier call under the timeout. Failures are logged, never propagated.
    async fn deliver(
        &self,
        kind: &str,
        service_name: &str,
        call: impl Future<Output = Result<()>>,
    ) {
        let outcome = timeout(self.notifier_timeout, call).await.unwrap_or_else(|_| {
            Err(SentinelError::Timeout(format!(
                "notifier call after {}s",
                self.notifier_timeout.as_secs()
            )))
        });

        if let Err(e) = outcome {
            error!("Failed to send {} alert for {}: {}", kind, service_name, e);
        }
    }
}

/// Group outcomes by service name, keeping first-seen order
fn group_by_service(outcomes: &[ProbeOutcome]) -> Vec<(&str, Vec<&ProbeOutcome>)> {
    let mut groups: Vec<(&str, Vec<&ProbeOutcome>)> = Vec::new();

    for outcome in outcomes {
        let name = outcome.endpoint.service_name.as_str();
        match groups.iter_mut().find(|(service, _)| *service == name) {
            Some((_, members)) => members.push(outcome),
            None => groups.push((name, vec![outcome])),
        }
    }

    groups
}
