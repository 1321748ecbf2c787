//! Concurrent fan-out of probes over the whole fleet

use crate::models::{Endpoint, ProbeOutcome};
use crate::prober::EndpointProber;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info};

/// Anything that can turn an endpoint into an outcome without failing
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome;
}

#[async_trait]
impl Probe for EndpointProber {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome {
        EndpointProber::probe(self, endpoint).await
    }
}

/// Runs one probe task per endpoint and always yields one outcome per endpoint
#[derive(Clone)]
pub struct FleetScanner {
    prober: Arc<dyn Probe>,
    limiter: Option<Arc<Semaphore>>,
}

impl FleetScanner {
    /// `max_concurrent` of 0 means every probe runs at once
    pub fn new(prober: Arc<dyn Probe>, max_concurrent: usize) -> Self {
        let limiter = if max_concurrent > 0 {
            Some(Arc::new(Semaphore::new(max_concurrent)))
        } else {
            None
        };

        Self { prober, limiter }
    }

    /// Probe every endpoint concurrently. Outcomes come back in input order.
    pub async fn scan_all(&self, endpoints: &[Endpoint]) -> Vec<ProbeOutcome> {
        let start = Instant::now();

        let handles: Vec<_> = endpoints
            .iter()
            .cloned()
            .map(|endpoint| {
                let prober = Arc::clone(&self.prober);
                let limiter = self.limiter.clone();

                tokio::spawn(async move {
                    let _permit = match limiter {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    prober.probe(&endpoint).await
                })
            })
            .collect();

        let outcomes: Vec<ProbeOutcome> = join_all(handles)
            .await
            .into_iter()
            .zip(endpoints)
            .map(|(joined, endpoint)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        "Probe task for {} ({}) did not complete: {}",
                        endpoint.service_name, endpoint.env_name, e
                    );
                    ProbeOutcome::unreachable(endpoint.clone(), start.elapsed().as_millis() as u64)
                }
            })
            .collect();

        let up = outcomes.iter().filter(|o| o.is_up()).count();
        info!(
            "Scanned {} endpoints in {}ms ({} up, {} down)",
            outcomes.len(),
            start.elapsed().as_millis(),
            up,
            outcomes.len() - up
        );

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProbeStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps, then reports DOWN for any env named "QA1" and panics for "BROKEN"
    struct FakeProbe {
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeProbe {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Probe for FakeProbe {
        async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if endpoint.env_name == "BROKEN" {
                panic!("probe blew up");
            }

            let status = if endpoint.env_name == "QA1" {
                ProbeStatus::Down
            } else {
                ProbeStatus::Up
            };
            let code = if status == ProbeStatus::Up { 200 } else { 500 };
            ProbeOutcome::new(endpoint.clone(), status, code, self.delay.as_millis() as u64)
        }
    }

    fn fleet(envs: &[&str]) -> Vec<Endpoint> {
        envs.iter()
            .map(|env| Endpoint::new("svc", "Service", env, &format!("http://{}.local/health", env)))
            .collect()
    }

    #[tokio::test]
    async fn test_one_outcome_per_endpoint_even_when_a_probe_panics() {
        let scanner = FleetScanner::new(Arc::new(FakeProbe::new(Duration::from_millis(10))), 0);
        let endpoints = fleet(&["Dev1", "BROKEN", "QA1", "PROD"]);

        let outcomes = scanner.scan_all(&endpoints).await;

        assert_eq!(outcomes.len(), endpoints.len());
        for (outcome, endpoint) in outcomes.iter().zip(&endpoints) {
            assert_eq!(&outcome.endpoint, endpoint);
        }
        assert_eq!(outcomes[0].status, ProbeStatus::Up);
        assert_eq!(outcomes[1].status, ProbeStatus::Down);
        assert_eq!(outcomes[1].status_code, 0);
        assert_eq!(outcomes[2].status_code, 500);
    }

    #[tokio::test]
    async fn test_probes_run_concurrently() {
        let probe = Arc::new(FakeProbe::new(Duration::from_millis(200)));
        let scanner = FleetScanner::new(probe.clone(), 0);
        let endpoints = fleet(&["a", "b", "c", "d", "e", "f", "g", "h"]);

        let start = Instant::now();
        let outcomes = scanner.scan_all(&endpoints).await;

        assert_eq!(outcomes.len(), 8);
        assert!(start.elapsed() < Duration::from_millis(1000));
        assert_eq!(probe.peak.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        let probe = Arc::new(FakeProbe::new(Duration::from_millis(30)));
        let scanner = FleetScanner::new(probe.clone(), 2);

        let outcomes = scanner.scan_all(&fleet(&["a", "b", "c", "d", "e"])).await;

        assert_eq!(outcomes.len(), 5);
        assert!(probe.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_fleet() {
        let scanner = FleetScanner::new(Arc::new(FakeProbe::new(Duration::ZERO)), 0);
        assert!(scanner.scan_all(&[]).await.is_empty());
    }
}
