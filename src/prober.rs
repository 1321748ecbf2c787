//! Single-endpoint HTTP probing with a hard timeout

use crate::classifier::{classify_response, BodyClassifier};
use crate::errors::{Result, SentinelError};
use crate::models::{Endpoint, ProbeOutcome};
use reqwest::{header, Client};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Issues one bounded GET per endpoint and turns whatever happens into a `ProbeOutcome`
#[derive(Clone)]
pub struct EndpointProber {
    client: Client,
    timeout: Duration,
    classifier: Arc<dyn BodyClassifier>,
}

impl EndpointProber {
    pub fn new(probe_timeout: Duration, classifier: Box<dyn BodyClassifier>) -> Result<Self> {
        let client = Client::builder()
            .timeout(probe_timeout)
            .user_agent(format!("health_sentinel/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SentinelError::Http)?;

        Ok(Self {
            client,
            timeout: probe_timeout,
            classifier: Arc::from(classifier),
        })
    }

    /// Probe an endpoint. Never fails: transport errors and timeouts become DOWN with code 0.
    pub async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome {
        let start = Instant::now();

        let response = match timeout(self.timeout, self.request(&endpoint.url)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(
                    "Probe failed for {} ({}): {}",
                    endpoint.service_name, endpoint.env_name, e
                );
                return ProbeOutcome::unreachable(endpoint.clone(), elapsed_ms(start));
            }
            Err(_) => {
                warn!(
                    "Probe timed out after {}ms for {} ({})",
                    self.timeout.as_millis(),
                    endpoint.service_name,
                    endpoint.env_name
                );
                return ProbeOutcome::unreachable(endpoint.clone(), elapsed_ms(start));
            }
        };

        let status_code = response.status().as_u16();

        // The body only refines the verdict, so a slow or broken body falls back to the code.
        let remaining = self.timeout.saturating_sub(start.elapsed());
        let body = match timeout(remaining, response.text()).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                debug!("Could not read body from {}: {}", endpoint.url, e);
                String::new()
            }
            Err(_) => {
                debug!("Body read timed out for {}", endpoint.url);
                String::new()
            }
        };

        let status = classify_response(status_code, &body, self.classifier.as_ref());

        debug!(
            "Probed {} ({}) -> {} [{}] in {}ms",
            endpoint.service_name,
            endpoint.env_name,
            status,
            status_code,
            start.elapsed().as_millis()
        );

        ProbeOutcome::new(endpoint.clone(), status, status_code, elapsed_ms(start))
    }

    async fn request(&self, url: &str) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .header(header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(SentinelError::Http)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
