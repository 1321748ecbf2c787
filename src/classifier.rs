//! Response classification: HTTP status code first, then optional body overrides

use crate::models::ProbeStatus;
use serde_json::Value;

/// Inspects a response body and optionally overrides the HTTP-code verdict
pub trait BodyClassifier: Send + Sync {
    fn classify(&self, body: &str) -> Option<ProbeStatus>;
}

/// Base verdict from the HTTP status code alone
pub fn classify_status_code(status_code: u16) -> ProbeStatus {
    if (200..300).contains(&status_code) {
        ProbeStatus::Up
    } else {
        ProbeStatus::Down
    }
}

/// Reads a top-level `status` field as used by ASP.NET-style health endpoints
pub struct StatusFieldClassifier;

impl BodyClassifier for StatusFieldClassifier {
    fn classify(&self, body: &str) -> Option<ProbeStatus> {
        let json: Value = serde_json::from_str(body).ok()?;
        let status = json.get("status")?.as_str()?;

        if status.eq_ignore_ascii_case("healthy") {
            Some(ProbeStatus::Up)
        } else if status.eq_ignore_ascii_case("unhealthy") || status.eq_ignore_ascii_case("degraded") {
            Some(ProbeStatus::Down)
        } else {
            None
        }
    }
}

/// Tries each classifier in order; the first verdict wins
pub struct CompositeClassifier {
    classifiers: Vec<Box<dyn BodyClassifier>>,
}

impl CompositeClassifier {
    pub fn new(classifiers: Vec<Box<dyn BodyClassifier>>) -> Self {
        Self { classifiers }
    }
}

impl BodyClassifier for CompositeClassifier {
    fn classify(&self, body: &str) -> Option<ProbeStatus> {
        self.classifiers.iter().find_map(|c| c.classify(body))
    }
}

/// Never overrides; the HTTP code stands
pub struct NoopClassifier;

impl BodyClassifier for NoopClassifier {
    fn classify(&self, _body: &str) -> Option<ProbeStatus> {
        None
    }
}

/// Combine the code verdict with whatever the body classifier says
pub fn classify_response(status_code: u16, body: &str, classifier: &dyn BodyClassifier) -> ProbeStatus {
    if body.trim().is_empty() {
        return classify_status_code(status_code);
    }

    classifier
        .classify(body)
        .unwrap_or_else(|| classify_status_code(status_code))
}

/// Factory for creating body classifiers
pub struct ClassifierFactory;

impl ClassifierFactory {
    pub fn create_classifier(kind: &str) -> Box<dyn BodyClassifier> {
        match kind.to_lowercase().as_str() {
            "none" | "off" => Box::new(NoopClassifier),
            "status" | "status-field" => Box::new(StatusFieldClassifier),
            _ => Box::new(CompositeClassifier::new(vec![Box::new(StatusFieldClassifier)])),
        }
    }
}
