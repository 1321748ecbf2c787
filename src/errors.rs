//! Error types for the health sentinel

use std::fmt;

pub type Result<T> = std::result::Result<T, SentinelError>;

#[derive(Debug)]
pub enum SentinelError {
    /// IO operation failed
    Io(std::io::Error),

    /// HTTP request failed
    Http(reqwest::Error),

    /// JSON serialization/deserialization failed
    Json(serde_json::Error),

    /// Configuration error
    Config(String),

    /// Alert state store rejected or failed a command
    Store(String),

    /// Notification delivery failed
    Notifier(String),

    /// Operation exceeded its time budget
    Timeout(String),
}

impl fmt::Display for SentinelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentinelError::Io(err) => write!(f, "IO error: {}", err),
            SentinelError::Http(err) => write!(f, "HTTP error: {}", err),
            SentinelError::Json(err) => write!(f, "JSON error: {}", err),
            SentinelError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SentinelError::Store(msg) => write!(f, "Store error: {}", msg),
            SentinelError::Notifier(msg) => write!(f, "Notifier error: {}", msg),
            SentinelError::Timeout(op) => write!(f, "Timed out: {}", op),
        }
    }
}

impl std::error::Error for SentinelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SentinelError::Io(err) => Some(err),
            SentinelError::Http(err) => Some(err),
            SentinelError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SentinelError {
    fn from(err: std::io::Error) -> Self {
        SentinelError::Io(err)
    }
}

impl From<reqwest::Error> for SentinelError {
    fn from(err: reqwest::Error) -> Self {
        SentinelError::Http(err)
    }
}

impl From<serde_json::Error> for SentinelError {
    fn from(err: serde_json::Error) -> Self {
        SentinelError::Json(err)
    }
}
