//! Wall-clock source shared by the monitor and the in-memory store

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Either the system clock or a manually driven one for tests and replays
#[derive(Debug, Clone, Default)]
pub struct Clock {
    manual: Option<Arc<Mutex<DateTime<Utc>>>>,
}

impl Clock {
    pub fn system() -> Self {
        Self { manual: None }
    }

    pub fn manual(start: DateTime<Utc>) -> Self {
        Self {
            manual: Some(Arc::new(Mutex::new(start))),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        match &self.manual {
            Some(current) => *current.lock().unwrap_or_else(|p| p.into_inner()),
            None => Utc::now(),
        }
    }

    /// Move a manual clock forward. No-op on the system clock.
    pub fn advance(&self, by: Duration) {
        if let Some(current) = &self.manual {
            let mut guard = current.lock().unwrap_or_else(|p| p.into_inner());
            *guard += by;
        }
    }
}
