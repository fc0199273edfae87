//! Per-subject suppression of repeated critical alerts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Remembers when each subject was last sent.
pub struct AlertThrottle {
    cooldown: Duration,
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl AlertThrottle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `subject` may be sent now; records the send when it may.
    pub fn try_acquire(&self, subject: &str) -> bool {
        self.try_acquire_at(subject, Instant::now())
    }

    pub fn try_acquire_at(&self, subject: &str, now: Instant) -> bool {
        let mut last_sent = match self.last_sent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match last_sent.get(subject) {
            Some(&at) if now.saturating_duration_since(at) < self.cooldown => false,
            _ => {
                last_sent.insert(subject.to_string(), now);
                true
            }
        }
    }
}
