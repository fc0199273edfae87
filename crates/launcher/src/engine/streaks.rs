//! Consecutive transient-failure streaks per execution target.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use fleetline_core::types::DbId;

#[derive(Debug, Default)]
struct Streak {
    count: u32,
    last_alert: Option<Instant>,
}

/// Tracks, per target, how many dispatch cycles in a row ended in a
/// transient failure, and decides when that deserves an alert.
pub struct TargetFailureTracker {
    threshold: u32,
    cooldown: Duration,
    streaks: Mutex<HashMap<DbId, Streak>>,
}

impl TargetFailureTracker {
    /// A `threshold` of 0 disables alerting.
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            streaks: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_success(&self, target_id: DbId) {
        self.lock().remove(&target_id);
    }

    /// Count one more failing cycle. Returns the streak length when an
    /// alert is due.
    pub fn record_failure(&self, target_id: DbId, now: Instant) -> Option<u32> {
        let mut streaks = self.lock();
        let streak = streaks.entry(target_id).or_default();
        streak.count += 1;

        if self.threshold == 0 || streak.count < self.threshold {
            return None;
        }
        let cooled_down = streak
            .last_alert
            .map_or(true, |at| now.saturating_duration_since(at) >= self.cooldown);
        if !cooled_down {
            return None;
        }
        streak.last_alert = Some(now);
        Some(streak.count)
    }

    pub fn streak(&self, target_id: DbId) -> u32 {
        self.lock().get(&target_id).map_or(0, |s| s.count)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DbId, Streak>> {
        match self.streaks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
