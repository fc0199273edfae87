//! Reconciliation of in-flight execution records against the fleet.
//!
//! One cycle looks up every reconcilable record in a single batched call.
//! If that lookup fails the cycle is abandoned without writing anything.
//! Otherwise each reported status is normalized and written back, and
//! records the fleet no longer reports are counted as missed and
//! eventually declared `UNKNOWN`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;

use fleetline_core::error::CoreError;
use fleetline_core::execution::{ExecutionRecord, RemoteStatus};
use fleetline_core::ports::{JobStore, RemoteFleet};
use fleetline_core::remote_time::parse_remote_timestamp;
use fleetline_core::status::ExecutionStatus;
use fleetline_core::types::Timestamp;

use crate::config::ReconcilerConfig;

/// What one reconciliation cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub in_flight: usize,
    pub reported: usize,
    pub updated: usize,
    /// Reported with a status outside the vocabulary.
    pub unrecognized: usize,
    /// Declared `UNKNOWN` after going missing.
    pub lost: usize,
    /// Missing but not yet old enough, or not missed often enough.
    pub missed: usize,
    pub expired: u64,
}

/// Reconciliation engine.
pub struct Reconciler {
    store: Arc<dyn JobStore>,
    fleet: Arc<dyn RemoteFleet>,
    config: ReconcilerConfig,
}

/// Whether a reported status may be written over `record`.
///
/// Only reconcilable records are ever written. Among those, a write happens
/// when the status changed or the stored status is still open and no
/// callback has confirmed it.
pub fn should_update(record: &ExecutionRecord, reported: ExecutionStatus) -> bool {
    record.is_reconcilable()
        && (reported != record.status
            || (!record.status.is_terminal() && !record.callback_received))
}

impl Reconciler {
    /// Create a reconciler with the given dwell and expiry settings.
    pub fn new(
        store: Arc<dyn JobStore>,
        fleet: Arc<dyn RemoteFleet>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            fleet,
            config,
        }
    }

    pub async fn run_cycle(&self) -> Result<ReconcileSummary, CoreError> {
        self.run_cycle_at(Utc::now()).await
    }

    pub async fn run_cycle_at(&self, now: Timestamp) -> Result<ReconcileSummary, CoreError> {
        let mut summary = ReconcileSummary::default();

        let records: Vec<ExecutionRecord> = self
            .store
            .fetch_in_flight()
            .await?
            .into_iter()
            .filter(ExecutionRecord::is_reconcilable)
            .collect();
        summary.in_flight = records.len();
        if records.is_empty() {
            tracing::debug!("No executions in flight");
            return Ok(summary);
        }

        let ids: Vec<String> = records.iter().map(|r| r.deployment_id.clone()).collect();
        let statuses = self.fleet.get_statuses(&ids).await.map_err(|e| {
            tracing::error!(error = %e, requested = ids.len(), "Status lookup failed, cycle abandoned");
            e
        })?;
        summary.reported = statuses.len();

        let by_id: HashMap<&str, &ExecutionRecord> = records
            .iter()
            .map(|r| (r.deployment_id.as_str(), r))
            .collect();
        let mut seen: HashSet<&str> = HashSet::with_capacity(statuses.len());

        for item in &statuses {
            let Some(&record) = by_id.get(item.deployment_id.as_str()) else {
                tracing::debug!(deployment_id = %item.deployment_id, "Status for an unrequested deployment ignored");
                continue;
            };
            // The fleet lists the most recent activity first.
            if !seen.insert(record.deployment_id.as_str()) {
                continue;
            }
            self.apply_status(record, item, &mut summary).await;
        }

        for record in records.iter().filter(|r| !seen.contains(r.deployment_id.as_str())) {
            self.handle_missing(record, now, &mut summary).await;
        }

        if let Some(stale_after) = self.config.stale_after {
            summary.expired = self.expire_stale(now, stale_after).await;
        }

        tracing::info!(
            in_flight = summary.in_flight,
            reported = summary.reported,
            updated = summary.updated,
            unrecognized = summary.unrecognized,
            lost = summary.lost,
            missed = summary.missed,
            expired = summary.expired,
            "Reconciliation cycle finished"
        );
        Ok(summary)
    }

    async fn apply_status(
        &self,
        record: &ExecutionRecord,
        item: &RemoteStatus,
        summary: &mut ReconcileSummary,
    ) {
        let Some(status) = ExecutionStatus::from_remote(&item.status) else {
            tracing::warn!(
                deployment_id = %record.deployment_id,
                remote_status = %item.status,
                "Unrecognized remote status, skipped"
            );
            summary.unrecognized += 1;
            return;
        };
        if !should_update(record, status) {
            return;
        }

        let ended_at = if status.is_terminal() {
            let parsed = parse_remote_timestamp(item.ended_at.as_deref());
            if parsed.is_none() && item.ended_at.is_some() {
                tracing::debug!(
                    deployment_id = %record.deployment_id,
                    raw = ?item.ended_at,
                    "Remote end time unusable, left unset"
                );
            }
            parsed
        } else {
            None
        };

        match self
            .store
            .update_execution_status(&record.deployment_id, status, ended_at)
            .await
        {
            Ok(0) => tracing::debug!(
                deployment_id = %record.deployment_id,
                "Record finalized concurrently, update skipped"
            ),
            Ok(_) => {
                summary.updated += 1;
                if status != record.status {
                    tracing::info!(
                        deployment_id = %record.deployment_id,
                        from = %record.status,
                        to = %status,
                        "Execution status changed"
                    );
                }
            }
            Err(e) => tracing::error!(
                deployment_id = %record.deployment_id,
                error = %e,
                "Failed to write reconciled status"
            ),
        }
    }

    /// A requested id the fleet did not report.
    async fn handle_missing(
        &self,
        record: &ExecutionRecord,
        now: Timestamp,
        summary: &mut ReconcileSummary,
    ) {
        let old_enough = record
            .age(now)
            .and_then(|age| age.to_std().ok())
            .is_some_and(|age| age > self.config.lost_min_age);
        let missed_enough = record.missed_lookups + 1 >= self.config.lost_max_misses;

        let result = if old_enough && missed_enough {
            self.store
                .update_execution_status(&record.deployment_id, ExecutionStatus::Unknown, Some(now))
                .await
                .map(|rows| {
                    if rows > 0 {
                        summary.lost += 1;
                        tracing::warn!(
                            deployment_id = %record.deployment_id,
                            job_id = record.job_id,
                            target_id = record.target_id,
                            "Execution lost by the fleet, marked UNKNOWN"
                        );
                    }
                })
        } else {
            self.store
                .record_missed_lookup(&record.deployment_id)
                .await
                .map(|_| {
                    summary.missed += 1;
                    tracing::debug!(
                        deployment_id = %record.deployment_id,
                        missed_lookups = record.missed_lookups + 1,
                        "Execution not reported by the fleet yet"
                    );
                })
        };

        if let Err(e) = result {
            tracing::error!(deployment_id = %record.deployment_id, error = %e, "Failed to record missing execution");
        }
    }

    async fn expire_stale(&self, now: Timestamp, stale_after: std::time::Duration) -> u64 {
        let Ok(stale_after) = chrono::Duration::from_std(stale_after) else {
            return 0;
        };
        match self.store.expire_stale(now - stale_after, now).await {
            Ok(0) => 0,
            Ok(expired) => {
                tracing::warn!(expired, "Stale executions expired to UNKNOWN");
                expired
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to expire stale executions");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetline_core::execution::DispatchRequest;

    fn record(status: ExecutionStatus, callback: bool) -> ExecutionRecord {
        let request = DispatchRequest {
            job_id: 1,
            target_id: 2,
            principal_id: 3,
        };
        let mut record = ExecutionRecord::dispatched("d".into(), request, None, Utc::now());
        record.status = status;
        record.callback_received = callback;
        record
    }

    #[test]
    fn open_record_is_always_refreshed() {
        let r = record(ExecutionStatus::Running, false);
        assert!(should_update(&r, ExecutionStatus::Running));
        assert!(should_update(&r, ExecutionStatus::Completed));
    }

    #[test]
    fn callback_confirmed_record_is_never_written() {
        let r = record(ExecutionStatus::Running, true);
        assert!(!should_update(&r, ExecutionStatus::Completed));
        assert!(!should_update(&r, ExecutionStatus::Running));
    }

    #[test]
    fn terminal_record_is_never_written() {
        let r = record(ExecutionStatus::Completed, false);
        assert!(!should_update(&r, ExecutionStatus::Running));
        assert!(!should_update(&r, ExecutionStatus::RunFailed));
    }
}
