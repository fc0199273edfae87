//! Reference data sync: targets with their licensing, and automations.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use fleetline_core::error::CoreError;
use fleetline_core::execution::{Alert, RemotePrincipal, RemoteTarget, TargetSnapshot};
use fleetline_core::ports::{JobStore, Notifier, RemoteFleet};
use fleetline_core::types::DbId;

/// License recorded for a target whose principal could not be resolved.
pub const UNLICENSED: &str = "UNLICENSED";

/// What one sync cycle wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub targets: usize,
    pub active_targets: usize,
    pub automations: usize,
}

/// Reference data sync cycle.
pub struct SyncCycle {
    store: Arc<dyn JobStore>,
    fleet: Arc<dyn RemoteFleet>,
    notifier: Arc<dyn Notifier>,
}

impl SyncCycle {
    /// Create a sync cycle. Failures are alerted through `notifier`.
    pub fn new(
        store: Arc<dyn JobStore>,
        fleet: Arc<dyn RemoteFleet>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            fleet,
            notifier,
        }
    }

    /// Run one sync. Failures are logged and raised as a critical alert
    /// before being returned.
    pub async fn run_cycle(&self) -> Result<SyncSummary, CoreError> {
        match self.sync().await {
            Ok(summary) => {
                tracing::info!(
                    targets = summary.targets,
                    active_targets = summary.active_targets,
                    automations = summary.automations,
                    "Sync cycle finished"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "Sync cycle failed");
                let alert = Alert::critical(
                    "Sync cycle failed",
                    format!("Target and automation reference data was not refreshed: {e}"),
                );
                if let Err(notify_err) = self.notifier.alert(&alert).await {
                    tracing::error!(error = %notify_err, "Failed to send sync failure alert");
                }
                Err(e)
            }
        }
    }

    async fn sync(&self) -> Result<SyncSummary, CoreError> {
        let targets = self.fleet.list_targets().await?;
        let principal_ids: Vec<DbId> = targets
            .iter()
            .filter_map(|t| t.principal_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let principals = if principal_ids.is_empty() {
            Vec::new()
        } else {
            self.fleet.list_principals(&principal_ids).await?
        };

        let snapshots = build_target_snapshots(&targets, &principals);
        self.store.merge_targets(&snapshots).await?;

        let automations = self.fleet.list_automations().await?;
        self.store.merge_automations(&automations).await?;

        Ok(SyncSummary {
            targets: snapshots.len(),
            active_targets: snapshots.iter().filter(|s| s.active).count(),
            automations: automations.len(),
        })
    }
}

/// Join targets with their principals' licensing.
///
/// A target is active only when it is connected and its principal is both
/// known to the fleet and itself active.
pub fn build_target_snapshots(
    targets: &[RemoteTarget],
    principals: &[RemotePrincipal],
) -> Vec<TargetSnapshot> {
    let by_id: HashMap<DbId, &RemotePrincipal> =
        principals.iter().map(|p| (p.principal_id, p)).collect();

    targets
        .iter()
        .map(|target| {
            let principal = target.principal_id.and_then(|id| by_id.get(&id).copied());
            let license = principal
                .and_then(|p| p.license.clone())
                .unwrap_or_else(|| UNLICENSED.to_string());
            TargetSnapshot {
                target_id: target.target_id,
                name: target.name.clone(),
                principal_id: target.principal_id,
                principal_name: target.principal_name.clone(),
                license,
                active: target.connected && principal.is_some_and(|p| p.active),
            }
        })
        .collect()
}
