//! Collaborator traits the engine is written against.
//!
//! Concrete implementations live in `fleetline-db` ([`JobStore`]),
//! `fleetline-fleet` ([`RemoteFleet`]) and `fleetline-events`
//! ([`Notifier`]). All of them must be safe to share across concurrently
//! running cycles.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::execution::{
    Alert, DispatchRequest, ExecutionRecord, FailureDetail, Job, RemoteAutomation,
    RemotePrincipal, RemoteStatus, RemoteTarget, TargetSnapshot,
};
use crate::status::ExecutionStatus;
use crate::types::{DbId, Timestamp};

/// Outcome of a failed deploy call, as classified by the fleet client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    /// Timeouts, rate limits, busy devices and other conditions worth one
    /// more attempt within the same cycle.
    #[error("transient deploy failure: {0}")]
    Transient(String),

    /// Anything a retry would not fix.
    #[error("permanent deploy failure: {0}")]
    Permanent(String),
}

/// Local ledger of candidate jobs and execution records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Jobs eligible for dispatch right now. Eligibility is decided by the
    /// store; the engine only consumes the answer.
    async fn fetch_eligible_jobs(&self) -> Result<Vec<Job>, CoreError>;

    /// Every record whose status is non-terminal.
    async fn fetch_in_flight(&self) -> Result<Vec<ExecutionRecord>, CoreError>;

    async fn insert_execution(&self, record: &ExecutionRecord) -> Result<(), CoreError>;

    /// Write a reconciled status. `ended_at` only overwrites the stored
    /// value when it is `Some`. Returns the number of rows changed, which is
    /// zero when the record became terminal or callback-confirmed meanwhile.
    async fn update_execution_status(
        &self,
        deployment_id: &str,
        status: ExecutionStatus,
        ended_at: Option<Timestamp>,
    ) -> Result<u64, CoreError>;

    /// Count one more reconciliation cycle in which the remote did not
    /// report this deployment.
    async fn record_missed_lookup(&self, deployment_id: &str) -> Result<u64, CoreError>;

    /// Expire every reconcilable record started before `started_before`
    /// to `UNKNOWN`, ended at `now`.
    async fn expire_stale(
        &self,
        started_before: Timestamp,
        now: Timestamp,
    ) -> Result<u64, CoreError>;

    async fn merge_targets(&self, targets: &[TargetSnapshot]) -> Result<u64, CoreError>;

    async fn merge_automations(&self, automations: &[RemoteAutomation])
        -> Result<u64, CoreError>;
}

/// The remote execution fleet.
#[async_trait]
pub trait RemoteFleet: Send + Sync {
    /// Start one deployment, returning its deployment id.
    async fn deploy(
        &self,
        request: &DispatchRequest,
        input: &serde_json::Value,
    ) -> Result<String, DeployError>;

    /// Batched status lookup. The client pages internally to honor its
    /// maximum batch size; a failure of any page fails the whole lookup.
    async fn get_statuses(&self, deployment_ids: &[String])
        -> Result<Vec<RemoteStatus>, CoreError>;

    async fn list_targets(&self) -> Result<Vec<RemoteTarget>, CoreError>;

    async fn list_principals(&self, principal_ids: &[DbId])
        -> Result<Vec<RemotePrincipal>, CoreError>;

    async fn list_automations(&self) -> Result<Vec<RemoteAutomation>, CoreError>;
}

/// Best-effort operator notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one cycle's failures as a single message.
    async fn notify_failures(&self, batch: &[FailureDetail]) -> Result<(), CoreError>;

    async fn alert(&self, alert: &Alert) -> Result<(), CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_error_display_names_the_class() {
        assert_eq!(
            DeployError::Transient("device is busy".into()).to_string(),
            "transient deploy failure: device is busy"
        );
        assert_eq!(
            DeployError::Permanent("user disabled".into()).to_string(),
            "permanent deploy failure: user disabled"
        );
    }
}
