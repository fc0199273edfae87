//! Per-job dispatch outcomes and the per-cycle summary.

use fleetline_core::execution::{FailureDetail, FailureKind, Job};

/// The classified result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Deployed and recorded.
    Launched { deployment_id: String },
    /// Transient fleet failure; eligible for the retry pass.
    Retriable { error: String },
    /// Non-retriable fleet failure.
    Permanent { error: String },
    /// Required identifiers missing; never sent to the fleet.
    InvalidData { error: String },
    /// Deployed, but the execution record could not be written.
    Untracked { deployment_id: String, error: String },
    /// Not attempted because shutdown was requested.
    SkippedShutdown,
}

impl DispatchOutcome {
    pub fn is_retriable(&self) -> bool {
        matches!(self, DispatchOutcome::Retriable { .. })
    }

    /// The failure entry for this final outcome, if it belongs in the batch.
    ///
    /// Only called once the retry pass is over, so a transient failure is
    /// reported as [`FailureKind::RetryExhausted`].
    pub fn failure(&self, job: &Job) -> Option<FailureDetail> {
        let (kind, error) = match self {
            DispatchOutcome::Launched { .. } | DispatchOutcome::SkippedShutdown => return None,
            DispatchOutcome::Retriable { error } => (FailureKind::RetryExhausted, error),
            DispatchOutcome::Permanent { error } => (FailureKind::Permanent, error),
            DispatchOutcome::InvalidData { error } => (FailureKind::InvalidData, error),
            DispatchOutcome::Untracked { deployment_id, error } => {
                let mut detail = FailureDetail::for_job(job, FailureKind::UntrackedDeployment, error.clone());
                detail.deployment_id = Some(deployment_id.clone());
                return Some(detail);
            }
        };
        Some(FailureDetail::for_job(job, kind, error.clone()))
    }
}

/// What one dispatch cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchSummary {
    /// The cycle was skipped because of the pause window.
    pub paused: bool,
    pub candidates: usize,
    pub launched: usize,
    /// Jobs given a second attempt.
    pub retried: usize,
    pub skipped: usize,
    pub failures: Vec<FailureDetail>,
}
