//! Jobs, execution records and the snapshots exchanged with the remote fleet.

use serde::Serialize;

use crate::status::ExecutionStatus;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Candidate jobs
// ---------------------------------------------------------------------------

/// A dispatch candidate as answered by the job store.
///
/// Identifier fields are optional because the eligibility query is
/// external; a candidate missing any of them is reported as invalid data
/// and never sent to the fleet.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub job_id: Option<DbId>,
    pub target_id: Option<DbId>,
    pub principal_id: Option<DbId>,
    pub scheduled_at: Option<Timestamp>,
    /// Per-job input document, sent instead of the configured template.
    pub input_override: Option<serde_json::Value>,
}

impl Job {
    /// Resolve the identifiers needed for a deploy call.
    pub fn dispatch_request(&self) -> Result<DispatchRequest, String> {
        match (self.job_id, self.target_id, self.principal_id) {
            (Some(job_id), Some(target_id), Some(principal_id)) => Ok(DispatchRequest {
                job_id,
                target_id,
                principal_id,
            }),
            _ => {
                let missing: Vec<&str> = [
                    ("job_id", self.job_id.is_none()),
                    ("target_id", self.target_id.is_none()),
                    ("principal_id", self.principal_id.is_none()),
                ]
                .iter()
                .filter(|(_, is_missing)| *is_missing)
                .map(|(name, _)| *name)
                .collect();
                Err(format!("missing required fields: {}", missing.join(", ")))
            }
        }
    }
}

/// The validated identifiers of one deploy call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchRequest {
    pub job_id: DbId,
    pub target_id: DbId,
    pub principal_id: DbId,
}

// ---------------------------------------------------------------------------
// Execution records
// ---------------------------------------------------------------------------

/// The locally tracked state of one remote deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub deployment_id: String,
    pub job_id: DbId,
    pub target_id: DbId,
    pub principal_id: DbId,
    pub scheduled_at: Option<Timestamp>,
    pub status: ExecutionStatus,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub callback_received: bool,
    /// Consecutive reconciliation cycles in which the remote did not
    /// report this deployment.
    pub missed_lookups: i32,
}

impl ExecutionRecord {
    /// The record written right after a successful deploy.
    pub fn dispatched(
        deployment_id: String,
        request: DispatchRequest,
        scheduled_at: Option<Timestamp>,
        now: Timestamp,
    ) -> Self {
        Self {
            deployment_id,
            job_id: request.job_id,
            target_id: request.target_id,
            principal_id: request.principal_id,
            scheduled_at,
            status: ExecutionStatus::Running,
            started_at: Some(now),
            ended_at: None,
            callback_received: false,
            missed_lookups: 0,
        }
    }

    /// Reconciliation may only touch non-terminal records that no
    /// out-of-band callback has confirmed.
    pub fn is_reconcilable(&self) -> bool {
        !self.status.is_terminal() && !self.callback_received
    }

    /// Time since dispatch, or `None` when the start time is unknown.
    pub fn age(&self, now: Timestamp) -> Option<chrono::Duration> {
        self.started_at.map(|started| now - started)
    }
}

/// One item of a batched remote status lookup, as reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStatus {
    pub deployment_id: String,
    pub status: String,
    pub ended_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Failures and alerts
// ---------------------------------------------------------------------------

/// Why a candidate ended up in the cycle's failure batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The fleet rejected the deploy with a non-retriable error.
    Permanent,
    /// The candidate lacked required identifiers.
    InvalidData,
    /// The deploy succeeded but the execution record could not be written.
    /// The job is running remotely without a local record.
    UntrackedDeployment,
    /// The deploy failed transiently on both attempts.
    RetryExhausted,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Permanent => "failed_permanent",
            FailureKind::InvalidData => "failed_data",
            FailureKind::UntrackedDeployment => "failed_db_insert",
            FailureKind::RetryExhausted => "failed_after_retry",
        }
    }
}

/// One entry in the per-cycle failure notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureDetail {
    pub job_id: Option<DbId>,
    pub target_id: Option<DbId>,
    pub principal_id: Option<DbId>,
    pub kind: FailureKind,
    pub error: String,
    /// Set only for [`FailureKind::UntrackedDeployment`].
    pub deployment_id: Option<String>,
}

impl FailureDetail {
    pub fn for_job(job: &Job, kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            job_id: job.job_id,
            target_id: job.target_id,
            principal_id: job.principal_id,
            kind,
            error: error.into(),
            deployment_id: None,
        }
    }
}

/// Severity of a standalone alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

/// A standalone operational alert, outside the per-cycle failure batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub subject: String,
    pub body: String,
}

impl Alert {
    pub fn critical(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Critical,
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn warning(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Warning,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reference data (sync cycle)
// ---------------------------------------------------------------------------

/// An execution target (runner device) as listed by the fleet.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTarget {
    pub target_id: DbId,
    pub name: String,
    pub principal_id: Option<DbId>,
    pub principal_name: Option<String>,
    pub connected: bool,
}

/// Licensing details of an acting identity.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePrincipal {
    pub principal_id: DbId,
    pub license: Option<String>,
    pub active: bool,
}

/// A deployable automation as listed by the fleet.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAutomation {
    pub job_id: DbId,
    pub name: String,
    pub description: Option<String>,
}

/// The target row written by the sync cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSnapshot {
    pub target_id: DbId,
    pub name: String,
    pub principal_id: Option<DbId>,
    pub principal_name: Option<String>,
    pub license: String,
    pub active: bool,
}
