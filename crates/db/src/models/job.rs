//! Dispatch candidate rows.

use fleetline_core::execution::Job;
use fleetline_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row returned by `dispatch_candidates()`.
#[derive(Debug, Clone, FromRow)]
pub struct CandidateRow {
    pub job_id: Option<DbId>,
    pub target_id: Option<DbId>,
    pub principal_id: Option<DbId>,
    pub scheduled_at: Option<Timestamp>,
    pub input_override: Option<serde_json::Value>,
}

impl From<CandidateRow> for Job {
    fn from(row: CandidateRow) -> Self {
        Job {
            job_id: row.job_id,
            target_id: row.target_id,
            principal_id: row.principal_id,
            scheduled_at: row.scheduled_at,
            // An empty or non-object override means "use the template".
            input_override: row.input_override.filter(|v| v.as_object().is_some_and(|o| !o.is_empty())),
        }
    }
}
