//! Execution record rows.

use fleetline_core::execution::ExecutionRecord;
use fleetline_core::status::{ExecutionStatus, StatusId};
use fleetline_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `executions` table.
#[derive(Debug, Clone, FromRow)]
pub struct ExecutionRow {
    pub id: DbId,
    pub deployment_id: String,
    pub job_id: DbId,
    pub target_id: DbId,
    pub principal_id: DbId,
    pub scheduled_at: Option<Timestamp>,
    pub status_id: StatusId,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub callback_received: bool,
    pub missed_lookups: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<ExecutionRow> for ExecutionRecord {
    type Error = String;

    fn try_from(row: ExecutionRow) -> Result<Self, Self::Error> {
        let status = ExecutionStatus::from_id(row.status_id).ok_or_else(|| {
            format!(
                "execution {} has unknown status_id {}",
                row.deployment_id, row.status_id
            )
        })?;
        Ok(ExecutionRecord {
            deployment_id: row.deployment_id,
            job_id: row.job_id,
            target_id: row.target_id,
            principal_id: row.principal_id,
            scheduled_at: row.scheduled_at,
            status,
            started_at: row.started_at,
            ended_at: row.ended_at,
            callback_received: row.callback_received,
            missed_lookups: row.missed_lookups,
        })
    }
}
