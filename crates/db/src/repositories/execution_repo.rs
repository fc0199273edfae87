//! Repository for the `executions` table.
//!
//! Every status write is guarded in SQL as well as in the engine: a row that
//! is already terminal or has received its completion callback is never
//! modified by reconciliation.

use fleetline_core::execution::ExecutionRecord;
use fleetline_core::status::{ExecutionStatus, StatusId};
use fleetline_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::execution::ExecutionRow;

/// Column list for `executions` queries.
const COLUMNS: &str = "\
    id, deployment_id, job_id, target_id, principal_id, scheduled_at, \
    status_id, started_at, ended_at, callback_received, missed_lookups, \
    created_at, updated_at";

/// Shared predicate for rows reconciliation may still touch.
/// `$1` must be bound to the terminal status ids.
const RECONCILABLE: &str = "callback_received = FALSE AND status_id <> ALL($1)";

/// Provides persistence for execution records.
pub struct ExecutionRepo;

impl ExecutionRepo {
    /// Insert a freshly dispatched record.
    pub async fn insert(
        pool: &PgPool,
        record: &ExecutionRecord,
    ) -> Result<ExecutionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO executions \
                 (deployment_id, job_id, target_id, principal_id, scheduled_at, \
                  status_id, started_at, ended_at, callback_received, missed_lookups) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ExecutionRow>(&query)
            .bind(&record.deployment_id)
            .bind(record.job_id)
            .bind(record.target_id)
            .bind(record.principal_id)
            .bind(record.scheduled_at)
            .bind(record.status.id())
            .bind(record.started_at)
            .bind(record.ended_at)
            .bind(record.callback_received)
            .bind(record.missed_lookups)
            .fetch_one(pool)
            .await
    }

    /// Every row whose status is outside the terminal set.
    pub async fn list_in_flight(pool: &PgPool) -> Result<Vec<ExecutionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM executions \
             WHERE status_id <> ALL($1) \
             ORDER BY started_at ASC NULLS FIRST, id ASC"
        );
        sqlx::query_as::<_, ExecutionRow>(&query)
            .bind(terminal_ids())
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_deployment_id(
        pool: &PgPool,
        deployment_id: &str,
    ) -> Result<Option<ExecutionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM executions WHERE deployment_id = $1");
        sqlx::query_as::<_, ExecutionRow>(&query)
            .bind(deployment_id)
            .fetch_optional(pool)
            .await
    }

    /// Write a reconciled status and reset the miss counter.
    ///
    /// `ended_at` is only written when provided. Returns the number of rows
    /// changed; zero means the row was missing or no longer reconcilable.
    pub async fn update_status(
        pool: &PgPool,
        deployment_id: &str,
        status: ExecutionStatus,
        ended_at: Option<Timestamp>,
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "UPDATE executions \
             SET status_id = $3, ended_at = COALESCE($4, ended_at), \
                 missed_lookups = 0, updated_at = NOW() \
             WHERE deployment_id = $2 AND {RECONCILABLE}"
        );
        let result = sqlx::query(&query)
            .bind(terminal_ids())
            .bind(deployment_id)
            .bind(status.id())
            .bind(ended_at)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Increment the consecutive-miss counter.
    pub async fn record_missed_lookup(
        pool: &PgPool,
        deployment_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "UPDATE executions \
             SET missed_lookups = missed_lookups + 1, updated_at = NOW() \
             WHERE deployment_id = $2 AND {RECONCILABLE}"
        );
        let result = sqlx::query(&query)
            .bind(terminal_ids())
            .bind(deployment_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Mark every reconcilable row started before `started_before` as
    /// `UNKNOWN`, ended at `now`.
    pub async fn expire_stale(
        pool: &PgPool,
        started_before: Timestamp,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "UPDATE executions \
             SET status_id = $2, ended_at = $3, updated_at = NOW() \
             WHERE started_at < $4 AND {RECONCILABLE}"
        );
        let result = sqlx::query(&query)
            .bind(terminal_ids())
            .bind(ExecutionStatus::Unknown.id())
            .bind(now)
            .bind(started_before)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Record an out-of-band completion callback.
    ///
    /// Once set, reconciliation leaves the row alone.
    pub async fn mark_callback_received(
        pool: &PgPool,
        deployment_id: &str,
        status: ExecutionStatus,
        ended_at: Option<Timestamp>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE executions \
             SET callback_received = TRUE, status_id = $2, \
                 ended_at = COALESCE($3, ended_at), updated_at = NOW() \
             WHERE deployment_id = $1",
        )
        .bind(deployment_id)
        .bind(status.id())
        .bind(ended_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn terminal_ids() -> Vec<StatusId> {
    ExecutionStatus::terminal_ids()
}
