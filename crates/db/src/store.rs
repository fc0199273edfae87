//! [`JobStore`] implementation over a PostgreSQL pool.

use async_trait::async_trait;
use fleetline_core::error::CoreError;
use fleetline_core::execution::{ExecutionRecord, Job, RemoteAutomation, TargetSnapshot};
use fleetline_core::ports::JobStore;
use fleetline_core::status::ExecutionStatus;
use fleetline_core::types::Timestamp;

use crate::repositories::{AutomationRepo, CandidateRepo, ExecutionRepo, TargetRepo};
use crate::DbPool;

/// The production job store.
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    /// Create a store over an already migrated pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn store_err(e: sqlx::Error) -> CoreError {
    CoreError::Store(e.to_string())
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn fetch_eligible_jobs(&self) -> Result<Vec<Job>, CoreError> {
        let rows = CandidateRepo::list_eligible(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(Job::from).collect())
    }

    async fn fetch_in_flight(&self) -> Result<Vec<ExecutionRecord>, CoreError> {
        let rows = ExecutionRepo::list_in_flight(&self.pool)
            .await
            .map_err(store_err)?;
        let records = rows
            .into_iter()
            .filter_map(|row| match ExecutionRecord::try_from(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable execution row");
                    None
                }
            })
            .collect();
        Ok(records)
    }

    async fn insert_execution(&self, record: &ExecutionRecord) -> Result<(), CoreError> {
        ExecutionRepo::insert(&self.pool, record)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn update_execution_status(
        &self,
        deployment_id: &str,
        status: ExecutionStatus,
        ended_at: Option<Timestamp>,
    ) -> Result<u64, CoreError> {
        ExecutionRepo::update_status(&self.pool, deployment_id, status, ended_at)
            .await
            .map_err(store_err)
    }

    async fn record_missed_lookup(&self, deployment_id: &str) -> Result<u64, CoreError> {
        ExecutionRepo::record_missed_lookup(&self.pool, deployment_id)
            .await
            .map_err(store_err)
    }

    async fn expire_stale(
        &self,
        started_before: Timestamp,
        now: Timestamp,
    ) -> Result<u64, CoreError> {
        ExecutionRepo::expire_stale(&self.pool, started_before, now)
            .await
            .map_err(store_err)
    }

    async fn merge_targets(&self, targets: &[TargetSnapshot]) -> Result<u64, CoreError> {
        TargetRepo::merge(&self.pool, targets)
            .await
            .map_err(store_err)
    }

    async fn merge_automations(
        &self,
        automations: &[RemoteAutomation],
    ) -> Result<u64, CoreError> {
        AutomationRepo::merge(&self.pool, automations)
            .await
            .map_err(store_err)
    }
}
