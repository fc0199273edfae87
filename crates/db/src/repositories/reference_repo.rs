//! Upserts for the reference tables refreshed by the sync cycle.

use fleetline_core::execution::{RemoteAutomation, TargetSnapshot};
use sqlx::PgPool;

/// Persistence for execution targets.
pub struct TargetRepo;

impl TargetRepo {
    /// Insert or refresh each snapshot inside one transaction.
    ///
    /// Targets absent from `targets` are left untouched. Returns the number
    /// of rows written.
    pub async fn merge(pool: &PgPool, targets: &[TargetSnapshot]) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut written = 0;
        for target in targets {
            let result = sqlx::query(
                "INSERT INTO targets (target_id, name, principal_id, principal_name, license, active) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (target_id) DO UPDATE SET \
                     name = EXCLUDED.name, \
                     principal_id = EXCLUDED.principal_id, \
                     principal_name = EXCLUDED.principal_name, \
                     license = EXCLUDED.license, \
                     active = EXCLUDED.active, \
                     updated_at = NOW()",
            )
            .bind(target.target_id)
            .bind(&target.name)
            .bind(target.principal_id)
            .bind(&target.principal_name)
            .bind(&target.license)
            .bind(target.active)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }
        tx.commit().await?;
        Ok(written)
    }
}

/// Persistence for deployable automations.
pub struct AutomationRepo;

impl AutomationRepo {
    pub async fn merge(
        pool: &PgPool,
        automations: &[RemoteAutomation],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut written = 0;
        for automation in automations {
            let result = sqlx::query(
                "INSERT INTO automations (job_id, name, description) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (job_id) DO UPDATE SET \
                     name = EXCLUDED.name, \
                     description = EXCLUDED.description, \
                     updated_at = NOW()",
            )
            .bind(automation.job_id)
            .bind(&automation.name)
            .bind(&automation.description)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }
        tx.commit().await?;
        Ok(written)
    }
}
