//! Reads dispatch candidates from the `dispatch_candidates()` function.
//!
//! Eligibility rules live in the database so they can be changed without
//! redeploying the launcher.

use sqlx::PgPool;

use crate::models::job::CandidateRow;

const COLUMNS: &str = "job_id, target_id, principal_id, scheduled_at, input_override";

pub struct CandidateRepo;

impl CandidateRepo {
    /// Every candidate the eligibility function currently answers.
    pub async fn list_eligible(pool: &PgPool) -> Result<Vec<CandidateRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM dispatch_candidates()");
        sqlx::query_as::<_, CandidateRow>(&query)
            .fetch_all(pool)
            .await
    }
}
