//! Integration tests for the execution repository and job store.
//!
//! Require a reachable PostgreSQL via `DATABASE_URL`; run with
//! `cargo test -p fleetline-db -- --ignored`.

use chrono::{Duration, TimeZone, Utc};
use fleetline_core::execution::{DispatchRequest, ExecutionRecord, TargetSnapshot};
use fleetline_core::ports::JobStore;
use fleetline_core::status::ExecutionStatus;
use fleetline_db::repositories::ExecutionRepo;
use fleetline_db::PgJobStore;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn request() -> DispatchRequest {
    DispatchRequest {
        job_id: 7,
        target_id: 11,
        principal_id: 13,
    }
}

fn record(deployment_id: &str, minutes_ago: i64) -> ExecutionRecord {
    let now = Utc::now();
    ExecutionRecord::dispatched(
        deployment_id.to_string(),
        request(),
        None,
        now - Duration::minutes(minutes_ago),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn inserted_record_is_in_flight(pool: PgPool) {
    let store = PgJobStore::new(pool);
    store.insert_execution(&record("dep-a", 1)).await.unwrap();

    let in_flight = store.fetch_in_flight().await.unwrap();
    assert_eq!(in_flight.len(), 1);
    assert_eq!(in_flight[0].deployment_id, "dep-a");
    assert_eq!(in_flight[0].status, ExecutionStatus::Running);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_deployment_id_is_rejected(pool: PgPool) {
    let store = PgJobStore::new(pool);
    store.insert_execution(&record("dep-a", 1)).await.unwrap();
    assert!(store.insert_execution(&record("dep-a", 1)).await.is_err());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn terminal_update_leaves_in_flight_set(pool: PgPool) {
    let store = PgJobStore::new(pool.clone());
    store.insert_execution(&record("dep-a", 5)).await.unwrap();

    let ended = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let changed = store
        .update_execution_status("dep-a", ExecutionStatus::Completed, Some(ended))
        .await
        .unwrap();
    assert_eq!(changed, 1);
    assert!(store.fetch_in_flight().await.unwrap().is_empty());

    let row = ExecutionRepo::find_by_deployment_id(&pool, "dep-a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.ended_at, Some(ended));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn terminal_rows_are_never_rewritten(pool: PgPool) {
    let store = PgJobStore::new(pool);
    store.insert_execution(&record("dep-a", 5)).await.unwrap();
    store
        .update_execution_status("dep-a", ExecutionStatus::RunFailed, None)
        .await
        .unwrap();

    let changed = store
        .update_execution_status("dep-a", ExecutionStatus::Running, None)
        .await
        .unwrap();
    assert_eq!(changed, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn callback_rows_are_never_rewritten(pool: PgPool) {
    let store = PgJobStore::new(pool.clone());
    store.insert_execution(&record("dep-a", 5)).await.unwrap();
    ExecutionRepo::mark_callback_received(&pool, "dep-a", ExecutionStatus::Running, None)
        .await
        .unwrap();

    let changed = store
        .update_execution_status("dep-a", ExecutionStatus::Unknown, Some(Utc::now()))
        .await
        .unwrap();
    assert_eq!(changed, 0);
    assert_eq!(store.record_missed_lookup("dep-a").await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn missed_lookups_accumulate_and_reset(pool: PgPool) {
    let store = PgJobStore::new(pool);
    store.insert_execution(&record("dep-a", 5)).await.unwrap();

    store.record_missed_lookup("dep-a").await.unwrap();
    store.record_missed_lookup("dep-a").await.unwrap();
    assert_eq!(store.fetch_in_flight().await.unwrap()[0].missed_lookups, 2);

    store
        .update_execution_status("dep-a", ExecutionStatus::Running, None)
        .await
        .unwrap();
    assert_eq!(store.fetch_in_flight().await.unwrap()[0].missed_lookups, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn expire_stale_only_touches_old_rows(pool: PgPool) {
    let store = PgJobStore::new(pool);
    store
        .insert_execution(&record("old", 60 * 24 * 40))
        .await
        .unwrap();
    store.insert_execution(&record("fresh", 5)).await.unwrap();

    let now = Utc::now();
    let expired = store
        .expire_stale(now - Duration::days(30), now)
        .await
        .unwrap();
    assert_eq!(expired, 1);

    let in_flight = store.fetch_in_flight().await.unwrap();
    assert_eq!(in_flight.len(), 1);
    assert_eq!(in_flight[0].deployment_id, "fresh");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn merge_targets_upserts(pool: PgPool) {
    let store = PgJobStore::new(pool.clone());
    let mut snapshot = TargetSnapshot {
        target_id: 11,
        name: "runner-01".into(),
        principal_id: Some(13),
        principal_name: Some("svc-runner".into()),
        license: "ATTENDEDRPA".into(),
        active: true,
    };
    assert_eq!(store.merge_targets(&[snapshot.clone()]).await.unwrap(), 1);

    snapshot.license = "RUNTIME".into();
    snapshot.active = false;
    store.merge_targets(&[snapshot]).await.unwrap();

    let (license, active): (String, bool) =
        sqlx::query_as("SELECT license, active FROM targets WHERE target_id = 11")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(license, "RUNTIME");
    assert!(!active);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn eligibility_excludes_busy_targets(pool: PgPool) {
    let store = PgJobStore::new(pool.clone());
    sqlx::query("INSERT INTO automations (job_id, name) VALUES (7, 'P_Invoices')")
        .execute(&pool)
        .await
        .unwrap();
    store
        .merge_targets(&[TargetSnapshot {
            target_id: 11,
            name: "runner-01".into(),
            principal_id: Some(13),
            principal_name: None,
            license: "RUNTIME".into(),
            active: true,
        }])
        .await
        .unwrap();
    sqlx::query("INSERT INTO assignments (job_id, target_id) VALUES (7, 11)")
        .execute(&pool)
        .await
        .unwrap();

    let jobs = store.fetch_eligible_jobs().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].principal_id, Some(13));

    store.insert_execution(&record("dep-a", 1)).await.unwrap();
    assert!(store.fetch_eligible_jobs().await.unwrap().is_empty());
}
