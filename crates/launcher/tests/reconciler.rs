//! Reconciliation cycle behaviour against in-memory collaborators.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};

use common::{in_flight, reconciler_config, remote, FakeFleet, FakeStore};
use fleetline_core::error::CoreError;
use fleetline_core::execution::ExecutionRecord;
use fleetline_core::status::ExecutionStatus;
use fleetline_launcher::config::ReconcilerConfig;
use fleetline_launcher::Reconciler;

const DWELL: Duration = Duration::from_secs(5 * 60);

fn reconciler(
    records: Vec<ExecutionRecord>,
    config: ReconcilerConfig,
) -> (Arc<FakeStore>, Arc<FakeFleet>, Reconciler) {
    let store = Arc::new(FakeStore::with_records(records));
    let fleet = Arc::new(FakeFleet::default());
    let reconciler = Reconciler::new(store.clone(), fleet.clone(), config);
    (store, fleet, reconciler)
}

fn minutes(n: i64) -> chrono::Duration {
    chrono::Duration::minutes(n)
}

// ---------------------------------------------------------------------------
// Test: lost records
// ---------------------------------------------------------------------------

#[tokio::test]
async fn record_missing_past_the_dwell_time_becomes_unknown() {
    let (store, fleet, reconciler) = reconciler(
        vec![
            in_flight("a", minutes(10)),
            in_flight("b", minutes(10)),
            in_flight("c", minutes(10)),
        ],
        reconciler_config(DWELL),
    );
    fleet.set_statuses(vec![
        remote("a", "RUNNING", None),
        remote("b", "COMPLETED", Some("2024-05-01T10:00:00Z")),
    ]);

    let summary = reconciler.run_cycle().await.unwrap();

    assert_eq!(summary.in_flight, 3);
    assert_eq!(summary.lost, 1);

    let lost = store.record("c");
    assert_eq!(lost.status, ExecutionStatus::Unknown);
    assert!(lost.ended_at.is_some());

    let finished = store.record("b");
    assert_eq!(finished.status, ExecutionStatus::Completed);
    assert_eq!(
        finished.ended_at,
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn young_missing_record_is_left_running() {
    let (store, fleet, reconciler) = reconciler(
        vec![in_flight("a", minutes(10)), in_flight("fresh", minutes(1))],
        reconciler_config(DWELL),
    );
    fleet.set_statuses(vec![remote("a", "RUNNING", None)]);

    let summary = reconciler.run_cycle().await.unwrap();

    assert_eq!(summary.lost, 0);
    let fresh = store.record("fresh");
    assert_eq!(fresh.status, ExecutionStatus::Running);
    assert_eq!(fresh.ended_at, None);
}

#[tokio::test]
async fn lost_record_needs_the_configured_number_of_misses() {
    let mut config = reconciler_config(DWELL);
    config.lost_max_misses = 3;
    let (store, fleet, reconciler) = reconciler(vec![in_flight("gone", minutes(30))], config);
    fleet.set_statuses(Vec::new());

    reconciler.run_cycle().await.unwrap();
    reconciler.run_cycle().await.unwrap();
    let record = store.record("gone");
    assert_eq!(record.status, ExecutionStatus::Running);
    assert_eq!(record.missed_lookups, 2);

    let summary = reconciler.run_cycle().await.unwrap();
    assert_eq!(summary.lost, 1);
    assert_eq!(store.record("gone").status, ExecutionStatus::Unknown);
}

#[tokio::test]
async fn reported_record_resets_its_miss_counter() {
    let mut config = reconciler_config(DWELL);
    config.lost_max_misses = 3;
    let (store, fleet, reconciler) = reconciler(vec![in_flight("flaky", minutes(30))], config);

    fleet.set_statuses(Vec::new());
    reconciler.run_cycle().await.unwrap();
    assert_eq!(store.record("flaky").missed_lookups, 1);

    fleet.set_statuses(vec![remote("flaky", "RUNNING", None)]);
    reconciler.run_cycle().await.unwrap();
    assert_eq!(store.record("flaky").missed_lookups, 0);
}

// ---------------------------------------------------------------------------
// Test: write guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn callback_confirmed_record_is_never_touched() {
    let mut confirmed = in_flight("cb", minutes(30));
    confirmed.callback_received = true;
    let (store, fleet, reconciler) =
        reconciler(vec![confirmed, in_flight("other", minutes(1))], reconciler_config(DWELL));
    fleet.set_statuses(vec![
        remote("cb", "RUN_FAILED", Some("2024-05-01T10:00:00Z")),
        remote("other", "RUNNING", None),
    ]);

    reconciler.run_cycle().await.unwrap();

    let record = store.record("cb");
    assert_eq!(record.status, ExecutionStatus::Running);
    assert_eq!(record.ended_at, None);
    assert!(!fleet.status_requests.lock().unwrap()[0].contains(&"cb".to_string()));
}

#[tokio::test]
async fn terminal_record_is_never_regressed() {
    let mut done = in_flight("done", minutes(30));
    done.status = ExecutionStatus::Completed;
    let (store, fleet, reconciler) =
        reconciler(vec![done, in_flight("live", minutes(1))], reconciler_config(DWELL));
    fleet.set_statuses(vec![
        remote("done", "RUNNING", None),
        remote("live", "RUNNING", None),
    ]);

    reconciler.run_cycle().await.unwrap();

    assert_eq!(store.record("done").status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn failed_lookup_writes_nothing() {
    let (store, fleet, reconciler) = reconciler(
        vec![in_flight("a", minutes(30)), in_flight("b", minutes(30))],
        reconciler_config(DWELL),
    );
    fleet.fail_statuses();

    let result = reconciler.run_cycle().await;

    assert_matches!(result, Err(CoreError::Remote(_)));
    assert_eq!(store.status_writes.load(Ordering::SeqCst), 0);
    assert!(store
        .records()
        .iter()
        .all(|r| r.status == ExecutionStatus::Running && r.missed_lookups == 0));
}

#[tokio::test]
async fn nothing_in_flight_skips_the_lookup() {
    let (_store, fleet, reconciler) = reconciler(Vec::new(), reconciler_config(DWELL));

    let summary = reconciler.run_cycle().await.unwrap();

    assert_eq!(summary.in_flight, 0);
    assert!(fleet.status_requests.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: status normalization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_heartbeat_is_written_as_running() {
    let mut queued = in_flight("q", minutes(2));
    queued.status = ExecutionStatus::Queued;
    let (store, fleet, reconciler) = reconciler(vec![queued], reconciler_config(DWELL));
    fleet.set_statuses(vec![remote("q", "UPDATE", None)]);

    let summary = reconciler.run_cycle().await.unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(store.record("q").status, ExecutionStatus::Running);
}

#[tokio::test]
async fn unrecognized_status_is_skipped_but_not_lost() {
    let (store, fleet, reconciler) =
        reconciler(vec![in_flight("d", minutes(30))], reconciler_config(DWELL));
    fleet.set_statuses(vec![remote("d", "DEPLOYED", None)]);

    let summary = reconciler.run_cycle().await.unwrap();

    assert_eq!(summary.unrecognized, 1);
    assert_eq!(summary.lost, 0);
    assert_eq!(store.record("d").status, ExecutionStatus::Running);
    assert_eq!(store.status_writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn epoch_sentinel_end_time_is_left_unset() {
    let (store, fleet, reconciler) =
        reconciler(vec![in_flight("x", minutes(30))], reconciler_config(DWELL));
    fleet.set_statuses(vec![remote("x", "RUN_FAILED", Some("1970-01-01T00:00:00Z"))]);

    reconciler.run_cycle().await.unwrap();

    let record = store.record("x");
    assert_eq!(record.status, ExecutionStatus::RunFailed);
    assert_eq!(record.ended_at, None);
}

#[tokio::test]
async fn end_time_ignored_for_open_statuses() {
    let (store, fleet, reconciler) =
        reconciler(vec![in_flight("p", minutes(30))], reconciler_config(DWELL));
    fleet.set_statuses(vec![remote("p", "RUN_PAUSED", Some("2024-05-01T10:00:00Z"))]);

    reconciler.run_cycle().await.unwrap();

    let record = store.record("p");
    assert_eq!(record.status, ExecutionStatus::RunPaused);
    assert_eq!(record.ended_at, None);
}

#[tokio::test]
async fn first_reported_status_wins_for_duplicate_ids() {
    let (store, fleet, reconciler) =
        reconciler(vec![in_flight("dup", minutes(30))], reconciler_config(DWELL));
    fleet.set_statuses(vec![
        remote("dup", "COMPLETED", Some("2024-05-01T10:00:00Z")),
        remote("dup", "RUNNING", None),
    ]);

    reconciler.run_cycle().await.unwrap();

    assert_eq!(store.record("dup").status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn unrequested_ids_in_the_response_are_ignored() {
    let (store, fleet, reconciler) =
        reconciler(vec![in_flight("mine", minutes(1))], reconciler_config(DWELL));
    fleet.set_statuses(vec![
        remote("mine", "RUNNING", None),
        remote("someone-else", "COMPLETED", None),
    ]);

    let summary = reconciler.run_cycle().await.unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(store.records().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: stale expiry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_records_are_expired_after_a_successful_cycle() {
    let mut config = reconciler_config(DWELL);
    config.stale_after = Some(Duration::from_secs(30 * 24 * 3600));
    let (store, fleet, reconciler) = reconciler(
        vec![
            in_flight("ancient", chrono::Duration::days(45)),
            in_flight("recent", minutes(2)),
        ],
        config,
    );
    // The ancient record keeps being reported as running.
    fleet.set_statuses(vec![
        remote("ancient", "RUNNING", None),
        remote("recent", "RUNNING", None),
    ]);

    let summary = reconciler.run_cycle().await.unwrap();

    assert_eq!(summary.expired, 1);
    assert_eq!(store.record("ancient").status, ExecutionStatus::Unknown);
    assert_eq!(store.record("recent").status, ExecutionStatus::Running);
}
