//! In-memory collaborators for engine tests.
//!
//! `FakeStore` applies the same guards as the PostgreSQL store so the
//! reconciliation properties can be checked without a database.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use fleetline_core::error::CoreError;
use fleetline_core::execution::{
    Alert, DispatchRequest, ExecutionRecord, FailureDetail, Job, RemoteAutomation,
    RemotePrincipal, RemoteStatus, RemoteTarget, TargetSnapshot,
};
use fleetline_core::pause_window::PauseWindow;
use fleetline_core::ports::{DeployError, JobStore, Notifier, RemoteFleet};
use fleetline_core::status::ExecutionStatus;
use fleetline_core::types::{DbId, Timestamp};
use fleetline_launcher::config::{DispatcherConfig, ReconcilerConfig, SchedulerConfig};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn job(job_id: DbId, target_id: DbId) -> Job {
    Job {
        job_id: Some(job_id),
        target_id: Some(target_id),
        principal_id: Some(100 + target_id),
        scheduled_at: None,
        input_override: None,
    }
}

pub fn dispatcher_config() -> DispatcherConfig {
    DispatcherConfig {
        max_concurrency: 4,
        retry_delay: Duration::from_millis(10),
        input_template: json!({"mode": "default"}),
        pause_window: PauseWindow::default(),
        target_failure_alert_threshold: 0,
        target_alert_cooldown: Duration::from_secs(1800),
    }
}

pub fn reconciler_config(lost_min_age: Duration) -> ReconcilerConfig {
    ReconcilerConfig {
        lost_min_age,
        lost_max_misses: 1,
        stale_after: None,
    }
}

pub fn scheduler_config(interval: Duration) -> SchedulerConfig {
    SchedulerConfig {
        launch_interval: interval,
        reconcile_interval: interval,
        sync_interval: interval,
        sync_enabled: true,
        shutdown_grace: Duration::from_millis(500),
    }
}

/// A running record dispatched `age` ago.
pub fn in_flight(deployment_id: &str, age: chrono::Duration) -> ExecutionRecord {
    let request = DispatchRequest {
        job_id: 1,
        target_id: 2,
        principal_id: 3,
    };
    ExecutionRecord::dispatched(deployment_id.to_string(), request, None, Utc::now() - age)
}

pub fn remote(deployment_id: &str, status: &str, ended_at: Option<&str>) -> RemoteStatus {
    RemoteStatus {
        deployment_id: deployment_id.to_string(),
        status: status.to_string(),
        ended_at: ended_at.map(str::to_string),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

// ---------------------------------------------------------------------------
// FakeStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStore {
    pub candidates: Mutex<Vec<Job>>,
    pub records: Mutex<Vec<ExecutionRecord>>,
    pub targets: Mutex<Vec<TargetSnapshot>>,
    pub automations: Mutex<Vec<RemoteAutomation>>,
    pub fail_inserts: Mutex<bool>,
    pub fail_fetch: Mutex<bool>,
    pub eligible_calls: AtomicUsize,
    pub in_flight_calls: AtomicUsize,
    pub status_writes: AtomicUsize,
}

impl FakeStore {
    pub fn with_candidates(jobs: Vec<Job>) -> Self {
        let store = Self::default();
        *lock(&store.candidates) = jobs;
        store
    }

    pub fn with_records(records: Vec<ExecutionRecord>) -> Self {
        let store = Self::default();
        *lock(&store.records) = records;
        store
    }

    pub fn records(&self) -> Vec<ExecutionRecord> {
        lock(&self.records).clone()
    }

    pub fn record(&self, deployment_id: &str) -> ExecutionRecord {
        self.records()
            .into_iter()
            .find(|r| r.deployment_id == deployment_id)
            .unwrap()
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        *lock(&self.fail_inserts) = fail;
    }
}

#[async_trait]
impl JobStore for FakeStore {
    async fn fetch_eligible_jobs(&self) -> Result<Vec<Job>, CoreError> {
        self.eligible_calls.fetch_add(1, Ordering::SeqCst);
        if *lock(&self.fail_fetch) {
            return Err(CoreError::Store("connection refused".into()));
        }
        Ok(lock(&self.candidates).clone())
    }

    async fn fetch_in_flight(&self) -> Result<Vec<ExecutionRecord>, CoreError> {
        self.in_flight_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records()
            .into_iter()
            .filter(|r| !r.status.is_terminal())
            .collect())
    }

    async fn insert_execution(&self, record: &ExecutionRecord) -> Result<(), CoreError> {
        if *lock(&self.fail_inserts) {
            return Err(CoreError::Store("insert failed".into()));
        }
        let mut records = lock(&self.records);
        if records.iter().any(|r| r.deployment_id == record.deployment_id) {
            return Err(CoreError::Store("duplicate deployment id".into()));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn update_execution_status(
        &self,
        deployment_id: &str,
        status: ExecutionStatus,
        ended_at: Option<Timestamp>,
    ) -> Result<u64, CoreError> {
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        let mut records = lock(&self.records);
        let Some(record) = records
            .iter_mut()
            .find(|r| r.deployment_id == deployment_id && r.is_reconcilable())
        else {
            return Ok(0);
        };
        record.status = status;
        if ended_at.is_some() {
            record.ended_at = ended_at;
        }
        record.missed_lookups = 0;
        Ok(1)
    }

    async fn record_missed_lookup(&self, deployment_id: &str) -> Result<u64, CoreError> {
        let mut records = lock(&self.records);
        let Some(record) = records
            .iter_mut()
            .find(|r| r.deployment_id == deployment_id && r.is_reconcilable())
        else {
            return Ok(0);
        };
        record.missed_lookups += 1;
        Ok(1)
    }

    async fn expire_stale(
        &self,
        started_before: Timestamp,
        now: Timestamp,
    ) -> Result<u64, CoreError> {
        let mut expired = 0;
        for record in lock(&self.records).iter_mut() {
            let stale = record.started_at.is_some_and(|at| at < started_before);
            if record.is_reconcilable() && stale {
                record.status = ExecutionStatus::Unknown;
                record.ended_at = Some(now);
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn merge_targets(&self, targets: &[TargetSnapshot]) -> Result<u64, CoreError> {
        lock(&self.targets).extend_from_slice(targets);
        Ok(targets.len() as u64)
    }

    async fn merge_automations(
        &self,
        automations: &[RemoteAutomation],
    ) -> Result<u64, CoreError> {
        lock(&self.automations).extend_from_slice(automations);
        Ok(automations.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// FakeFleet
// ---------------------------------------------------------------------------

/// Scripted fleet. Deploys succeed unless a result was queued for the job.
#[derive(Default)]
pub struct FakeFleet {
    pub scripted: Mutex<HashMap<DbId, VecDeque<Result<String, DeployError>>>>,
    pub deploy_calls: Mutex<HashMap<DbId, usize>>,
    pub inputs: Mutex<HashMap<DbId, serde_json::Value>>,
    pub deploy_latency: Mutex<Option<Duration>>,
    pub statuses: Mutex<Option<Vec<RemoteStatus>>>,
    pub status_requests: Mutex<Vec<Vec<String>>>,
    pub remote_targets: Mutex<Vec<RemoteTarget>>,
    pub principals: Mutex<Vec<RemotePrincipal>>,
    pub remote_automations: Mutex<Vec<RemoteAutomation>>,
    pub fail_targets: Mutex<bool>,
    pub target_calls: AtomicUsize,
    active: AtomicUsize,
    pub peak_concurrency: AtomicUsize,
}

impl FakeFleet {
    pub fn script(&self, job_id: DbId, results: Vec<Result<String, DeployError>>) {
        lock(&self.scripted).insert(job_id, results.into());
    }

    pub fn deploy_calls(&self, job_id: DbId) -> usize {
        lock(&self.deploy_calls).get(&job_id).copied().unwrap_or(0)
    }

    pub fn total_deploy_calls(&self) -> usize {
        lock(&self.deploy_calls).values().sum()
    }

    pub fn input_for(&self, job_id: DbId) -> Option<serde_json::Value> {
        lock(&self.inputs).get(&job_id).cloned()
    }

    pub fn set_statuses(&self, statuses: Vec<RemoteStatus>) {
        *lock(&self.statuses) = Some(statuses);
    }

    /// Make every status lookup fail.
    pub fn fail_statuses(&self) {
        *lock(&self.statuses) = None;
    }

    pub fn set_deploy_latency(&self, latency: Duration) {
        *lock(&self.deploy_latency) = Some(latency);
    }
}

#[async_trait]
impl RemoteFleet for FakeFleet {
    async fn deploy(
        &self,
        request: &DispatchRequest,
        input: &serde_json::Value,
    ) -> Result<String, DeployError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_concurrency.fetch_max(active, Ordering::SeqCst);

        let latency = *lock(&self.deploy_latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let attempt = {
            let mut calls = lock(&self.deploy_calls);
            let count = calls.entry(request.job_id).or_insert(0);
            *count += 1;
            *count
        };
        lock(&self.inputs).insert(request.job_id, input.clone());
        let scripted = lock(&self.scripted)
            .get_mut(&request.job_id)
            .and_then(VecDeque::pop_front);

        self.active.fetch_sub(1, Ordering::SeqCst);
        scripted.unwrap_or_else(|| Ok(format!("dep-{}-{attempt}", request.job_id)))
    }

    async fn get_statuses(
        &self,
        deployment_ids: &[String],
    ) -> Result<Vec<RemoteStatus>, CoreError> {
        lock(&self.status_requests).push(deployment_ids.to_vec());
        lock(&self.statuses)
            .clone()
            .ok_or_else(|| CoreError::Remote("activity lookup timed out".into()))
    }

    async fn list_targets(&self) -> Result<Vec<RemoteTarget>, CoreError> {
        self.target_calls.fetch_add(1, Ordering::SeqCst);
        if *lock(&self.fail_targets) {
            return Err(CoreError::Remote("devices listing failed".into()));
        }
        Ok(lock(&self.remote_targets).clone())
    }

    async fn list_principals(
        &self,
        principal_ids: &[DbId],
    ) -> Result<Vec<RemotePrincipal>, CoreError> {
        Ok(lock(&self.principals)
            .iter()
            .filter(|p| principal_ids.contains(&p.principal_id))
            .cloned()
            .collect())
    }

    async fn list_automations(&self) -> Result<Vec<RemoteAutomation>, CoreError> {
        Ok(lock(&self.remote_automations).clone())
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub batches: Mutex<Vec<Vec<FailureDetail>>>,
    pub alerts: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    pub fn batches(&self) -> Vec<Vec<FailureDetail>> {
        lock(&self.batches).clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        lock(&self.alerts).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_failures(&self, batch: &[FailureDetail]) -> Result<(), CoreError> {
        lock(&self.batches).push(batch.to_vec());
        Ok(())
    }

    async fn alert(&self, alert: &Alert) -> Result<(), CoreError> {
        lock(&self.alerts).push(alert.clone());
        Ok(())
    }
}
