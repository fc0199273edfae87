//! Launch dispatcher: one dispatch cycle per call.
//!
//! A cycle fetches eligible jobs, deploys them with bounded concurrency,
//! retries transient failures once after a delay and reports every failure
//! of the cycle to the notifier as a single batch. An execution record is
//! only written after the fleet has returned its deployment id.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveTime, Utc};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use fleetline_core::execution::{Alert, ExecutionRecord, Job};
use fleetline_core::ports::{DeployError, JobStore, Notifier, RemoteFleet};

use crate::config::DispatcherConfig;
use crate::engine::outcome::{DispatchOutcome, DispatchSummary};
use crate::engine::streaks::TargetFailureTracker;

/// Launch dispatcher, shared by the scheduler's initial pass and its loop.
pub struct LaunchDispatcher {
    store: Arc<dyn JobStore>,
    fleet: Arc<dyn RemoteFleet>,
    notifier: Arc<dyn Notifier>,
    config: DispatcherConfig,
    /// Whether the previous cycle was inside the pause window.
    paused: AtomicBool,
    streaks: TargetFailureTracker,
}

impl LaunchDispatcher {
    /// Create a dispatcher. The failure streak tracker starts empty.
    pub fn new(
        store: Arc<dyn JobStore>,
        fleet: Arc<dyn RemoteFleet>,
        notifier: Arc<dyn Notifier>,
        config: DispatcherConfig,
    ) -> Self {
        let streaks = TargetFailureTracker::new(
            config.target_failure_alert_threshold,
            config.target_alert_cooldown,
        );
        Self {
            store,
            fleet,
            notifier,
            config,
            paused: AtomicBool::new(false),
            streaks,
        }
    }

    /// Run one cycle against the local wall clock.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> DispatchSummary {
        self.run_cycle_at(Local::now().time(), cancel).await
    }

    /// Run one cycle as if the local time of day were `time_of_day`.
    pub async fn run_cycle_at(
        &self,
        time_of_day: NaiveTime,
        cancel: &CancellationToken,
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        if self.check_pause_window(time_of_day) {
            summary.paused = true;
            return summary;
        }

        let jobs = match self.store.fetch_eligible_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch eligible jobs");
                return summary;
            }
        };
        summary.candidates = jobs.len();
        if jobs.is_empty() {
            tracing::debug!("No eligible jobs");
            return summary;
        }
        tracing::info!(candidates = jobs.len(), "Dispatch cycle started");

        let first = self.dispatch_pass(jobs, cancel).await;
        let (retry, settled): (Vec<_>, Vec<_>) =
            first.into_iter().partition(|(_, outcome)| outcome.is_retriable());
        let mut finished = settled;

        if !retry.is_empty() {
            let retry_jobs: Vec<Job> = retry.into_iter().map(|(job, _)| job).collect();
            if self.wait_retry_delay(cancel, retry_jobs.len()).await {
                summary.retried = retry_jobs.len();
                finished.extend(self.dispatch_pass(retry_jobs, cancel).await);
            } else {
                summary.skipped += retry_jobs.len();
            }
        }

        let now = Instant::now();
        let mut alerts = Vec::new();
        for (job, outcome) in &finished {
            match outcome {
                DispatchOutcome::Launched { .. } => summary.launched += 1,
                DispatchOutcome::SkippedShutdown => summary.skipped += 1,
                _ => {}
            }
            if let Some(detail) = outcome.failure(job) {
                summary.failures.push(detail);
            }
            if let Some(alert) = self.track_target(job, outcome, now) {
                alerts.push(alert);
            }
        }

        tracing::info!(
            launched = summary.launched,
            retried = summary.retried,
            failed = summary.failures.len(),
            skipped = summary.skipped,
            "Dispatch cycle finished"
        );

        if !summary.failures.is_empty() {
            if let Err(e) = self.notifier.notify_failures(&summary.failures).await {
                tracing::error!(error = %e, failures = summary.failures.len(), "Failed to send failure notification");
            }
        }
        for alert in alerts {
            if let Err(e) = self.notifier.alert(&alert).await {
                tracing::error!(error = %e, subject = %alert.subject, "Failed to send alert");
            }
        }

        summary
    }

    /// Evaluate the pause window, logging only when it is entered or left.
    fn check_pause_window(&self, time_of_day: NaiveTime) -> bool {
        let inside = self.config.pause_window.contains(time_of_day);
        let was_inside = self.paused.swap(inside, Ordering::AcqRel);
        match (was_inside, inside) {
            (false, true) => tracing::info!(
                window = %self.config.pause_window,
                "Entering pause window, dispatch suspended"
            ),
            (true, false) => tracing::info!(
                window = %self.config.pause_window,
                "Leaving pause window, dispatch resumed"
            ),
            _ => {}
        }
        inside
    }

    /// Sleep for the retry delay. Returns `false` if shutdown interrupted
    /// the wait.
    async fn wait_retry_delay(&self, cancel: &CancellationToken, pending: usize) -> bool {
        tracing::info!(
            pending,
            delay_secs = self.config.retry_delay.as_secs(),
            "Retrying transient failures after delay"
        );
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::warn!(pending, "Shutdown during retry delay, retry pass skipped");
                false
            }
            _ = tokio::time::sleep(self.config.retry_delay) => true,
        }
    }

    /// Deploy every job with at most `max_concurrency` calls in flight.
    async fn dispatch_pass(
        &self,
        jobs: Vec<Job>,
        cancel: &CancellationToken,
    ) -> Vec<(Job, DispatchOutcome)> {
        stream::iter(jobs)
            .map(|job| async move {
                let outcome = self.dispatch_one(&job, cancel).await;
                (job, outcome)
            })
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await
    }

    async fn dispatch_one(&self, job: &Job, cancel: &CancellationToken) -> DispatchOutcome {
        if cancel.is_cancelled() {
            return DispatchOutcome::SkippedShutdown;
        }

        let request = match job.dispatch_request() {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(job_id = ?job.job_id, target_id = ?job.target_id, %error, "Invalid candidate job");
                return DispatchOutcome::InvalidData { error };
            }
        };
        let input = job
            .input_override
            .as_ref()
            .unwrap_or(&self.config.input_template);

        let deployment_id = match self.fleet.deploy(&request, input).await {
            Ok(id) => id,
            Err(DeployError::Transient(error)) => {
                tracing::warn!(job_id = request.job_id, target_id = request.target_id, %error, "Transient deploy failure");
                return DispatchOutcome::Retriable { error };
            }
            Err(DeployError::Permanent(error)) => {
                tracing::error!(job_id = request.job_id, target_id = request.target_id, %error, "Deploy rejected");
                return DispatchOutcome::Permanent { error };
            }
        };

        let record =
            ExecutionRecord::dispatched(deployment_id.clone(), request, job.scheduled_at, Utc::now());
        match self.store.insert_execution(&record).await {
            Ok(()) => {
                tracing::info!(
                    job_id = request.job_id,
                    target_id = request.target_id,
                    deployment_id = %deployment_id,
                    "Job launched"
                );
                DispatchOutcome::Launched { deployment_id }
            }
            Err(e) => {
                tracing::error!(
                    job_id = request.job_id,
                    target_id = request.target_id,
                    deployment_id = %deployment_id,
                    error = %e,
                    "Deployment running remotely but its execution record could not be written"
                );
                DispatchOutcome::Untracked {
                    deployment_id,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Update the target's failure streak from its final outcome.
    fn track_target(&self, job: &Job, outcome: &DispatchOutcome, now: Instant) -> Option<Alert> {
        let target_id = job.target_id?;
        match outcome {
            DispatchOutcome::Launched { .. } => {
                self.streaks.record_success(target_id);
                None
            }
            DispatchOutcome::Retriable { error } => {
                let streak = self.streaks.record_failure(target_id, now)?;
                tracing::error!(target_id, streak, "Target keeps failing transiently");
                Some(Alert::critical(
                    format!("Target {target_id} failing persistently"),
                    format!(
                        "Dispatch to target {target_id} has failed transiently for {streak} \
                         consecutive cycles. Last error: {error}"
                    ),
                ))
            }
            _ => None,
        }
    }
}
