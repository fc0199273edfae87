//! One-way lifecycle of the launcher: `Running -> ShuttingDown -> Stopped`.
//!
//! The coordinator owns the master [`CancellationToken`]. Cycles receive
//! child tokens and observe cancellation between units of work; the
//! coordinator then gives tracked tasks a fixed grace period to finish
//! before aborting whatever is left.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    ShuttingDown,
    Stopped,
}

const RUNNING: u8 = 0;
const SHUTTING_DOWN: u8 = 1;
const STOPPED: u8 = 2;

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            RUNNING => LifecycleState::Running,
            SHUTTING_DOWN => LifecycleState::ShuttingDown,
            _ => LifecycleState::Stopped,
        }
    }
}

pub struct ShutdownCoordinator {
    state: AtomicU8,
    token: CancellationToken,
    grace: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownCoordinator {
    pub fn new(grace: Duration) -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
            token: CancellationToken::new(),
            grace,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// A token cancelled when shutdown is requested.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Keep a task so shutdown can wait for it.
    pub fn track(&self, handle: JoinHandle<()>) {
        self.lock_tasks().push(handle);
    }

    /// Move to `ShuttingDown` and cancel every cycle.
    ///
    /// Returns `false` if shutdown had already been requested, in which
    /// case nothing happens.
    pub fn request_shutdown(&self) -> bool {
        let transitioned = self
            .state
            .compare_exchange(RUNNING, SHUTTING_DOWN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if transitioned {
            tracing::info!("Shutdown requested, cancelling cycles");
            self.token.cancel();
        }
        transitioned
    }

    /// Request shutdown, wait up to the grace period for tracked tasks,
    /// abort stragglers and move to `Stopped`.
    ///
    /// Idempotent: a second call returns `false` immediately.
    pub async fn shutdown(&self) -> bool {
        if !self.request_shutdown() {
            tracing::debug!(state = ?self.state(), "Shutdown already in progress");
            return false;
        }

        let handles = std::mem::take(&mut *self.lock_tasks());
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let count = handles.len();

        match tokio::time::timeout(self.grace, futures::future::join_all(handles)).await {
            Ok(_) => tracing::info!(tasks = count, "All cycles stopped within grace period"),
            Err(_) => {
                let pending = aborts.iter().filter(|a| !a.is_finished()).count();
                tracing::warn!(
                    pending,
                    grace_ms = self.grace.as_millis() as u64,
                    "Grace period elapsed, aborting remaining cycles"
                );
                for abort in &aborts {
                    abort.abort();
                }
            }
        }

        self.state.store(STOPPED, Ordering::Release);
        tracing::info!("Launcher stopped");
        true
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
