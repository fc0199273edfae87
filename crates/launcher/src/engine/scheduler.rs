//! Periodic driver for the dispatch, reconciliation and sync cycles.
//!
//! Each cycle runs on its own interval in its own task. A panic inside one
//! cycle is caught and logged; the loop carries on with the next tick.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::engine::dispatcher::LaunchDispatcher;
use crate::engine::reconciler::Reconciler;
use crate::engine::sync::SyncCycle;
use crate::shutdown::ShutdownCoordinator;

/// Cycle scheduler.
pub struct CycleScheduler {
    dispatcher: Arc<LaunchDispatcher>,
    reconciler: Arc<Reconciler>,
    sync: Option<Arc<SyncCycle>>,
    config: SchedulerConfig,
    coordinator: Arc<ShutdownCoordinator>,
}

impl CycleScheduler {
    /// Create a scheduler. `sync` is ignored when the config disables it.
    pub fn new(
        dispatcher: Arc<LaunchDispatcher>,
        reconciler: Arc<Reconciler>,
        sync: Option<Arc<SyncCycle>>,
        config: SchedulerConfig,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Self {
        let sync = sync.filter(|_| config.sync_enabled);
        Self {
            dispatcher,
            reconciler,
            sync,
            config,
            coordinator,
        }
    }

    /// Run every cycle once, then spawn the periodic loops.
    ///
    /// The loops are tracked by the shutdown coordinator. Nothing is spawned
    /// if shutdown was requested during the initial pass.
    pub async fn start(&self) {
        let cancel = self.coordinator.child_token();
        self.initial_pass(&cancel).await;
        if cancel.is_cancelled() {
            tracing::info!("Shutdown requested during initial pass, periodic loops not started");
            return;
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        self.spawn_loop("dispatch", self.config.launch_interval, move |cancel| {
            let dispatcher = Arc::clone(&dispatcher);
            async move {
                dispatcher.run_cycle(&cancel).await;
            }
        });

        let reconciler = Arc::clone(&self.reconciler);
        self.spawn_loop("reconcile", self.config.reconcile_interval, move |_| {
            let reconciler = Arc::clone(&reconciler);
            async move {
                if let Err(e) = reconciler.run_cycle().await {
                    tracing::warn!(error = %e, "Reconciliation cycle abandoned");
                }
            }
        });

        if let Some(sync) = &self.sync {
            let sync = Arc::clone(sync);
            self.spawn_loop("sync", self.config.sync_interval, move |_| {
                let sync = Arc::clone(&sync);
                async move {
                    // Failures are logged and alerted by the cycle itself.
                    let _ = sync.run_cycle().await;
                }
            });
        }

        tracing::info!(
            launch_interval_secs = self.config.launch_interval.as_secs(),
            reconcile_interval_secs = self.config.reconcile_interval.as_secs(),
            sync_interval_secs = self.config.sync_interval.as_secs(),
            sync_enabled = self.sync.is_some(),
            "Cycle scheduler started"
        );
    }

    /// Sync first so dispatch sees fresh targets, then reconcile, then
    /// dispatch.
    async fn initial_pass(&self, cancel: &CancellationToken) {
        tracing::info!("Running initial cycles");

        if let Some(sync) = &self.sync {
            let _ = guarded("sync", sync.run_cycle()).await;
        }
        if cancel.is_cancelled() {
            return;
        }

        if let Some(Err(e)) = guarded("reconcile", self.reconciler.run_cycle()).await {
            tracing::warn!(error = %e, "Initial reconciliation abandoned");
        }
        if cancel.is_cancelled() {
            return;
        }

        guarded("dispatch", self.dispatcher.run_cycle(cancel)).await;
    }

    fn spawn_loop<F, Fut>(&self, name: &'static str, period: Duration, mut cycle: F)
    where
        F: FnMut(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_secs(1));
        let cancel = self.coordinator.child_token();
        let handle = tokio::spawn(async move {
            // The initial pass already covered the first tick.
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!(cycle = name, "Cycle loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        guarded(name, cycle(cancel.clone())).await;
                    }
                }
            }
        });
        self.coordinator.track(handle);
    }
}

/// Await one cycle, containing any panic it raises.
async fn guarded<T>(name: &'static str, cycle: impl Future<Output = T>) -> Option<T> {
    match AssertUnwindSafe(cycle).catch_unwind().await {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::error!(cycle = name, "Cycle panicked");
            None
        }
    }
}
