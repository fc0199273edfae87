use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetline_core::ports::{JobStore, Notifier, RemoteFleet};
use fleetline_db::PgJobStore;
use fleetline_events::{FailureNotifier, NotifyConfig};
use fleetline_fleet::{FleetApi, FleetClient, FleetConfig};
use fleetline_launcher::{
    CycleScheduler, LaunchDispatcher, LauncherConfig, Reconciler, ShutdownCoordinator, SyncCycle,
};

const DEFAULT_LOG_FILTER: &str =
    "fleetline_launcher=debug,fleetline_fleet=info,fleetline_db=info,fleetline_events=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = LauncherConfig::from_env().context("Invalid launcher configuration")?;
    let fleet_config = FleetConfig::from_env().context("Invalid fleet configuration")?;
    let notify_config = NotifyConfig::from_env().context("Invalid notification configuration")?;
    tracing::info!(
        max_concurrency = config.dispatcher.max_concurrency,
        pause_window = %config.dispatcher.pause_window,
        fleet_url = %fleet_config.base_url,
        "Loaded launcher configuration"
    );

    // --- Database ---
    let pool = fleetline_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    fleetline_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    fleetline_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Collaborators ---
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool));
    let api = FleetApi::new(fleet_config).context("Failed to build fleet client")?;
    let fleet: Arc<dyn RemoteFleet> = Arc::new(FleetClient::new(api));
    let notifier = FailureNotifier::from_config(&notify_config)
        .context("Failed to build notification channels")?;
    if !notifier.has_channels() {
        tracing::warn!("No notification channel configured, failures will only be logged");
    }
    let notifier: Arc<dyn Notifier> = Arc::new(notifier);

    // --- Engine ---
    let coordinator = Arc::new(ShutdownCoordinator::new(config.scheduler.shutdown_grace));
    let dispatcher = Arc::new(LaunchDispatcher::new(
        Arc::clone(&store),
        Arc::clone(&fleet),
        Arc::clone(&notifier),
        config.dispatcher,
    ));
    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&store),
        Arc::clone(&fleet),
        config.reconciler,
    ));
    let sync = Arc::new(SyncCycle::new(store, fleet, notifier));
    let scheduler = CycleScheduler::new(
        dispatcher,
        reconciler,
        Some(sync),
        config.scheduler,
        Arc::clone(&coordinator),
    );

    coordinator.track(tokio::spawn(async move { scheduler.start().await }));

    shutdown_signal().await;
    coordinator.shutdown().await;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
///
/// A handler that cannot be installed is logged and treated as never
/// firing, so the other signal still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!(error = %e, "Failed to install Ctrl-C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
