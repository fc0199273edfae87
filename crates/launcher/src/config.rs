//! Launcher configuration loaded from environment variables.

use std::time::Duration;

use fleetline_core::config::{self, ConfigError, Lookup};
use fleetline_core::pause_window::PauseWindow;

/// Fixed grace period granted to in-flight work after a shutdown request.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Minimum time between two persistent-failure alerts for one target.
pub const TARGET_ALERT_COOLDOWN: Duration = Duration::from_secs(30 * 60);

/// Settings for one dispatch cycle.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub max_concurrency: usize,
    pub retry_delay: Duration,
    /// Deploy input used when a job carries no override.
    pub input_template: serde_json::Value,
    pub pause_window: PauseWindow,
    /// Consecutive transient failures per target before alerting; 0 disables.
    pub target_failure_alert_threshold: u32,
    pub target_alert_cooldown: Duration,
}

/// Settings for one reconciliation cycle.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// A missing record must be older than this before it is declared lost.
    pub lost_min_age: Duration,
    /// Consecutive misses required before a record is declared lost.
    pub lost_max_misses: i32,
    /// Records still in flight after this long are expired; `None` disables.
    pub stale_after: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub launch_interval: Duration,
    pub reconcile_interval: Duration,
    pub sync_interval: Duration,
    pub sync_enabled: bool,
    pub shutdown_grace: Duration,
}

#[derive(Debug, Clone)]
pub struct LauncherConfig {
    pub database_url: String,
    pub dispatcher: DispatcherConfig,
    pub reconciler: ReconcilerConfig,
    pub scheduler: SchedulerConfig,
}

impl LauncherConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                          | Default  |
    /// |----------------------------------|----------|
    /// | `DATABASE_URL`                   | required |
    /// | `LAUNCH_INTERVAL_SECS`           | `30`     |
    /// | `RECONCILE_INTERVAL_SECS`        | `180`    |
    /// | `SYNC_INTERVAL_SECS`             | `3600`   |
    /// | `SYNC_ENABLED`                   | `true`   |
    /// | `MAX_CONCURRENT_DEPLOYS`         | `5`      |
    /// | `DEPLOY_RETRY_DELAY_SECS`        | required |
    /// | `LOST_RECORD_MIN_AGE_SECS`       | required |
    /// | `LOST_RECORD_MAX_MISSES`         | `1`      |
    /// | `STALE_EXECUTION_DAYS`           | `30`     |
    /// | `PAUSE_START` / `PAUSE_END`      | unset    |
    /// | `JOB_INPUT_TEMPLATE`             | `{}`     |
    /// | `TARGET_FAILURE_ALERT_THRESHOLD` | `20`     |
    ///
    /// Intervals and concurrency below 1 are raised to 1.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&config::process_env)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let database_url = config::required(lookup, "DATABASE_URL")?;

        let dispatcher = DispatcherConfig {
            max_concurrency: clamp_positive(config::parse_or(lookup, "MAX_CONCURRENT_DEPLOYS", 5)?)
                as usize,
            retry_delay: Duration::from_secs(config::parse_required(
                lookup,
                "DEPLOY_RETRY_DELAY_SECS",
            )?),
            input_template: input_template(lookup)?,
            pause_window: PauseWindow::parse(
                &config::optional(lookup, "PAUSE_START").unwrap_or_default(),
                &config::optional(lookup, "PAUSE_END").unwrap_or_default(),
            ),
            target_failure_alert_threshold: config::parse_or(
                lookup,
                "TARGET_FAILURE_ALERT_THRESHOLD",
                20,
            )?,
            target_alert_cooldown: TARGET_ALERT_COOLDOWN,
        };

        let stale_days: u64 = config::parse_or(lookup, "STALE_EXECUTION_DAYS", 30)?;
        let reconciler = ReconcilerConfig {
            lost_min_age: Duration::from_secs(config::parse_required(
                lookup,
                "LOST_RECORD_MIN_AGE_SECS",
            )?),
            lost_max_misses: config::parse_or::<i32>(lookup, "LOST_RECORD_MAX_MISSES", 1)?.max(1),
            stale_after: (stale_days > 0).then(|| Duration::from_secs(stale_days.saturating_mul(24 * 3600))),
        };

        let scheduler = SchedulerConfig {
            launch_interval: interval(lookup, "LAUNCH_INTERVAL_SECS", 30)?,
            reconcile_interval: interval(lookup, "RECONCILE_INTERVAL_SECS", 180)?,
            sync_interval: interval(lookup, "SYNC_INTERVAL_SECS", 3600)?,
            sync_enabled: config::flag_or(lookup, "SYNC_ENABLED", true)?,
            shutdown_grace: SHUTDOWN_GRACE,
        };

        Ok(Self {
            database_url,
            dispatcher,
            reconciler,
            scheduler,
        })
    }
}

fn clamp_positive(value: i64) -> u64 {
    value.max(1) as u64
}

/// A period in seconds, raised to at least one second.
fn interval(lookup: Lookup<'_>, key: &'static str, default: i64) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(clamp_positive(config::parse_or(
        lookup, key, default,
    )?)))
}

fn input_template(lookup: Lookup<'_>) -> Result<serde_json::Value, ConfigError> {
    let Some(raw) = config::optional(lookup, "JOB_INPUT_TEMPLATE") else {
        return Ok(serde_json::Value::Object(Default::default()));
    };
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| ConfigError::Invalid {
            key: "JOB_INPUT_TEMPLATE",
            value: raw.clone(),
            reason: e.to_string(),
        })?;
    if !value.is_object() {
        return Err(ConfigError::Invalid {
            key: "JOB_INPUT_TEMPLATE",
            value: raw,
            reason: "expected a JSON object".into(),
        });
    }
    Ok(value)
}
