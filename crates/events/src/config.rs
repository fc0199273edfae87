use std::time::Duration;

use fleetline_core::config::{self, ConfigError, Lookup};

use crate::delivery::email::EmailConfig;

/// Which channels receive notifications, and how often critical alerts may
/// repeat.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// `None` when `SMTP_HOST` is unset.
    pub email: Option<EmailConfig>,
    pub recipients: Vec<String>,
    pub webhook_url: Option<String>,
    pub critical_cooldown: Duration,
}

impl NotifyConfig {
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `NOTIFY_RECIPIENTS`           | empty   |
    /// | `NOTIFY_WEBHOOK_URL`          | -       |
    /// | `CRITICAL_ALERT_COOLDOWN_SECS`| `1800`  |
    ///
    /// plus the `SMTP_*` variables read by [`EmailConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&config::process_env)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            email: EmailConfig::from_lookup(lookup)?,
            recipients: config::list(lookup, "NOTIFY_RECIPIENTS"),
            webhook_url: config::optional(lookup, "NOTIFY_WEBHOOK_URL"),
            critical_cooldown: Duration::from_secs(config::parse_or(
                lookup,
                "CRITICAL_ALERT_COOLDOWN_SECS",
                1800,
            )?),
        })
    }
}
