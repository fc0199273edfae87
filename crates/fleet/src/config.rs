use std::time::Duration;

use fleetline_core::config::{self, ConfigError, Lookup};

/// Connection and paging settings for the fleet control room.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Control-room base URL, without a trailing slash.
    pub base_url: String,
    pub username: String,
    pub password: Option<String>,
    pub api_key: Option<String>,
    /// Sent with every deploy so the fleet can push completion callbacks.
    pub callback_url: Option<String>,
    pub timeout: Duration,
    /// A cached token is refreshed once it is this old.
    pub token_ttl: Duration,
    pub page_size: u32,
    /// Safeguard against runaway pagination.
    pub max_pages: u32,
    /// Maximum deployment ids per activity lookup.
    pub status_batch_size: usize,
    pub automation_path_filter: Option<String>,
    pub automation_name_prefix: Option<String>,
}

impl FleetConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                        | Default  |
    /// |--------------------------------|----------|
    /// | `FLEET_URL`                    | required |
    /// | `FLEET_USERNAME`               | required |
    /// | `FLEET_PASSWORD`               | -        |
    /// | `FLEET_API_KEY`                | -        |
    /// | `FLEET_CALLBACK_URL`           | -        |
    /// | `FLEET_TIMEOUT_SECS`           | `60`     |
    /// | `FLEET_TOKEN_TTL_SECS`         | `1140`   |
    /// | `FLEET_PAGE_SIZE`              | `100`    |
    /// | `FLEET_MAX_PAGES`              | `1000`   |
    /// | `FLEET_STATUS_BATCH_SIZE`      | `100`    |
    /// | `FLEET_AUTOMATION_PATH_FILTER` | -        |
    /// | `FLEET_AUTOMATION_NAME_PREFIX` | -        |
    ///
    /// One of `FLEET_PASSWORD` or `FLEET_API_KEY` must be set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&config::process_env)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let base_url = config::required(lookup, "FLEET_URL")?
            .trim_end_matches('/')
            .to_string();
        let username = config::required(lookup, "FLEET_USERNAME")?;
        let password = config::optional(lookup, "FLEET_PASSWORD");
        let api_key = config::optional(lookup, "FLEET_API_KEY");
        if password.is_none() && api_key.is_none() {
            return Err(ConfigError::Missing("FLEET_PASSWORD"));
        }

        Ok(Self {
            base_url,
            username,
            password,
            api_key,
            callback_url: config::optional(lookup, "FLEET_CALLBACK_URL"),
            timeout: Duration::from_secs(config::parse_or(lookup, "FLEET_TIMEOUT_SECS", 60)?),
            token_ttl: Duration::from_secs(config::parse_or(
                lookup,
                "FLEET_TOKEN_TTL_SECS",
                1140,
            )?),
            page_size: config::parse_or::<u32>(lookup, "FLEET_PAGE_SIZE", 100)?.max(1),
            max_pages: config::parse_or::<u32>(lookup, "FLEET_MAX_PAGES", 1000)?.max(1),
            status_batch_size: config::parse_or::<usize>(lookup, "FLEET_STATUS_BATCH_SIZE", 100)?
                .max(1),
            automation_path_filter: config::optional(lookup, "FLEET_AUTOMATION_PATH_FILTER"),
            automation_name_prefix: config::optional(lookup, "FLEET_AUTOMATION_NAME_PREFIX"),
        })
    }
}
