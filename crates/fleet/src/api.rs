//! REST API client for the fleet control room.
//!
//! Every request carries the session token in `X-Authorization`. The token
//! is fetched lazily, cached for the configured TTL and dropped whenever
//! the control room answers 401, after which the request is replayed once.

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::FleetConfig;
use crate::messages::{
    AuthRequest, AuthResponse, DeployRequest, DeployResponse, ListRequest, ListResponse,
};

const AUTH_PATH: &str = "/v2/authentication";
pub const DEPLOY_PATH: &str = "/v3/automations/deploy";
pub const ACTIVITY_LIST_PATH: &str = "/v3/activity/list";
pub const DEVICES_LIST_PATH: &str = "/v2/devices/list";
pub const USERS_LIST_PATH: &str = "/v2/usermanagement/users/list";
pub const FILES_LIST_PATH: &str = "/v2/repository/workspaces/public/files/list";

const TOKEN_HEADER: &str = "X-Authorization";

/// Errors from the control-room REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum FleetApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The control room returned a non-2xx status code.
    #[error("Fleet API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// Authentication succeeded but the response carried no token.
    #[error("Authentication for {0} returned no token")]
    MissingToken(String),
}

struct CachedToken {
    value: String,
    issued_at: Instant,
}

/// HTTP client for one control room.
pub struct FleetApi {
    client: reqwest::Client,
    config: FleetConfig,
    token: Mutex<Option<CachedToken>>,
}

impl FleetApi {
    pub fn new(config: FleetConfig) -> Result<Self, FleetApiError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: FleetConfig) -> Self {
        Self {
            client,
            config,
            token: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Start one deployment.
    pub async fn deploy(&self, body: &DeployRequest<'_>) -> Result<DeployResponse, FleetApiError> {
        self.post_json(DEPLOY_PATH, body).await
    }

    /// Fetch one page from a `*/list` endpoint.
    pub async fn list_page<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &ListRequest,
    ) -> Result<ListResponse<T>, FleetApiError> {
        self.post_json(path, body).await
    }

    /// Fetch every page of a `*/list` endpoint.
    ///
    /// Stops on an empty page, a short page, once the reported total has
    /// been collected, or after `max_pages` requests. Any page failure fails
    /// the whole listing.
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        mut body: ListRequest,
    ) -> Result<Vec<T>, FleetApiError> {
        let page_size = self.config.page_size;
        body.page.length = page_size;
        body.page.offset = 0;

        let mut items = Vec::new();
        let mut expected: Option<u64> = None;

        for page_number in 1..=self.config.max_pages {
            let response: ListResponse<T> = self.list_page(path, &body).await?;

            if page_number == 1 {
                // A zero total alongside a non-empty page is unreliable.
                expected = response
                    .page
                    .and_then(|info| info.expected())
                    .filter(|&total| total > 0 || response.list.is_empty());
            }

            let received = response.list.len();
            if received == 0 {
                break;
            }
            items.extend(response.list);

            if expected.is_some_and(|total| items.len() as u64 >= total)
                || received < page_size as usize
            {
                break;
            }
            if page_number == self.config.max_pages {
                tracing::warn!(
                    path,
                    max_pages = self.config.max_pages,
                    collected = items.len(),
                    "Pagination limit reached, listing may be incomplete",
                );
            }
            body.page.offset += u64::from(page_size);
        }

        Ok(items)
    }

    // ---- private helpers ----

    /// POST a JSON body with the session token, replaying once on 401.
    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, FleetApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, path);
        let token = self.token().await?;
        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, &token)
            .json(body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            tracing::info!(path, "Session token rejected, re-authenticating");
            self.invalidate_token().await;
            let token = self.token().await?;
            let response = self
                .client
                .post(&url)
                .header(TOKEN_HEADER, &token)
                .json(body)
                .send()
                .await?;
            return Self::parse_response(response).await;
        }

        Self::parse_response(response).await
    }

    /// Return the cached token, authenticating when absent or expired.
    async fn token(&self) -> Result<String, FleetApiError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.issued_at.elapsed() < self.config.token_ttl {
                return Ok(cached.value.clone());
            }
            tracing::debug!("Session token expired, refreshing");
        }

        let value = self.authenticate().await?;
        *guard = Some(CachedToken {
            value: value.clone(),
            issued_at: Instant::now(),
        });
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn authenticate(&self) -> Result<String, FleetApiError> {
        let body = AuthRequest {
            username: &self.config.username,
            password: self.config.password.as_deref(),
            api_key: self.config.api_key.as_deref(),
            multi_login: true,
        };
        let response = self
            .client
            .post(format!("{}{}", self.config.base_url, AUTH_PATH))
            .json(&body)
            .send()
            .await?;
        let auth: AuthResponse = Self::parse_response(response).await?;
        let token = auth
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| FleetApiError::MissingToken(self.config.username.clone()))?;
        tracing::info!(username = %self.config.username, "Authenticated with fleet control room");
        Ok(token)
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`FleetApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, FleetApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(FleetApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, FleetApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
