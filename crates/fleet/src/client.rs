//! [`RemoteFleet`] implementation over [`FleetApi`].

use async_trait::async_trait;
use fleetline_core::error::CoreError;
use fleetline_core::execution::{
    DispatchRequest, RemoteAutomation, RemotePrincipal, RemoteStatus, RemoteTarget,
};
use fleetline_core::ports::{DeployError, RemoteFleet};
use fleetline_core::types::DbId;

use crate::api::{
    FleetApi, FleetApiError, ACTIVITY_LIST_PATH, DEVICES_LIST_PATH, FILES_LIST_PATH,
    USERS_LIST_PATH,
};
use crate::classify::classify_deploy_error;
use crate::messages::{
    Activity, CallbackInfo, DeployRequest, Device, Filter, ListRequest, RepositoryFile, User,
};

const CONNECTED: &str = "CONNECTED";
const TASKBOT_MIME: &str = "application/vnd.aa.taskbot";

/// The production remote fleet.
pub struct FleetClient {
    api: FleetApi,
}

impl FleetClient {
    /// Wrap an authenticated API client.
    pub fn new(api: FleetApi) -> Self {
        Self { api }
    }

    async fn statuses_for_chunk(&self, ids: &[String]) -> Result<Vec<Activity>, FleetApiError> {
        let filter = Filter::or(
            ids.iter()
                .map(|id| Filter::eq("deploymentId", id.as_str()))
                .collect(),
        );
        let mut body = ListRequest::new("startDateTime", Some(filter));
        if let Some(sort) = body.sort.first_mut() {
            sort.direction = "desc".into();
        }
        self.api.list_all(ACTIVITY_LIST_PATH, body).await
    }
}

fn remote_err(e: FleetApiError) -> CoreError {
    CoreError::Remote(e.to_string())
}

#[async_trait]
impl RemoteFleet for FleetClient {
    async fn deploy(
        &self,
        request: &DispatchRequest,
        input: &serde_json::Value,
    ) -> Result<String, DeployError> {
        let config = self.api.config();
        let body = DeployRequest {
            file_id: request.job_id,
            run_as_user_ids: vec![request.principal_id],
            callback_info: config
                .callback_url
                .as_deref()
                .map(|url| CallbackInfo { url }),
            bot_input: input.as_object().filter(|o| !o.is_empty()).map(|_| input),
        };

        let response = self
            .api
            .deploy(&body)
            .await
            .map_err(|e| classify_deploy_error(&e))?;

        match response.deployment_id.filter(|id| !id.is_empty()) {
            Some(id) => Ok(id),
            None => Err(DeployError::Permanent(
                "deploy response carried no deploymentId".into(),
            )),
        }
    }

    async fn get_statuses(
        &self,
        deployment_ids: &[String],
    ) -> Result<Vec<RemoteStatus>, CoreError> {
        let mut statuses = Vec::with_capacity(deployment_ids.len());
        for chunk in deployment_ids.chunks(self.api.config().status_batch_size) {
            let activities = self.statuses_for_chunk(chunk).await.map_err(remote_err)?;
            statuses.extend(activities.into_iter().filter_map(|a| {
                Some(RemoteStatus {
                    deployment_id: a.deployment_id?,
                    status: a.status.unwrap_or_default(),
                    ended_at: a.end_date_time,
                })
            }));
        }
        Ok(statuses)
    }

    async fn list_targets(&self) -> Result<Vec<RemoteTarget>, CoreError> {
        let body = ListRequest::new("hostName", Some(Filter::eq("status", CONNECTED)));
        let devices: Vec<Device> = self
            .api
            .list_all(DEVICES_LIST_PATH, body)
            .await
            .map_err(remote_err)?;

        Ok(devices
            .into_iter()
            .map(|device| {
                let user = device.default_users.first();
                RemoteTarget {
                    target_id: device.id,
                    name: device.host_name.unwrap_or_default(),
                    principal_id: user.map(|u| u.id),
                    principal_name: user.and_then(|u| u.username.clone()),
                    connected: device.status.as_deref() == Some(CONNECTED),
                }
            })
            .collect())
    }

    async fn list_principals(
        &self,
        principal_ids: &[DbId],
    ) -> Result<Vec<RemotePrincipal>, CoreError> {
        let mut principals = Vec::with_capacity(principal_ids.len());
        for chunk in principal_ids.chunks(self.api.config().status_batch_size) {
            let filter = Filter::or(chunk.iter().map(|&id| Filter::eq("id", id)).collect());
            let body = ListRequest::new("username", Some(filter));
            let users: Vec<User> = self
                .api
                .list_all(USERS_LIST_PATH, body)
                .await
                .map_err(remote_err)?;
            principals.extend(users.into_iter().map(|user| RemotePrincipal {
                principal_id: user.id,
                license: user
                    .license_features
                    .as_ref()
                    .and_then(|f| f.primary())
                    .map(str::to_string),
                active: !user.disabled,
            }));
        }
        Ok(principals)
    }

    async fn list_automations(&self) -> Result<Vec<RemoteAutomation>, CoreError> {
        let config = self.api.config();
        let mut operands = vec![Filter::eq("type", TASKBOT_MIME)];
        if let Some(path) = config.automation_path_filter.as_deref() {
            operands.push(Filter::substring("path", path));
        }
        if let Some(prefix) = config.automation_name_prefix.as_deref() {
            operands.push(Filter::substring("name", prefix));
        }
        let body = ListRequest::new("name", Some(Filter::and(operands)));
        let files: Vec<RepositoryFile> = self
            .api
            .list_all(FILES_LIST_PATH, body)
            .await
            .map_err(remote_err)?;

        // The server matches substrings; a prefix must be checked here.
        let prefix = config.automation_name_prefix.as_deref().unwrap_or("");
        Ok(files
            .into_iter()
            .filter(|file| file.name.starts_with(prefix))
            .map(|file| RemoteAutomation {
                job_id: file.id,
                name: file.name,
                description: file.description,
            })
            .collect())
    }
}
