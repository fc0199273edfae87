//! Wire types for the control-room REST API.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest<'a> {
    pub username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<&'a str>,
    pub multi_login: bool,
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub token: Option<String>,
}

// ---------------------------------------------------------------------------
// Deploy
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest<'a> {
    pub file_id: i64,
    pub run_as_user_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_info: Option<CallbackInfo<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_input: Option<&'a serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct CallbackInfo<'a> {
    pub url: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResponse {
    pub deployment_id: Option<String>,
}

// ---------------------------------------------------------------------------
// List queries
// ---------------------------------------------------------------------------

/// Body of every `*/list` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ListRequest {
    pub page: PageRequest,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Sort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
}

impl ListRequest {
    pub fn new(sort_field: &str, filter: Option<Filter>) -> Self {
        Self {
            page: PageRequest::default(),
            sort: vec![Sort {
                field: sort_field.to_string(),
                direction: "asc".into(),
            }],
            filter,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageRequest {
    pub offset: u64,
    pub length: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sort {
    pub field: String,
    pub direction: String,
}

/// A filter expression: either a leaf comparison or a boolean combinator
/// over `operands`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub operator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operands: Vec<Filter>,
}

impl Filter {
    fn leaf(operator: &str, field: &str, value: impl Into<serde_json::Value>) -> Self {
        Self {
            operator: operator.into(),
            field: Some(field.into()),
            value: Some(value.into()),
            operands: Vec::new(),
        }
    }

    pub fn eq(field: &str, value: impl Into<serde_json::Value>) -> Self {
        Self::leaf("eq", field, value)
    }

    pub fn substring(field: &str, value: &str) -> Self {
        Self::leaf("substring", field, value)
    }

    pub fn or(operands: Vec<Filter>) -> Self {
        Self::combine("or", operands)
    }

    /// Conjunction; a single operand is returned as is.
    pub fn and(mut operands: Vec<Filter>) -> Self {
        if operands.len() == 1 {
            return operands.remove(0);
        }
        Self::combine("and", operands)
    }

    fn combine(operator: &str, operands: Vec<Filter>) -> Self {
        Self {
            operator: operator.into(),
            field: None,
            value: None,
            operands,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default)]
    pub page: Option<PageInfo>,
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total: Option<u64>,
    pub total_filter: Option<u64>,
}

impl PageInfo {
    /// The expected number of entities, preferring the filtered total.
    pub fn expected(&self) -> Option<u64> {
        self.total_filter.or(self.total)
    }
}

// ---------------------------------------------------------------------------
// Listed entities
// ---------------------------------------------------------------------------

/// One entry of `/v3/activity/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub deployment_id: Option<String>,
    pub status: Option<String>,
    pub end_date_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    pub host_name: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub default_users: Vec<DeviceUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceUser {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub license_features: Option<LicenseFeatures>,
    #[serde(default)]
    pub disabled: bool,
}

/// Reported either as a list or a single string depending on the API
/// version.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LicenseFeatures {
    List(Vec<String>),
    Single(String),
}

impl LicenseFeatures {
    pub fn primary(&self) -> Option<&str> {
        match self {
            LicenseFeatures::List(items) => items.first().map(String::as_str),
            LicenseFeatures::Single(value) => Some(value.as_str()),
        }
        .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryFile {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}
