//! Transient vs permanent classification of deploy failures.

use fleetline_core::ports::DeployError;

use crate::api::FleetApiError;

/// Fragments of a 400 body that mark the request itself as wrong.
const PERMANENT_400_MARKERS: [&str; 4] = ["invalid_argument", "user", "deleted", "disabled"];

/// Classify a failed deploy call.
pub fn classify_deploy_error(err: &FleetApiError) -> DeployError {
    let message = err.to_string();
    let retriable = match err {
        FleetApiError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        FleetApiError::ApiError { status, body } => is_retriable_response(*status, body),
        FleetApiError::MissingToken(_) => false,
    };
    if retriable {
        DeployError::Transient(message)
    } else {
        DeployError::Permanent(message)
    }
}

/// Whether an HTTP error response is worth another attempt.
///
/// Retriable: 408, 412, 429, every 5xx, any body reporting a busy device,
/// and 400s that do not point at bad arguments or an unusable user.
pub fn is_retriable_response(status: u16, body: &str) -> bool {
    let body = body.to_lowercase();
    if body.contains("device is busy") {
        return true;
    }
    match status {
        408 | 412 | 429 => true,
        500..=599 => true,
        400 => !PERMANENT_400_MARKERS.iter().any(|m| body.contains(m)),
        _ => false,
    }
}
