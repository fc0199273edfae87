//! Rendering of failure batches and alerts into messages.

use std::fmt::Write;

use fleetline_core::execution::{Alert, AlertLevel, FailureDetail, FailureKind};
use serde_json::json;

const SUBJECT_PREFIX: &str = "[fleetline]";

/// A rendered subject and plain-text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub subject: String,
    pub body: String,
}

/// Render one cycle's failures as a single message, one line per failure.
///
/// Deployments running without a local record are called out in the
/// subject.
pub fn failure_batch_message(batch: &[FailureDetail]) -> OutgoingMessage {
    let untracked = batch
        .iter()
        .filter(|f| f.kind == FailureKind::UntrackedDeployment)
        .count();
    let noun = if batch.len() == 1 { "failure" } else { "failures" };

    let subject = if untracked > 0 {
        format!(
            "{SUBJECT_PREFIX}[CRITICAL] {} dispatch {noun}, {untracked} untracked deployment(s)",
            batch.len()
        )
    } else {
        format!("{SUBJECT_PREFIX} {} dispatch {noun}", batch.len())
    };

    let mut body = String::from("The following jobs could not be dispatched this cycle:\n\n");
    for failure in batch {
        let _ = write!(
            body,
            "- job={} target={} principal={} kind={} error={}",
            display_id(failure.job_id),
            display_id(failure.target_id),
            display_id(failure.principal_id),
            failure.kind.as_str(),
            failure.error,
        );
        if let Some(deployment_id) = &failure.deployment_id {
            let _ = write!(body, " deployment={deployment_id}");
        }
        body.push('\n');
    }
    if untracked > 0 {
        body.push_str(
            "\nUntracked deployments are running remotely without a local record \
             and must be reconciled by hand.\n",
        );
    }

    OutgoingMessage { subject, body }
}

pub fn alert_message(alert: &Alert) -> OutgoingMessage {
    let tag = match alert.level {
        AlertLevel::Critical => "[CRITICAL]",
        AlertLevel::Warning => "[WARNING]",
    };
    OutgoingMessage {
        subject: format!("{SUBJECT_PREFIX}{tag} {}", alert.subject),
        body: alert.body.clone(),
    }
}

/// JSON body posted to the webhook for a failure batch.
pub fn failure_batch_payload(batch: &[FailureDetail], message: &OutgoingMessage) -> serde_json::Value {
    json!({
        "type": "dispatch_failures",
        "subject": message.subject,
        "failures": batch,
    })
}

/// JSON body posted to the webhook for an alert.
pub fn alert_payload(alert: &Alert) -> serde_json::Value {
    json!({
        "type": "alert",
        "level": alert.level,
        "subject": alert.subject,
        "body": alert.body,
    })
}

fn display_id(id: Option<i64>) -> String {
    id.map_or_else(|| "-".to_string(), |v| v.to_string())
}
