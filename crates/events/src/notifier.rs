//! [`Notifier`] implementation fanning out to email and webhook.

use async_trait::async_trait;
use fleetline_core::error::CoreError;
use fleetline_core::execution::{Alert, AlertLevel, FailureDetail};
use fleetline_core::ports::Notifier;

use crate::config::NotifyConfig;
use crate::delivery::email::EmailDelivery;
use crate::delivery::webhook::WebhookDelivery;
use crate::format::{self, OutgoingMessage};
use crate::throttle::AlertThrottle;

struct EmailChannel {
    delivery: EmailDelivery,
    recipients: Vec<String>,
}

/// Delivers failure batches and alerts to every configured channel.
///
/// Repeated critical alerts with the same subject are suppressed for the
/// cooldown window. With no channel configured everything is logged
/// instead.
pub struct FailureNotifier {
    email: Option<EmailChannel>,
    webhook: Option<WebhookDelivery>,
    throttle: AlertThrottle,
}

impl FailureNotifier {
    /// A notifier with no channels; see [`with_email`](Self::with_email)
    /// and [`with_webhook`](Self::with_webhook).
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            email: None,
            webhook: None,
            throttle: AlertThrottle::new(config.critical_cooldown),
        }
    }

    /// Build every channel `config` describes.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, CoreError> {
        let mut notifier = Self::new(config);

        if let Some(email) = &config.email {
            if config.recipients.is_empty() {
                tracing::warn!("SMTP_HOST is set but NOTIFY_RECIPIENTS is empty, email disabled");
            } else {
                let delivery = EmailDelivery::new(email.clone())
                    .map_err(|e| CoreError::Notify(e.to_string()))?;
                notifier = notifier.with_email(delivery, config.recipients.clone());
            }
        }

        if let Some(url) = &config.webhook_url {
            let delivery =
                WebhookDelivery::new(url.clone()).map_err(|e| CoreError::Notify(e.to_string()))?;
            notifier = notifier.with_webhook(delivery);
        }

        Ok(notifier)
    }

    pub fn with_email(mut self, delivery: EmailDelivery, recipients: Vec<String>) -> Self {
        self.email = Some(EmailChannel {
            delivery,
            recipients,
        });
        self
    }

    pub fn with_webhook(mut self, delivery: WebhookDelivery) -> Self {
        self.webhook = Some(delivery);
        self
    }

    pub fn has_channels(&self) -> bool {
        self.email.is_some() || self.webhook.is_some()
    }

    /// Send to every channel, attempting all of them before reporting.
    async fn send(
        &self,
        message: &OutgoingMessage,
        payload: &serde_json::Value,
    ) -> Result<(), CoreError> {
        let mut errors = Vec::new();

        if let Some(channel) = &self.email {
            if let Err(e) = channel.delivery.deliver(&channel.recipients, message).await {
                errors.push(format!("email: {e}"));
            }
        }
        if let Some(webhook) = &self.webhook {
            if let Err(e) = webhook.deliver(payload).await {
                errors.push(format!("webhook: {e}"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Notify(errors.join("; ")))
        }
    }
}

#[async_trait]
impl Notifier for FailureNotifier {
    async fn notify_failures(&self, batch: &[FailureDetail]) -> Result<(), CoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let message = format::failure_batch_message(batch);

        if !self.has_channels() {
            tracing::warn!(
                failures = batch.len(),
                subject = %message.subject,
                body = %message.body,
                "No notification channel configured, failure batch logged only"
            );
            return Ok(());
        }

        let payload = format::failure_batch_payload(batch, &message);
        self.send(&message, &payload).await
    }

    async fn alert(&self, alert: &Alert) -> Result<(), CoreError> {
        if alert.level == AlertLevel::Critical && !self.throttle.try_acquire(&alert.subject) {
            tracing::debug!(subject = %alert.subject, "Critical alert suppressed by cooldown");
            return Ok(());
        }
        let message = format::alert_message(alert);

        if !self.has_channels() {
            tracing::warn!(
                subject = %message.subject,
                body = %message.body,
                "No notification channel configured, alert logged only"
            );
            return Ok(());
        }

        self.send(&message, &format::alert_payload(alert)).await
    }
}
