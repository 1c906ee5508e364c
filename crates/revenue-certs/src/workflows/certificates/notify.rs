use async_trait::async_trait;
use tracing::info;

use crate::config::NotificationConfig;

use super::repository::{NotificationDispatcher, NotificationError, StatusNotice};

/// Posts each notice as JSON to an external delivery service.
#[derive(Debug, Clone)]
pub struct WebhookNotificationDispatcher {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotificationDispatcher {
    pub fn new(
        endpoint: impl Into<String>,
        config: &NotificationConfig,
    ) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| NotificationError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotificationDispatcher {
    async fn notify(&self, notice: StatusNotice) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&notice)
            .send()
            .await
            .map_err(|err| NotificationError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotificationError::Rejected(status.as_u16()))
        }
    }
}

/// Records notices in the service log when no delivery endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct TracingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingNotificationDispatcher {
    async fn notify(&self, notice: StatusNotice) -> Result<(), NotificationError> {
        info!(
            application = %notice.application_id,
            status = %notice.status,
            certificate_type = %notice.certificate_type,
            "status notice"
        );
        Ok(())
    }
}

/// Dispatcher selected from configuration at startup.
#[derive(Debug, Clone)]
pub enum ConfiguredNotifier {
    Webhook(WebhookNotificationDispatcher),
    Log(TracingNotificationDispatcher),
}

impl ConfiguredNotifier {
    pub fn from_config(config: &NotificationConfig) -> Result<Self, NotificationError> {
        match &config.webhook_url {
            Some(url) => Ok(Self::Webhook(WebhookNotificationDispatcher::new(
                url.clone(),
                config,
            )?)),
            None => Ok(Self::Log(TracingNotificationDispatcher)),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for ConfiguredNotifier {
    async fn notify(&self, notice: StatusNotice) -> Result<(), NotificationError> {
        match self {
            ConfiguredNotifier::Webhook(webhook) => webhook.notify(notice).await,
            ConfiguredNotifier::Log(log) => log.notify(notice).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::certificates::domain::{
        ApplicationCode, ApplicationStatus, CertificateType,
    };

    #[test]
    fn notice_serializes_with_camel_case_keys() {
        let notice = StatusNotice {
            application_id: ApplicationCode("APP2024000003".to_string()),
            status: ApplicationStatus::AwaitingSdo,
            user_email: "applicant@example.in".to_string(),
            user_name: "Applicant".to_string(),
            certificate_type: CertificateType::Caste,
        };
        let value = serde_json::to_value(&notice).expect("json");
        assert_eq!(value["applicationId"], "APP2024000003");
        assert_eq!(value["status"], "awaiting_sdo");
        assert_eq!(value["userEmail"], "applicant@example.in");
        assert_eq!(value["certificateType"], "caste");
    }

    #[test]
    fn falls_back_to_log_dispatcher_without_webhook() {
        let notifier =
            ConfiguredNotifier::from_config(&NotificationConfig::default()).expect("notifier");
        assert!(matches!(notifier, ConfiguredNotifier::Log(_)));
    }

    #[tokio::test]
    async fn unreachable_webhook_reports_transport_error() {
        let config = NotificationConfig {
            webhook_url: Some("http://127.0.0.1:9/notify".to_string()),
            timeout: std::time::Duration::from_millis(200),
        };
        let notifier = ConfiguredNotifier::from_config(&config).expect("notifier");
        let notice = StatusNotice {
            application_id: ApplicationCode("APP2024000004".to_string()),
            status: ApplicationStatus::Approved,
            user_email: "applicant@example.in".to_string(),
            user_name: "Applicant".to_string(),
            certificate_type: CertificateType::Income,
        };
        assert!(matches!(
            notifier.notify(notice).await,
            Err(NotificationError::Transport(_))
        ));
    }
}
