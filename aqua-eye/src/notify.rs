//! Outbound notification transports

use crate::error::VisionError;
use crate::settings::RuntimeSettings;
use aqua_core::config::NotifierConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// Informational result of a delivered notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationReceipt {
    pub transport: &'static str,
    /// Identifier assigned by the transport, when it returns one
    pub transport_id: Option<String>,
}

/// Delivers alert messages. Failures are reported to the caller, which logs
/// them; they never stop the analysis loop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<NotificationReceipt, VisionError>;

    fn name(&self) -> &'static str;
}

/// Writes notifications to the log only
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> Result<NotificationReceipt, VisionError> {
        info!("Notification: {}", message);
        Ok(NotificationReceipt {
            transport: self.name(),
            transport_id: None,
        })
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Sends SMS through the Twilio Messages REST API
#[derive(Debug, Clone)]
pub struct SmsNotifier {
    client: Client,
    endpoint: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    to_number: String,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
}

impl SmsNotifier {
    pub fn new(config: &NotifierConfig, timeout: Duration) -> Result<Self, VisionError> {
        let (Some(account_sid), Some(auth_token), Some(from_number), Some(to_number)) = (
            config.account_sid.clone(),
            config.auth_token.clone(),
            config.from_number.clone(),
            config.to_number.clone(),
        ) else {
            return Err(VisionError::Config("SMS notifier requires account_sid, auth_token, from_number and to_number".to_string()));
        };

        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            config.api_base.trim_end_matches('/'),
            account_sid
        );

        Ok(Self {
            client,
            endpoint,
            account_sid,
            auth_token,
            from_number,
            to_number,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn notify(&self, message: &str) -> Result<NotificationReceipt, VisionError> {
        let form = [
            ("Body", message),
            ("From", self.from_number.as_str()),
            ("To", self.to_number.as_str()),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Body may echo credentials back; only the status is surfaced
            return Err(VisionError::Notification(format!(
                "SMS transport returned status {}",
                status.as_u16()
            )));
        }

        let resource: MessageResource = response.json().await?;
        Ok(NotificationReceipt {
            transport: self.name(),
            transport_id: resource.sid,
        })
    }

    fn name(&self) -> &'static str {
        "sms"
    }
}

/// What happened to one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered(NotificationReceipt),
    /// SMS delivery is switched off; the message was only logged
    Suppressed,
    Failed(String),
}

/// Send `message` through `notifier`, honoring the SMS switch. Never fails:
/// transport errors and timeouts are logged and reported in the outcome.
pub async fn dispatch(
    notifier: &dyn Notifier,
    settings: &RuntimeSettings,
    message: &str,
    timeout: Duration,
) -> DispatchOutcome {
    if !settings.sms_enabled() {
        info!("SMS disabled: {}", message);
        return DispatchOutcome::Suppressed;
    }

    match tokio::time::timeout(timeout, notifier.notify(message)).await {
        Ok(Ok(receipt)) => {
            match &receipt.transport_id {
                Some(id) => info!("Notification sent via {}: {} (id: {})", receipt.transport, message, id),
                None => info!("Notification sent via {}: {}", receipt.transport, message),
            }
            DispatchOutcome::Delivered(receipt)
        }
        Ok(Err(e)) => {
            warn!("Failed to send notification via {}: {}", notifier.name(), e);
            DispatchOutcome::Failed(e.to_string())
        }
        Err(_) => {
            warn!("Notification via {} timed out after {:?}", notifier.name(), timeout);
            DispatchOutcome::Failed(format!("timed out after {:?}", timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> NotifierConfig {
        NotifierConfig {
            account_sid: Some("AC123".to_string()),
            auth_token: Some("token".to_string()),
            from_number: Some("+15550001111".to_string()),
            to_number: Some("+15552223333".to_string()),
            api_base: "https://api.twilio.com/".to_string(),
        }
    }

    #[test]
    fn test_log_notifier_always_succeeds() {
        let receipt = tokio_test::block_on(LogNotifier.notify("hello")).unwrap();
        assert_eq!(receipt.transport, "log");
        assert!(receipt.transport_id.is_none());
    }

    #[test]
    fn test_sms_notifier_requires_credentials() {
        let result = SmsNotifier::new(&NotifierConfig::default(), Duration::from_secs(5));
        assert!(matches!(result, Err(VisionError::Config(_))));
    }

    #[test]
    fn test_sms_notifier_endpoint() {
        let notifier = SmsNotifier::new(&credentials(), Duration::from_secs(5)).unwrap();
        assert_eq!(
            notifier.endpoint(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
        assert_eq!(notifier.name(), "sms");
    }

    #[tokio::test]
    async fn test_dispatch_suppressed_when_sms_disabled() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();
        let settings = RuntimeSettings::new(true, false);

        let outcome = dispatch(&notifier, &settings, "msg", Duration::from_secs(1)).await;
        assert_eq!(outcome, DispatchOutcome::Suppressed);
    }

    #[tokio::test]
    async fn test_dispatch_delivered() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|message| message == "crossed")
            .times(1)
            .returning(|_| {
                Ok(NotificationReceipt {
                    transport: "mock",
                    transport_id: Some("SM1".to_string()),
                })
            });
        let settings = RuntimeSettings::new(true, true);

        let outcome = dispatch(&notifier, &settings, "crossed", Duration::from_secs(1)).await;
        match outcome {
            DispatchOutcome::Delivered(receipt) => assert_eq!(receipt.transport_id.as_deref(), Some("SM1")),
            other => panic!("Expected Delivered, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_reported_not_raised() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .returning(|_| Err(VisionError::Notification("carrier down".to_string())));
        notifier.expect_name().return_const("mock");
        let settings = RuntimeSettings::new(true, true);

        let outcome = dispatch(&notifier, &settings, "crossed", Duration::from_secs(1)).await;
        match outcome {
            DispatchOutcome::Failed(reason) => assert!(reason.contains("carrier down")),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }
}
