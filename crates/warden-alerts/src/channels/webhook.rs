//! Generic JSON webhook channel.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{NotificationResult, Notifier, DEFAULT_NOTIFY_TIMEOUT_SECS};
use crate::error::{AlertError, Result};
use crate::types::{Alert, ChannelKind};

/// Configuration for a webhook channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// The name of this webhook.
    #[serde(default = "default_name")]
    pub name: String,
    /// The URL to send notifications to.
    pub url: String,
    /// HTTP headers to include with requests.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Timeout in seconds for HTTP requests.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Whether this channel is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_name() -> String {
    "webhook".to_string()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT_SECS
}

const fn default_enabled() -> bool {
    true
}

impl WebhookConfig {
    /// Creates a new webhook configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannel` if the URL is empty.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let config = Self {
            name: name.into(),
            url: url.into(),
            headers: HashMap::new(),
            timeout_secs: DEFAULT_NOTIFY_TIMEOUT_SECS,
            enabled: true,
        };
        config.validate()?;
        Ok(config)
    }

    /// Adds a header to the configuration.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets whether the channel is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannel` if the URL is empty or not HTTP(S).
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(AlertError::InvalidChannel {
                reason: "webhook URL cannot be empty".to_string(),
            });
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(AlertError::InvalidChannel {
                reason: format!("webhook URL must be http(s): {}", self.url),
            });
        }
        Ok(())
    }
}

/// The flat JSON document posted by [`WebhookNotifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Alert identifier.
    pub alert_id: String,
    /// Rule that raised the alert.
    pub rule_name: String,
    /// Severity label.
    pub severity: String,
    /// Alert title.
    pub title: String,
    /// Alert message.
    pub message: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// Snapshot copy at raise time.
    pub metadata: serde_json::Value,
    /// Channels the alert targets.
    pub channels: Vec<ChannelKind>,
    /// Whether this is an escalation.
    pub escalated: bool,
    /// Whether the alert has been resolved.
    pub resolved: bool,
}

impl WebhookPayload {
    /// Creates a payload from an alert.
    #[must_use]
    pub fn from_alert(alert: &Alert) -> Self {
        Self {
            alert_id: alert.id.clone(),
            rule_name: alert.rule_name.clone(),
            severity: alert.severity.as_str().to_string(),
            title: alert.title.clone(),
            message: alert.message.clone(),
            timestamp: alert.timestamp.to_rfc3339(),
            metadata: alert.metadata.clone(),
            channels: alert.channels.clone(),
            escalated: alert.escalated,
            resolved: alert.resolved,
        }
    }
}

/// Posts each alert as JSON to a configured URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Creates a new webhook notifier.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannel` if the configuration is invalid.
    pub fn new(config: WebhookConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    /// Returns the webhook URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Formats the alert as JSON.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::SerializationError` if serialization fails.
    pub fn format_payload(&self, alert: &Alert) -> Result<String> {
        let payload = WebhookPayload::from_alert(alert);
        serde_json::to_string(&payload).map_err(AlertError::from)
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    fn send<'a>(
        &'a self,
        alert: &'a Alert,
    ) -> Pin<Box<dyn Future<Output = Result<NotificationResult>> + Send + 'a>> {
        Box::pin(async move {
            if !self.is_enabled() {
                debug!(channel = %self.name(), "channel is disabled, skipping");
                return Ok(NotificationResult::success(self.name())
                    .with_message("channel disabled, notification skipped"));
            }

            let body = self.format_payload(alert)?;
            let mut request = self
                .client
                .post(&self.config.url)
                .timeout(Duration::from_secs(self.config.timeout_secs.max(1)))
                .header("Content-Type", "application/json")
                .body(body);
            for (key, value) in &self.config.headers {
                request = request.header(key, value);
            }

            let response = request.send().await.map_err(|e| AlertError::NotificationFailed {
                channel: self.name().to_string(),
                reason: e.without_url().to_string(),
            })?;

            let status = response.status().as_u16();
            if response.status().is_success() {
                info!(channel = %self.name(), alert = %alert.id, status, "sent webhook notification");
                Ok(NotificationResult::success(self.name()).with_status_code(status))
            } else {
                warn!(channel = %self.name(), alert = %alert.id, status, "webhook rejected notification");
                Ok(NotificationResult::failure(self.name(), format!("webhook returned {status}"))
                    .with_status_code(status))
            }
        })
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::test_support::sample_alert;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    mod config_tests {
        use super::*;

        #[test]
        fn webhook_config_new() {
            let config = WebhookConfig::new("ops", "http://example.com/alerts").unwrap();

            assert_eq!(config.name, "ops");
            assert_eq!(config.timeout_secs, DEFAULT_NOTIFY_TIMEOUT_SECS);
            assert!(config.enabled);
        }

        #[test]
        fn webhook_config_empty_url() {
            let result = WebhookConfig::new("ops", "");
            assert!(matches!(result, Err(AlertError::InvalidChannel { .. })));
        }

        #[test]
        fn webhook_config_non_http_url() {
            assert!(WebhookConfig::new("ops", "ftp://example.com").is_err());
        }

        #[test]
        fn webhook_config_deserializes_with_defaults() {
            let config: WebhookConfig =
                serde_json::from_str(r#"{"url": "https://hooks.example.com/x"}"#).unwrap();

            assert_eq!(config.name, "webhook");
            assert!(config.enabled);
            assert!(config.headers.is_empty());
        }
    }

    #[test]
    fn payload_is_flat() {
        let alert = sample_alert();
        let payload = WebhookPayload::from_alert(&alert);

        assert_eq!(payload.alert_id, alert.id);
        assert_eq!(payload.severity, "critical");
        assert_eq!(payload.metadata["overall_health_score"], 40.0);
        assert!(!payload.escalated);
        assert!(!payload.resolved);

        let value: serde_json::Value = serde_json::from_str(
            &WebhookNotifier::new(WebhookConfig::new("ops", "http://localhost/x").unwrap())
                .unwrap()
                .format_payload(&alert)
                .unwrap(),
        )
        .unwrap();
        assert_eq!(value["rule_name"], "health_score_critical");
        assert_eq!(value["channels"][1], "webhook");
    }

    #[tokio::test]
    async fn send_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts"))
            .and(header("x-team", "ops"))
            .and(body_partial_json(serde_json::json!({
                "rule_name": "health_score_critical",
                "severity": "critical",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = WebhookConfig::new("ops", format!("{}/alerts", server.uri()))
            .unwrap()
            .with_header("x-team", "ops");
        let notifier = WebhookNotifier::new(config).unwrap();

        let result = notifier.send(&sample_alert()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.status_code, Some(200));
        assert_eq!(notifier.kind(), ChannelKind::Webhook);
    }

    #[tokio::test]
    async fn non_success_status_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let notifier =
            WebhookNotifier::new(WebhookConfig::new("ops", server.uri()).unwrap()).unwrap();

        let result = notifier.send(&sample_alert()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.status_code, Some(503));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_error() {
        let config = WebhookConfig::new("ops", "http://127.0.0.1:9/alerts")
            .unwrap()
            .with_timeout_secs(1);
        let notifier = WebhookNotifier::new(config).unwrap();

        let err = notifier.send(&sample_alert()).await.unwrap_err();
        assert!(matches!(err, AlertError::NotificationFailed { .. }));
    }

    #[tokio::test]
    async fn disabled_webhook_skips() {
        let config = WebhookConfig::new("ops", "http://127.0.0.1:9/alerts")
            .unwrap()
            .enabled(false);
        let notifier = WebhookNotifier::new(config).unwrap();

        assert!(!notifier.is_enabled());
        let result = notifier.send(&sample_alert()).await.unwrap();
        assert!(result.success);
        assert!(result.message.unwrap().contains("disabled"));
    }
}
