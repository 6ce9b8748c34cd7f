//! Chat webhook channel (Slack-compatible incoming webhooks).

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{metadata_rows, NotificationResult, Notifier, DEFAULT_NOTIFY_TIMEOUT_SECS};
use crate::error::{AlertError, Result};
use crate::types::{Alert, AlertSeverity, ChannelKind};

/// Metadata fields rendered into the chat card, in display order.
const CARD_FIELDS: [&str; 4] = [
    "overall_health_score",
    "api_connectivity_score",
    "critical_secrets",
    "avg_latency_ms",
];

/// Configuration for the chat channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatWebhookConfig {
    /// Incoming webhook URL.
    pub url: String,
    /// Channel override, e.g. `#ops`.
    #[serde(default)]
    pub channel: Option<String>,
    /// Display name for the bot.
    #[serde(default)]
    pub username: Option<String>,
    /// Timeout in seconds for HTTP requests.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Whether this channel is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT_SECS
}

const fn default_enabled() -> bool {
    true
}

impl ChatWebhookConfig {
    /// Creates a configuration for the given webhook URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            channel: None,
            username: None,
            timeout_secs: DEFAULT_NOTIFY_TIMEOUT_SECS,
            enabled: true,
        }
    }

    /// Sets the channel override.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Sets the bot display name.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
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
    /// Returns `AlertError::InvalidChannel` if the URL is empty.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(AlertError::InvalidChannel {
                reason: "chat webhook URL cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Posts a severity-colored card to a chat webhook.
#[derive(Debug, Clone)]
pub struct ChatWebhookNotifier {
    config: ChatWebhookConfig,
    client: reqwest::Client,
}

impl ChatWebhookNotifier {
    /// Creates a new chat notifier.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannel` if the configuration is invalid.
    pub fn new(config: ChatWebhookConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    /// Renders the chat card body for an alert.
    #[must_use]
    pub fn render_card(&self, alert: &Alert) -> serde_json::Value {
        let mut fields = vec![
            json!({ "title": "Severity", "value": alert.severity.as_str().to_uppercase(), "short": true }),
            json!({ "title": "Rule", "value": alert.rule_name, "short": true }),
            json!({ "title": "Time", "value": alert.timestamp.to_rfc3339(), "short": false }),
        ];

        let rows = metadata_rows(&alert.metadata);
        for name in CARD_FIELDS {
            if let Some((_, value)) = rows.iter().find(|(k, _)| k == name) {
                fields.push(json!({ "title": name, "value": value, "short": true }));
            }
        }

        let mut body = json!({
            "username": self.config.username.as_deref().unwrap_or("warden"),
            "text": format!("{} {}", severity_icon(alert), alert.title),
            "attachments": [{
                "color": alert.severity.color(),
                "title": alert.title,
                "text": alert.message,
                "fields": fields,
                "footer": "warden",
                "ts": alert.timestamp.timestamp(),
            }],
        });
        if let Some(channel) = &self.config.channel {
            body["channel"] = json!(channel);
        }
        body
    }
}

fn severity_icon(alert: &Alert) -> &'static str {
    if alert.resolved {
        return ":white_check_mark:";
    }
    match alert.severity {
        AlertSeverity::Info => ":information_source:",
        AlertSeverity::Warning => ":warning:",
        AlertSeverity::Critical | AlertSeverity::Emergency => {
            ":rotating_light:"
        }
    }
}

impl Notifier for ChatWebhookNotifier {
    fn name(&self) -> &str {
        "chat"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Chat
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

            let body = self.render_card(alert);
            let response = self
                .client
                .post(&self.config.url)
                .timeout(Duration::from_secs(self.config.timeout_secs.max(1)))
                .json(&body)
                .send()
                .await
                .map_err(|e| AlertError::NotificationFailed {
                    channel: self.name().to_string(),
                    reason: e.without_url().to_string(),
                })?;

            let status = response.status().as_u16();
            if response.status().is_success() {
                info!(alert = %alert.id, rule = %alert.rule_name, "sent chat notification");
                Ok(NotificationResult::success(self.name()).with_status_code(status))
            } else {
                warn!(alert = %alert.id, status, "chat webhook rejected notification");
                Ok(NotificationResult::failure(self.name(), format!("chat webhook returned {status}"))
                    .with_status_code(status))
            }
        })
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}
