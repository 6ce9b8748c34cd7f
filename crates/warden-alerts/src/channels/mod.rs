//! Notification channels for alert delivery.
//!
//! This module provides the [`Notifier`] trait and one implementation per
//! [`ChannelKind`]. Each notifier owns its rendering and holds no state
//! shared with the others.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::{Alert, ChannelKind};

mod chat;
mod console;
mod email;
mod webhook;

pub use chat::{ChatWebhookConfig, ChatWebhookNotifier};
pub use console::{ConsoleCapture, ConsoleNotifier};
pub use email::{EmailConfig, EmailNotifier};
pub use webhook::{WebhookConfig, WebhookNotifier, WebhookPayload};

/// Default timeout for outbound notification requests.
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Result of sending a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationResult {
    /// Whether the notification was sent successfully.
    pub success: bool,
    /// The channel that processed this notification.
    pub channel: String,
    /// Optional message or error description.
    pub message: Option<String>,
    /// Response status code (if applicable).
    pub status_code: Option<u16>,
}

impl NotificationResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
            status_code: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: Some(message.into()),
            status_code: None,
        }
    }

    /// Sets the status code.
    #[must_use]
    pub const fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

/// A channel-specific renderer and sender.
///
/// Implement this trait to add a delivery channel; the
/// [`Dispatcher`](crate::Dispatcher) fan-out needs no changes.
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Returns the name of this notifier.
    fn name(&self) -> &str;

    /// Returns the channel this notifier serves.
    fn kind(&self) -> ChannelKind;

    /// Sends an alert.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::NotificationFailed` if the alert cannot be sent.
    fn send<'a>(
        &'a self,
        alert: &'a Alert,
    ) -> Pin<Box<dyn Future<Output = Result<NotificationResult>> + Send + 'a>>;

    /// Returns true if this notifier is enabled.
    fn is_enabled(&self) -> bool {
        true
    }
}

pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Flattens a snapshot copy into sorted `(field, value)` rows.
pub(crate) fn metadata_rows(metadata: &serde_json::Value) -> Vec<(String, String)> {
    let Some(map) = metadata.as_object() else {
        return Vec::new();
    };
    let mut rows: Vec<(String, String)> = map
        .iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) if n.is_f64() => {
                    format!("{:.2}", n.as_f64().unwrap_or_default())
                }
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect();
    rows.sort();
    rows
}


#[cfg(test)]
mod tests {
    use super::*;

    mod notification_result_tests {
        use super::*;

        #[test]
        fn result_success() {
            let result = NotificationResult::success("webhook");

            assert!(result.success);
            assert_eq!(result.channel, "webhook");
            assert!(result.message.is_none());
        }

        #[test]
        fn result_failure() {
            let result = NotificationResult::failure("email", "connection refused");

            assert!(!result.success);
            assert_eq!(result.message, Some("connection refused".to_string()));
        }

        #[test]
        fn result_with_status_code() {
            let result = NotificationResult::success("chat").with_status_code(200);
            assert_eq!(result.status_code, Some(200));
        }
    }

    #[test]
    fn escape_html_special_chars() {
        assert_eq!(
            escape_html("<b>\"a\" & 'b'</b>"),
            "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn metadata_rows_are_sorted_and_formatted() {
        let rows = metadata_rows(&test_support::sample_alert().metadata);
        assert_eq!(rows[0], ("api_connectivity_score".to_string(), "33.33".to_string()));
        assert_eq!(rows[1], ("monitoring_active".to_string(), "true".to_string()));
        assert_eq!(rows[2], ("overall_health_score".to_string(), "40.00".to_string()));
        assert_eq!(rows[3], ("total_checks".to_string(), "3".to_string()));
    }

    #[test]
    fn metadata_rows_for_non_object() {
        assert!(metadata_rows(&serde_json::Value::Null).is_empty());
    }
}
