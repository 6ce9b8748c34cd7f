//! SMTP email channel.

use std::fmt::Write as _;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{escape_html, metadata_rows, NotificationResult, Notifier, DEFAULT_NOTIFY_TIMEOUT_SECS};
use crate::error::{AlertError, Result};
use crate::types::{Alert, ChannelKind};

/// Configuration for the email channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host.
    pub smtp_host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
    /// Sender address.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Whether to upgrade the connection with STARTTLS.
    #[serde(default = "default_starttls")]
    pub starttls: bool,
    /// Timeout in seconds for the SMTP session.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Whether this channel is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_smtp_port() -> u16 {
    587
}

const fn default_starttls() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT_SECS
}

const fn default_enabled() -> bool {
    true
}

impl EmailConfig {
    /// Creates a configuration with no credentials.
    #[must_use]
    pub fn new(smtp_host: impl Into<String>, from: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            smtp_host: smtp_host.into(),
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from: from.into(),
            to,
            starttls: true,
            timeout_secs: DEFAULT_NOTIFY_TIMEOUT_SECS,
            enabled: true,
        }
    }

    /// Sets SMTP credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the SMTP port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.smtp_port = port;
        self
    }

    /// Sets whether STARTTLS is used.
    #[must_use]
    pub const fn with_starttls(mut self, starttls: bool) -> Self {
        self.starttls = starttls;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannel` if the host is empty, there are no
    /// recipients, or an address does not parse.
    pub fn validate(&self) -> Result<()> {
        if self.smtp_host.trim().is_empty() {
            return Err(AlertError::InvalidChannel {
                reason: "SMTP host cannot be empty".to_string(),
            });
        }
        if self.to.is_empty() {
            return Err(AlertError::InvalidChannel {
                reason: "email channel needs at least one recipient".to_string(),
            });
        }
        parse_mailbox(&self.from)?;
        for to in &self.to {
            parse_mailbox(to)?;
        }
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address.parse().map_err(|e| AlertError::InvalidChannel {
        reason: format!("invalid email address {address:?}: {e}"),
    })
}

/// Sends an HTML and plain-text email per alert.
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    /// Creates a new email notifier.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannel` if the configuration is invalid.
    pub fn new(config: EmailConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Renders the subject line.
    #[must_use]
    pub fn render_subject(alert: &Alert) -> String {
        format!(
            "[WARDEN][{}] {}",
            alert.severity.as_str().to_uppercase(),
            alert.title
        )
    }

    /// Renders the plain-text body.
    #[must_use]
    pub fn render_text(alert: &Alert) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", alert.title);
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", alert.message);
        let _ = writeln!(out);
        let _ = writeln!(out, "Severity: {}", alert.severity.as_str().to_uppercase());
        let _ = writeln!(out, "Rule:     {}", alert.rule_name);
        let _ = writeln!(out, "Time:     {}", alert.timestamp.to_rfc3339());
        let _ = writeln!(out, "Alert ID: {}", alert.id);
        let rows = metadata_rows(&alert.metadata);
        if !rows.is_empty() {
            let _ = writeln!(out);
            for (key, value) in rows {
                let _ = writeln!(out, "{key}: {value}");
            }
        }
        out
    }

    /// Renders the HTML body.
    #[must_use]
    pub fn render_html(alert: &Alert) -> String {
        let mut rows = String::new();
        for (key, value) in metadata_rows(&alert.metadata) {
            let _ = write!(
                rows,
                "<tr><td style=\"padding:4px 8px;color:#555\">{}</td><td style=\"padding:4px 8px\">{}</td></tr>",
                escape_html(&key),
                escape_html(&value)
            );
        }

        format!(
            "<!DOCTYPE html>\
             <html><body style=\"font-family:sans-serif\">\
             <div style=\"background:{color};color:#fff;padding:12px 16px\">\
             <strong>{severity}</strong> {title}</div>\
             <div style=\"padding:12px 16px\">\
             <p>{message}</p>\
             <p>Rule: <code>{rule}</code><br>Time: {time}<br>Alert ID: {id}</p>\
             <table style=\"border-collapse:collapse\">{rows}</table>\
             </div></body></html>",
            color = alert.severity.color(),
            severity = alert.severity.as_str().to_uppercase(),
            title = escape_html(&alert.title),
            message = escape_html(&alert.message),
            rule = escape_html(&alert.rule_name),
            time = alert.timestamp.to_rfc3339(),
            id = escape_html(&alert.id),
        )
    }

    /// Builds the MIME message for an alert.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannel` if an address does not parse and
    /// `AlertError::NotificationFailed` if the message cannot be assembled.
    pub fn build_message(&self, alert: &Alert) -> Result<Message> {
        let mut builder = Message::builder()
            .from(parse_mailbox(&self.config.from)?)
            .subject(Self::render_subject(alert));
        for to in &self.config.to {
            builder = builder.to(parse_mailbox(to)?);
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                Self::render_text(alert),
                Self::render_html(alert),
            ))
            .map_err(|e| AlertError::NotificationFailed {
                channel: "email".to_string(),
                reason: e.to_string(),
            })
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if self.config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host).map_err(
                |e| AlertError::InvalidChannel {
                    reason: format!("SMTP relay {}: {e}", self.config.smtp_host),
                },
            )?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_host)
        };

        let mut builder = builder
            .port(self.config.smtp_port)
            .timeout(Some(Duration::from_secs(self.config.timeout_secs.max(1))));
        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(builder.build())
    }
}

impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
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

            let message = self.build_message(alert)?;
            let mailer = self.transport()?;
            let response = mailer
                .send(message)
                .await
                .map_err(|e| AlertError::NotificationFailed {
                    channel: self.name().to_string(),
                    reason: e.to_string(),
                })?;

            info!(
                alert = %alert.id,
                recipients = self.config.to.len(),
                code = %response.code(),
                "sent email notification"
            );
            Ok(NotificationResult::success(self.name()))
        })
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}
