//! Core types for the alerting system.
//!
//! This module provides the fundamental types used throughout the warden-alerts crate:
//! - [`AlertSeverity`]: How urgent an alert is
//! - [`ChannelKind`]: Where an alert can be delivered
//! - [`Alert`]: One raised alert and its lifecycle flags

use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title prefix of escalation copies.
pub const ESCALATION_PREFIX: &str = "[ESCALATED]";

/// The severity level of an alert.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational alert, no action required.
    Info,
    /// Warning alert, should be investigated.
    #[default]
    Warning,
    /// Critical alert, requires immediate attention.
    Critical,
    /// Emergency, reached only through escalation or explicit rules.
    Emergency,
}

impl AlertSeverity {
    /// All severities, lowest first.
    pub const ALL: [Self; 4] = [Self::Info, Self::Warning, Self::Critical, Self::Emergency];

    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Emergency => "emergency",
        }
    }

    /// Returns the next level up, capped at [`AlertSeverity::Emergency`].
    #[must_use]
    pub const fn escalate(&self) -> Self {
        match self {
            Self::Info => Self::Warning,
            Self::Warning => Self::Critical,
            Self::Critical | Self::Emergency => Self::Emergency,
        }
    }

    /// Returns the display color as a hex string.
    #[must_use]
    pub const fn color(&self) -> &'static str {
        match self {
            Self::Info => "#2196f3",
            Self::Warning => "#ff9800",
            Self::Critical => "#f44336",
            Self::Emergency => "#8b0000",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A notification channel an alert can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Chat webhook (Slack-compatible card).
    Chat,
    /// SMTP email.
    Email,
    /// Generic JSON webhook.
    Webhook,
    /// Plain text on the console.
    Console,
}

impl ChannelKind {
    /// All channel kinds.
    pub const ALL: [Self; 4] = [Self::Chat, Self::Email, Self::Webhook, Self::Console];

    /// Returns the channel kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Email => "email",
            Self::Webhook => "webhook",
            Self::Console => "console",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raised alert.
///
/// Only the lifecycle fields (`escalated`, `resolved`, `resolved_at`) change
/// after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier for this alert instance.
    pub id: String,
    /// The rule that raised this alert.
    pub rule_name: String,
    /// The severity of the alert.
    pub severity: AlertSeverity,
    /// Short, stable title.
    pub title: String,
    /// Human-readable detail including current values.
    pub message: String,
    /// Copy of the triggering snapshot.
    pub metadata: serde_json::Value,
    /// When the alert was raised.
    pub timestamp: DateTime<Utc>,
    /// Channels the alert targets.
    pub channels: Vec<ChannelKind>,
    /// Whether the alert has been escalated.
    pub escalated: bool,
    /// Whether the alert has been resolved.
    pub resolved: bool,
    /// When the alert was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Creates an unresolved alert timestamped now.
    #[must_use]
    pub fn new(
        rule_name: impl Into<String>,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            rule_name: rule_name.into(),
            severity,
            title: title.into(),
            message: message.into(),
            metadata: serde_json::Value::Null,
            timestamp: Utc::now(),
            channels: Vec::new(),
            escalated: false,
            resolved: false,
            resolved_at: None,
        }
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the target channels.
    #[must_use]
    pub fn with_channels(mut self, channels: Vec<ChannelKind>) -> Self {
        self.channels = channels;
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns true while the alert is unresolved.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.resolved
    }

    /// Marks the alert resolved.
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        if !self.resolved {
            self.resolved = true;
            self.resolved_at = Some(at);
        }
    }

    /// Returns the stable dedup key for this alert.
    ///
    /// The key hashes the rule name, title and severity, so two alerts
    /// raised by the same rule in the same state share a key.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.rule_name.hash(&mut hasher);
        self.title.hash(&mut hasher);
        self.severity.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Returns true if `other` is semantically the same alert.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.rule_name == other.rule_name
            && self.title == other.title
            && self.severity == other.severity
    }

    /// Builds the escalation copy of this alert.
    ///
    /// The copy has a fresh id and timestamp, a prefixed title, and severity
    /// raised one level.
    #[must_use]
    pub fn escalation(&self, now: DateTime<Utc>) -> Self {
        let mut metadata = self.metadata.clone();
        if let Some(map) = metadata.as_object_mut() {
            map.insert(
                "escalated_from".to_string(),
                serde_json::Value::String(self.id.clone()),
            );
        }

        Self {
            id: Uuid::new_v4().to_string(),
            rule_name: self.rule_name.clone(),
            severity: self.severity.escalate(),
            title: format!("{ESCALATION_PREFIX} {}", self.title),
            message: format!(
                "Unresolved since {}. {}",
                self.timestamp.to_rfc3339(),
                self.message
            ),
            metadata,
            timestamp: now,
            channels: self.channels.clone(),
            escalated: true,
            resolved: false,
            resolved_at: None,
        }
    }
}
