//! Error types for the warden-alerts crate.

use thiserror::Error;

/// Errors that can occur in the alerting system.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Invalid alert rule configuration.
    #[error("invalid alert rule: {reason}")]
    InvalidRule {
        /// The reason the rule is invalid.
        reason: String,
    },

    /// A rule with the same name is already registered.
    #[error("rule already exists: {name}")]
    DuplicateRule {
        /// The conflicting rule name.
        name: String,
    },

    /// Alert rule with the given name was not found.
    #[error("rule not found: {name}")]
    RuleNotFound {
        /// The rule name that was not found.
        name: String,
    },

    /// A channel configuration is unusable.
    #[error("invalid channel config: {reason}")]
    InvalidChannel {
        /// The reason the channel config is invalid.
        reason: String,
    },

    /// Notification delivery failed.
    #[error("notification via {channel} failed: {reason}")]
    NotificationFailed {
        /// The channel that failed.
        channel: String,
        /// The reason the notification failed.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for AlertError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;
