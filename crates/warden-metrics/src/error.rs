//! Error types for the warden-metrics crate.

use thiserror::Error;

/// Errors that can occur in the metrics system.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The trend window is invalid (zero or too large to represent).
    #[error("invalid trend window: {reason}")]
    InvalidWindow {
        /// The reason the window is invalid.
        reason: String,
    },

    /// A history backend failed to produce results.
    #[error("history backend error: {reason}")]
    Backend {
        /// The reason the backend failed.
        reason: String,
    },
}

/// Result type for metrics operations.
pub type Result<T> = std::result::Result<T, MetricsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_window() {
        let err = MetricsError::InvalidWindow {
            reason: "window must be positive".to_string(),
        };
        assert_eq!(err.to_string(), "invalid trend window: window must be positive");
    }

    #[test]
    fn error_display_backend() {
        let err = MetricsError::Backend {
            reason: "file unreadable".to_string(),
        };
        assert_eq!(err.to_string(), "history backend error: file unreadable");
    }
}
