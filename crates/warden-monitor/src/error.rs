//! Error types for the monitor.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring or running the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem error on a persisted document.
    #[error("io error on {}: {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Writing command output failed.
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    /// A persisted document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Alerting error.
    #[error("alert error: {0}")]
    Alert(#[from] warden_alerts::AlertError),

    /// Metrics error.
    #[error("metrics error: {0}")]
    Metrics(#[from] warden_metrics::MetricsError),

    /// Stopping the background loops did not finish in time.
    #[error("shutdown timed out after {0:?}")]
    ShutdownTimeout(std::time::Duration),
}

impl MonitorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = MonitorError::Config("probe_interval_secs must be greater than 0".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: probe_interval_secs must be greater than 0"
        );
    }

    #[test]
    fn io_error_names_path() {
        let err = MonitorError::io(
            "/var/lib/warden/snapshot.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/var/lib/warden/snapshot.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn alert_error_converts() {
        let err: MonitorError = warden_alerts::AlertError::RuleNotFound {
            name: "x".to_string(),
        }
        .into();
        assert!(matches!(err, MonitorError::Alert(_)));
    }
}
