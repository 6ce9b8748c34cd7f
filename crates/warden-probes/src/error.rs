//! Error types for the warden-probes crate.
//!
//! These errors only arise while *constructing* probes and credential specs.
//! A probe that has been built never fails: every outcome of a check is
//! reported as a [`ProbeResult`](warden_metrics::ProbeResult).

use thiserror::Error;

/// Errors that can occur while building probes.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The service has no endpoint configured.
    #[error("service '{service}' has no endpoint configured")]
    MissingEndpoint {
        /// The service name.
        service: String,
    },

    /// A secret reference could not be resolved.
    #[error("secret '{reference}' is not set")]
    MissingSecret {
        /// The unresolved reference (never the secret value).
        reference: String,
    },

    /// The service configuration is malformed.
    #[error("invalid service config: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("http client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Client(err.to_string())
    }
}

/// Result type for probe construction.
pub type Result<T> = std::result::Result<T, ProbeError>;
