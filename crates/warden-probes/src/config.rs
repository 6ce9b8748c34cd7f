//! Service definitions consumed by probes.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};
use crate::status::{StatusRule, StatusTable};

/// Prefix marking a value as an environment-variable reference.
pub const ENV_PREFIX: &str = "env:";

/// Default probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// How a service is probed and how its status codes are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Authenticated REST API, probed with `GET`.
    RestApi,
    /// Incoming webhook, probed with `POST {}`.
    Webhook,
    /// Plain HTTP endpoint, probed with `GET`.
    #[default]
    Http,
}

impl ServiceKind {
    /// Returns the default status table for this kind.
    #[must_use]
    pub fn status_table(&self) -> StatusTable {
        match self {
            Self::RestApi => StatusTable::rest_api(),
            Self::Webhook => StatusTable::webhook(),
            Self::Http => StatusTable::http(),
        }
    }

    /// Returns the kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RestApi => "rest_api",
            Self::Webhook => "webhook",
            Self::Http => "http",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One monitored dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Unique service name.
    pub name: String,
    /// How the service is probed.
    #[serde(default)]
    pub kind: ServiceKind,
    /// URL to probe. May be an `env:` reference.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Credential sent with the probe. May be an `env:` reference.
    #[serde(default)]
    pub credential: Option<String>,
    /// Header carrying the credential; `Authorization: Bearer` when unset.
    #[serde(default)]
    pub auth_header: Option<String>,
    /// Per-service timeout override in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Rules checked before the kind's default table.
    #[serde(default)]
    pub status_rules: Vec<StatusRule>,
    /// Extra headers sent with every probe.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ServiceConfig {
    /// Creates a config for `name` probing `endpoint`.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ServiceKind, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            endpoint: Some(endpoint.into()),
            credential: None,
            auth_header: None,
            timeout_secs: None,
            status_rules: Vec::new(),
            headers: HashMap::new(),
        }
    }

    /// Sets the credential reference.
    #[must_use]
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Sets the header carrying the credential.
    #[must_use]
    pub fn with_auth_header(mut self, header: impl Into<String>) -> Self {
        self.auth_header = Some(header.into());
        self
    }

    /// Sets the timeout override.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Adds a status rule override.
    #[must_use]
    pub fn with_status_rule(mut self, rule: StatusRule) -> Self {
        self.status_rules.push(rule);
        self
    }

    /// Returns the effective timeout given a process-wide default.
    #[must_use]
    pub fn timeout(&self, default: Duration) -> Duration {
        self.timeout_secs
            .filter(|s| *s > 0)
            .map_or(default, Duration::from_secs)
    }

    /// Returns the kind's table with this service's overrides applied.
    #[must_use]
    pub fn status_table(&self) -> StatusTable {
        self.kind.status_table().with_overrides(&self.status_rules)
    }

    /// Checks the config for programmer errors.
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::InvalidConfig` for an empty name or a status rule
    /// that can never match.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ProbeError::InvalidConfig {
                reason: "service name cannot be empty".to_string(),
            });
        }
        for rule in &self.status_rules {
            let inverted = rule.range.is_some_and(|(lo, hi)| lo > hi);
            if inverted || (rule.codes.is_empty() && rule.range.is_none()) {
                return Err(ProbeError::InvalidConfig {
                    reason: format!("service '{}' has a status rule that matches nothing", self.name),
                });
            }
        }
        Ok(())
    }
}

/// Resolves a possibly indirect secret value.
///
/// `env:NAME` reads the environment variable `NAME`; anything else is
/// returned as is.
///
/// # Errors
///
/// Returns `ProbeError::MissingSecret` if the variable is unset or empty.
pub fn resolve_secret(raw: &str) -> Result<String> {
    let Some(var) = raw.strip_prefix(ENV_PREFIX) else {
        return Ok(raw.to_string());
    };
    match std::env::var(var.trim()) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ProbeError::MissingSecret {
            reference: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_metrics::HealthStatus;

    #[test]
    fn literal_secret_passes_through() {
        assert_eq!(resolve_secret("plain-value").unwrap(), "plain-value");
    }

    #[test]
    fn missing_env_secret_is_an_error() {
        let err = resolve_secret("env:WARDEN_TEST_VARIABLE_THAT_IS_NEVER_SET").unwrap_err();
        assert!(matches!(err, ProbeError::MissingSecret { .. }));
        assert!(err.to_string().contains("WARDEN_TEST_VARIABLE_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn timeout_override() {
        let svc = ServiceConfig::new("a", ServiceKind::Http, "http://localhost");
        assert_eq!(svc.timeout(DEFAULT_PROBE_TIMEOUT), Duration::from_secs(10));

        let svc = svc.with_timeout_secs(2);
        assert_eq!(svc.timeout(DEFAULT_PROBE_TIMEOUT), Duration::from_secs(2));
    }

    #[test]
    fn zero_timeout_override_falls_back() {
        let svc = ServiceConfig::new("a", ServiceKind::Http, "http://x").with_timeout_secs(0);
        assert_eq!(svc.timeout(DEFAULT_PROBE_TIMEOUT), DEFAULT_PROBE_TIMEOUT);
    }

    #[test]
    fn validate_rejects_empty_name() {
        let svc = ServiceConfig::new("  ", ServiceKind::Http, "http://x");
        assert!(svc.validate().is_err());
    }

    #[test]
    fn validate_rejects_rule_matching_nothing() {
        let mut rule = StatusRule::codes(&[], HealthStatus::Healthy);
        rule.range = Some((500, 400));
        let svc = ServiceConfig::new("a", ServiceKind::Http, "http://x").with_status_rule(rule);
        assert!(svc.validate().is_err());
    }

    #[test]
    fn service_status_table_applies_overrides() {
        let svc = ServiceConfig::new("a", ServiceKind::RestApi, "http://x")
            .with_status_rule(StatusRule::codes(&[404], HealthStatus::Critical));
        assert_eq!(svc.status_table().classify(404).status, HealthStatus::Critical);
        assert_eq!(svc.status_table().classify(401).status, HealthStatus::Critical);
    }

    #[test]
    fn deserializes_with_defaults() {
        let svc: ServiceConfig =
            serde_json::from_str(r#"{"name": "github", "kind": "rest_api"}"#).unwrap();
        assert_eq!(svc.kind, ServiceKind::RestApi);
        assert!(svc.endpoint.is_none());
        assert!(svc.status_rules.is_empty());
    }
}
