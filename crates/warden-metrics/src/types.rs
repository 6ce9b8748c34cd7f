//! Core types for the metrics system.
//!
//! This module provides the fundamental types used throughout the warden-metrics crate:
//! - [`HealthStatus`]: The outcome class of a single probe
//! - [`ProbeResult`]: One timed check of one dependency
//! - [`ValidationResult`]: One credential format/strength check
//! - [`MetricsSnapshot`]: A point-in-time aggregate over the history

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The outcome class of a probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// The dependency answered as expected.
    Healthy,
    /// The dependency answered, but not as expected.
    Warning,
    /// The dependency is unreachable, timed out, or rejected our credentials.
    Critical,
    /// The probe could not determine a status.
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true if the status counts as healthy.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The result of probing one dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Name of the probed service.
    pub service: String,
    /// Outcome class.
    pub status: HealthStatus,
    /// Round-trip latency in milliseconds.
    pub latency_ms: f64,
    /// Error text for non-healthy outcomes.
    pub error: Option<String>,
    /// When the probe completed.
    pub timestamp: DateTime<Utc>,
    /// Free-form probe details (HTTP status code, endpoint, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ProbeResult {
    /// Creates a probe result timestamped now.
    #[must_use]
    pub fn new(service: impl Into<String>, status: HealthStatus, latency_ms: f64) -> Self {
        Self {
            service: service.into(),
            status,
            latency_ms,
            error: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Sets the error text.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Overrides the timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attaches a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// What aspect of a credential a validation looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationKind {
    /// Shape of the value (prefix, charset, length).
    Format,
    /// Whether the credential is accepted by its service.
    Connectivity,
    /// Length and character-class diversity.
    Strength,
}

impl ValidationKind {
    /// Returns the kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Connectivity => "connectivity",
            Self::Strength => "strength",
        }
    }
}

impl std::fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The result of validating one credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Name of the credential (never its value).
    pub credential: String,
    /// Whether the check passed.
    pub is_valid: bool,
    /// What was checked.
    pub kind: ValidationKind,
    /// Human-readable reason for a failure.
    pub error: Option<String>,
    /// When the check ran.
    pub timestamp: DateTime<Utc>,
}

impl ValidationResult {
    /// Creates a passing result timestamped now.
    #[must_use]
    pub fn valid(credential: impl Into<String>, kind: ValidationKind) -> Self {
        Self {
            credential: credential.into(),
            is_valid: true,
            kind,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a failing result with a reason, timestamped now.
    #[must_use]
    pub fn invalid(
        credential: impl Into<String>,
        kind: ValidationKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            credential: credential.into(),
            is_valid: false,
            kind,
            error: Some(reason.into()),
            timestamp: Utc::now(),
        }
    }
}

/// A point-in-time aggregate of the probe and validation history.
///
/// `total_checks` counts only probes with a definite status, so
/// `healthy_count + warning_count + critical_count == total_checks` always
/// holds; probes reporting [`HealthStatus::Unknown`] are tallied in
/// `unknown_count` and excluded from the scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// When the snapshot was computed.
    pub timestamp: DateTime<Utc>,
    /// Probes with a definite status.
    pub total_checks: usize,
    /// Healthy probes.
    pub healthy_count: usize,
    /// Warning probes.
    pub warning_count: usize,
    /// Critical probes.
    pub critical_count: usize,
    /// Probes that could not determine a status.
    pub unknown_count: usize,
    /// Mean latency of the counted probes.
    pub avg_latency_ms: f64,
    /// `healthy / total * 100`.
    pub api_connectivity_score: f64,
    /// `(healthy + 0.5 * warning) / total * 100`.
    pub overall_health_score: f64,
    /// Seconds since the collector was created.
    pub uptime_secs: u64,
    /// Validation results in the history.
    pub validations_total: usize,
    /// Failed validation results in the history.
    pub validations_failed: usize,
    /// Distinct credentials with a failing most recent check of any kind.
    pub critical_secrets: usize,
    /// Whether the background monitor loops are running.
    pub monitoring_active: bool,
}

impl MetricsSnapshot {
    /// Computes a snapshot from history slices.
    ///
    /// Validation results must be in chronological order so the latest
    /// result per credential wins.
    #[must_use]
    pub fn compute<'a, P, V>(
        probes: P,
        validations: V,
        uptime_secs: u64,
        monitoring_active: bool,
    ) -> Self
    where
        P: IntoIterator<Item = &'a ProbeResult>,
        V: IntoIterator<Item = &'a ValidationResult>,
    {
        let mut snapshot = Self {
            timestamp: Utc::now(),
            uptime_secs,
            monitoring_active,
            ..Self::default()
        };

        let mut latency_sum = 0.0;
        for probe in probes {
            match probe.status {
                HealthStatus::Healthy => snapshot.healthy_count += 1,
                HealthStatus::Warning => snapshot.warning_count += 1,
                HealthStatus::Critical => snapshot.critical_count += 1,
                HealthStatus::Unknown => {
                    snapshot.unknown_count += 1;
                    continue;
                }
            }
            latency_sum += probe.latency_ms;
        }
        snapshot.total_checks =
            snapshot.healthy_count + snapshot.warning_count + snapshot.critical_count;

        if snapshot.total_checks > 0 {
            let total = snapshot.total_checks as f64;
            snapshot.avg_latency_ms = latency_sum / total;
            snapshot.api_connectivity_score = snapshot.healthy_count as f64 / total * 100.0;
            snapshot.overall_health_score =
                (snapshot.healthy_count as f64 + 0.5 * snapshot.warning_count as f64) / total
                    * 100.0;
        }

        let mut latest: HashMap<(&str, ValidationKind), bool> = HashMap::new();
        for validation in validations {
            snapshot.validations_total += 1;
            if !validation.is_valid {
                snapshot.validations_failed += 1;
            }
            latest.insert(
                (validation.credential.as_str(), validation.kind),
                validation.is_valid,
            );
        }
        let mut failing: Vec<&str> = latest
            .into_iter()
            .filter(|(_, valid)| !*valid)
            .map(|((credential, _), _)| credential)
            .collect();
        failing.sort_unstable();
        failing.dedup();
        snapshot.critical_secrets = failing.len();

        snapshot
    }

    /// Returns the names of services whose latest probe was critical.
    #[must_use]
    pub fn critical_services<'a>(probes: impl IntoIterator<Item = &'a ProbeResult>) -> Vec<String> {
        let mut latest: HashMap<&str, HealthStatus> = HashMap::new();
        for probe in probes {
            latest.insert(probe.service.as_str(), probe.status);
        }
        let mut names: Vec<String> = latest
            .into_iter()
            .filter(|(_, status)| *status == HealthStatus::Critical)
            .map(|(name, _)| name.to_string())
            .collect();
        names.sort();
        names
    }
}
