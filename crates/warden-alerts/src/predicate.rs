//! Typed predicates over a [`MetricsSnapshot`].
//!
//! Rules are composed from a small closed vocabulary instead of evaluated
//! expression strings, so every rule can be checked when it is built and
//! serialized as plain data in configuration files.
//!
//! ```rust
//! use warden_alerts::predicate::{MetricField, Predicate};
//! use warden_metrics::MetricsSnapshot;
//!
//! let rule = Predicate::all(vec![
//!     Predicate::count_above(MetricField::TotalChecks, 0.0),
//!     Predicate::score_below(MetricField::OverallHealthScore, 50.0),
//! ]);
//!
//! let snapshot = MetricsSnapshot {
//!     total_checks: 4,
//!     overall_health_score: 40.0,
//!     ..MetricsSnapshot::default()
//! };
//! assert!(rule.evaluate(&snapshot));
//! assert!(!rule.evaluate(&MetricsSnapshot::default()));
//! ```

use serde::{Deserialize, Serialize};
use warden_metrics::MetricsSnapshot;

use crate::error::{AlertError, Result};

/// Maximum nesting depth of composite predicates.
pub const MAX_PREDICATE_DEPTH: usize = 8;

/// A numeric snapshot field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    /// `overall_health_score`.
    OverallHealthScore,
    /// `api_connectivity_score`.
    ApiConnectivityScore,
    /// `avg_latency_ms`.
    AvgLatencyMs,
    /// `total_checks`.
    TotalChecks,
    /// `healthy_count`.
    HealthyCount,
    /// `warning_count`.
    WarningCount,
    /// `critical_count`.
    CriticalCount,
    /// `unknown_count`.
    UnknownCount,
    /// `validations_total`.
    ValidationsTotal,
    /// `validations_failed`.
    ValidationsFailed,
    /// `critical_secrets`.
    CriticalSecrets,
    /// `uptime_secs`.
    UptimeSecs,
}

impl MetricField {
    /// Reads the field from a snapshot.
    #[must_use]
    pub fn read(&self, snapshot: &MetricsSnapshot) -> f64 {
        match self {
            Self::OverallHealthScore => snapshot.overall_health_score,
            Self::ApiConnectivityScore => snapshot.api_connectivity_score,
            Self::AvgLatencyMs => snapshot.avg_latency_ms,
            Self::TotalChecks => snapshot.total_checks as f64,
            Self::HealthyCount => snapshot.healthy_count as f64,
            Self::WarningCount => snapshot.warning_count as f64,
            Self::CriticalCount => snapshot.critical_count as f64,
            Self::UnknownCount => snapshot.unknown_count as f64,
            Self::ValidationsTotal => snapshot.validations_total as f64,
            Self::ValidationsFailed => snapshot.validations_failed as f64,
            Self::CriticalSecrets => snapshot.critical_secrets as f64,
            Self::UptimeSecs => snapshot.uptime_secs as f64,
        }
    }

    /// Returns the snapshot field name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OverallHealthScore => "overall_health_score",
            Self::ApiConnectivityScore => "api_connectivity_score",
            Self::AvgLatencyMs => "avg_latency_ms",
            Self::TotalChecks => "total_checks",
            Self::HealthyCount => "healthy_count",
            Self::WarningCount => "warning_count",
            Self::CriticalCount => "critical_count",
            Self::UnknownCount => "unknown_count",
            Self::ValidationsTotal => "validations_total",
            Self::ValidationsFailed => "validations_failed",
            Self::CriticalSecrets => "critical_secrets",
            Self::UptimeSecs => "uptime_secs",
        }
    }
}

/// A boolean snapshot field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagField {
    /// `monitoring_active`.
    MonitoringActive,
}

impl FlagField {
    /// Reads the flag from a snapshot.
    #[must_use]
    pub const fn read(&self, snapshot: &MetricsSnapshot) -> bool {
        match self {
            Self::MonitoringActive => snapshot.monitoring_active,
        }
    }

    /// Returns the snapshot field name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MonitoringActive => "monitoring_active",
        }
    }
}

/// A condition over a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// `field < threshold`.
    ScoreBelow {
        /// Field to read.
        field: MetricField,
        /// Exclusive upper bound.
        threshold: f64,
    },
    /// `field > n`.
    CountAbove {
        /// Field to read.
        field: MetricField,
        /// Exclusive lower bound.
        n: f64,
    },
    /// The flag is false.
    FieldIsFalse {
        /// Flag to read.
        field: FlagField,
    },
    /// The flag is true.
    FieldIsTrue {
        /// Flag to read.
        field: FlagField,
    },
    /// Every inner predicate holds.
    All {
        /// Inner predicates.
        predicates: Vec<Predicate>,
    },
    /// At least one inner predicate holds.
    Any {
        /// Inner predicates.
        predicates: Vec<Predicate>,
    },
    /// The inner predicate does not hold.
    Not {
        /// Inner predicate.
        predicate: Box<Predicate>,
    },
}

impl Predicate {
    /// `field < threshold`.
    #[must_use]
    pub const fn score_below(field: MetricField, threshold: f64) -> Self {
        Self::ScoreBelow { field, threshold }
    }

    /// `field > n`.
    #[must_use]
    pub const fn count_above(field: MetricField, n: f64) -> Self {
        Self::CountAbove { field, n }
    }

    /// The flag is false.
    #[must_use]
    pub const fn is_false(field: FlagField) -> Self {
        Self::FieldIsFalse { field }
    }

    /// The flag is true.
    #[must_use]
    pub const fn is_true(field: FlagField) -> Self {
        Self::FieldIsTrue { field }
    }

    /// Conjunction.
    #[must_use]
    pub const fn all(predicates: Vec<Self>) -> Self {
        Self::All { predicates }
    }

    /// Disjunction.
    #[must_use]
    pub const fn any(predicates: Vec<Self>) -> Self {
        Self::Any { predicates }
    }

    /// Negation.
    #[must_use]
    pub fn negate(predicate: Self) -> Self {
        Self::Not {
            predicate: Box::new(predicate),
        }
    }

    /// Evaluates the predicate.
    #[must_use]
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> bool {
        match self {
            Self::ScoreBelow { field, threshold } => field.read(snapshot) < *threshold,
            Self::CountAbove { field, n } => field.read(snapshot) > *n,
            Self::FieldIsFalse { field } => !field.read(snapshot),
            Self::FieldIsTrue { field } => field.read(snapshot),
            Self::All { predicates } => predicates.iter().all(|p| p.evaluate(snapshot)),
            Self::Any { predicates } => predicates.iter().any(|p| p.evaluate(snapshot)),
            Self::Not { predicate } => !predicate.evaluate(snapshot),
        }
    }

    /// Describes the predicate with the snapshot's current values.
    #[must_use]
    pub fn explain(&self, snapshot: &MetricsSnapshot) -> String {
        match self {
            Self::ScoreBelow { field, threshold } => format!(
                "{} is {:.1} (threshold < {threshold})",
                field.as_str(),
                field.read(snapshot)
            ),
            Self::CountAbove { field, n } => format!(
                "{} is {} (threshold > {n})",
                field.as_str(),
                field.read(snapshot)
            ),
            Self::FieldIsFalse { field } | Self::FieldIsTrue { field } => {
                format!("{} is {}", field.as_str(), field.read(snapshot))
            }
            Self::All { predicates } => join(predicates, snapshot, " and "),
            Self::Any { predicates } => join(predicates, snapshot, " or "),
            Self::Not { predicate } => format!("not ({})", predicate.explain(snapshot)),
        }
    }

    /// Checks the predicate for construction errors.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidRule` for non-finite thresholds, empty
    /// compositions, or nesting deeper than [`MAX_PREDICATE_DEPTH`].
    pub fn validate(&self) -> Result<()> {
        self.validate_at(0)
    }

    fn validate_at(&self, depth: usize) -> Result<()> {
        if depth > MAX_PREDICATE_DEPTH {
            return Err(AlertError::InvalidRule {
                reason: format!("predicate nesting exceeds {MAX_PREDICATE_DEPTH} levels"),
            });
        }
        match self {
            Self::ScoreBelow { threshold: value, field } | Self::CountAbove { n: value, field } => {
                if !value.is_finite() {
                    return Err(AlertError::InvalidRule {
                        reason: format!("threshold for {} must be finite", field.as_str()),
                    });
                }
                Ok(())
            }
            Self::FieldIsFalse { .. } | Self::FieldIsTrue { .. } => Ok(()),
            Self::All { predicates } | Self::Any { predicates } => {
                if predicates.is_empty() {
                    return Err(AlertError::InvalidRule {
                        reason: "composite predicate has no members".to_string(),
                    });
                }
                predicates.iter().try_for_each(|p| p.validate_at(depth + 1))
            }
            Self::Not { predicate } => predicate.validate_at(depth + 1),
        }
    }
}

fn join(predicates: &[Predicate], snapshot: &MetricsSnapshot, sep: &str) -> String {
    predicates
        .iter()
        .map(|p| p.explain(snapshot))
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn snapshot(health: f64, connectivity: f64, latency: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            total_checks: 10,
            overall_health_score: health,
            api_connectivity_score: connectivity,
            avg_latency_ms: latency,
            monitoring_active: true,
            ..MetricsSnapshot::default()
        }
    }

    #[test_case(49.9, true ; "below")]
    #[test_case(50.0, false ; "at threshold")]
    #[test_case(80.0, false ; "above")]
    fn score_below_is_strict(health: f64, expected: bool) {
        let p = Predicate::score_below(MetricField::OverallHealthScore, 50.0);
        assert_eq!(p.evaluate(&snapshot(health, 100.0, 10.0)), expected);
    }

    #[test_case(5000.0, false ; "at threshold")]
    #[test_case(5000.1, true ; "above")]
    fn count_above_is_strict(latency: f64, expected: bool) {
        let p = Predicate::count_above(MetricField::AvgLatencyMs, 5000.0);
        assert_eq!(p.evaluate(&snapshot(100.0, 100.0, latency)), expected);
    }

    #[test]
    fn flags() {
        let mut s = snapshot(100.0, 100.0, 1.0);
        assert!(!Predicate::is_false(FlagField::MonitoringActive).evaluate(&s));
        assert!(Predicate::is_true(FlagField::MonitoringActive).evaluate(&s));
        s.monitoring_active = false;
        assert!(Predicate::is_false(FlagField::MonitoringActive).evaluate(&s));
    }

    #[test]
    fn composition() {
        let s = snapshot(40.0, 90.0, 1.0);
        let low_health = Predicate::score_below(MetricField::OverallHealthScore, 50.0);
        let low_conn = Predicate::score_below(MetricField::ApiConnectivityScore, 50.0);

        assert!(!Predicate::all(vec![low_health.clone(), low_conn.clone()]).evaluate(&s));
        assert!(Predicate::any(vec![low_health.clone(), low_conn]).evaluate(&s));
        assert!(!Predicate::negate(low_health).evaluate(&s));
    }

    #[test]
    fn explain_includes_current_value() {
        let p = Predicate::score_below(MetricField::OverallHealthScore, 50.0);
        assert_eq!(
            p.explain(&snapshot(40.0, 0.0, 0.0)),
            "overall_health_score is 40.0 (threshold < 50)"
        );
    }

    #[test]
    fn validate_rejects_bad_predicates() {
        assert!(Predicate::score_below(MetricField::AvgLatencyMs, f64::NAN).validate().is_err());
        assert!(Predicate::all(vec![]).validate().is_err());

        let mut deep = Predicate::is_true(FlagField::MonitoringActive);
        for _ in 0..=MAX_PREDICATE_DEPTH {
            deep = Predicate::negate(deep);
        }
        assert!(deep.validate().is_err());
    }

    #[test]
    fn deserializes_tagged_form() {
        let p: Predicate = serde_json::from_str(
            r#"{"type": "all", "predicates": [
                {"type": "count_above", "field": "total_checks", "n": 0},
                {"type": "score_below", "field": "api_connectivity_score", "threshold": 75}
            ]}"#,
        )
        .unwrap();

        assert!(p.validate().is_ok());
        assert!(p.evaluate(&snapshot(100.0, 70.0, 1.0)));
    }
}
