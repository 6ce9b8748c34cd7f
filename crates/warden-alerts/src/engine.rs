//! The rule engine.
//!
//! [`AlertEngine`] owns the rule set and turns a snapshot into candidate
//! alerts. It keeps no per-alert state; lifecycle tracking lives in
//! [`AlertManager`](crate::AlertManager).

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::{debug, info};
use warden_metrics::MetricsSnapshot;

use crate::error::{AlertError, Result};
use crate::rule::{default_rules, AlertRule};
use crate::types::Alert;

/// A named set of alert rules.
#[derive(Debug, Default)]
pub struct AlertEngine {
    rules: RwLock<BTreeMap<String, AlertRule>>,
}

impl AlertEngine {
    /// Creates an engine with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine loaded with [`default_rules`].
    #[must_use]
    pub fn with_default_rules() -> Self {
        let engine = Self::new();
        {
            let mut rules = engine.rules.write();
            for rule in default_rules() {
                rules.insert(rule.name.clone(), rule);
            }
        }
        engine
    }

    // ============ Rule Management ============

    /// Adds a new alert rule.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidRule` if the rule fails validation and
    /// `AlertError::DuplicateRule` if the name is taken.
    pub fn add_rule(&self, rule: AlertRule) -> Result<()> {
        rule.validate()?;
        let mut rules = self.rules.write();

        if rules.contains_key(&rule.name) {
            return Err(AlertError::DuplicateRule { name: rule.name });
        }

        info!(rule = %rule.name, severity = %rule.severity, "added alert rule");
        rules.insert(rule.name.clone(), rule);
        Ok(())
    }

    /// Inserts or replaces a rule by name, returning the previous rule.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidRule` if the rule fails validation.
    pub fn replace_rule(&self, rule: AlertRule) -> Result<Option<AlertRule>> {
        rule.validate()?;
        info!(rule = %rule.name, "replaced alert rule");
        Ok(self.rules.write().insert(rule.name.clone(), rule))
    }

    /// Removes a rule by name.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::RuleNotFound` if the rule doesn't exist.
    pub fn remove_rule(&self, name: &str) -> Result<AlertRule> {
        let removed = self.rules.write().remove(name);
        match removed {
            Some(rule) => {
                info!(rule = %name, "removed alert rule");
                Ok(rule)
            }
            None => Err(AlertError::RuleNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Enables or disables a rule by replacing it.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::RuleNotFound` if the rule doesn't exist.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut rules = self.rules.write();
        let current = rules.get(name).ok_or_else(|| AlertError::RuleNotFound {
            name: name.to_string(),
        })?;
        let replacement = current.with_enabled(enabled);
        rules.insert(name.to_string(), replacement);
        info!(rule = %name, enabled, "toggled alert rule");
        Ok(())
    }

    /// Gets a rule by name.
    #[must_use]
    pub fn get_rule(&self, name: &str) -> Option<AlertRule> {
        self.rules.read().get(name).cloned()
    }

    /// Returns all rules ordered by name.
    #[must_use]
    pub fn list_rules(&self) -> Vec<AlertRule> {
        self.rules.read().values().cloned().collect()
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }

    // ============ Evaluation ============

    /// Evaluates every enabled rule against `snapshot`.
    ///
    /// Each rule fires independently; alerts are ordered by rule name.
    #[must_use]
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Vec<Alert> {
        let rules = self.rules.read();
        let alerts: Vec<Alert> = rules.values().filter_map(|r| r.raise(snapshot)).collect();
        debug!(rules = rules.len(), fired = alerts.len(), "evaluated alert rules");
        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{FlagField, MetricField, Predicate};
    use crate::types::AlertSeverity;
    use proptest::prelude::*;

    fn rule(name: &str, threshold: f64) -> AlertRule {
        AlertRule::builder(
            name,
            Predicate::score_below(MetricField::OverallHealthScore, threshold),
        )
        .build()
        .unwrap()
    }

    fn health(score: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            total_checks: 4,
            overall_health_score: score,
            api_connectivity_score: score,
            monitoring_active: true,
            ..MetricsSnapshot::default()
        }
    }

    mod management_tests {
        use super::*;

        #[test]
        fn add_and_get() {
            let engine = AlertEngine::new();
            engine.add_rule(rule("low", 50.0)).unwrap();

            assert_eq!(engine.rule_count(), 1);
            assert!(engine.get_rule("low").is_some());
            assert!(engine.get_rule("missing").is_none());
        }

        #[test]
        fn duplicate_add_rejected() {
            let engine = AlertEngine::new();
            engine.add_rule(rule("low", 50.0)).unwrap();
            let err = engine.add_rule(rule("low", 60.0)).unwrap_err();
            assert!(matches!(err, AlertError::DuplicateRule { .. }));
        }

        #[test]
        fn invalid_rule_rejected_on_add() {
            let engine = AlertEngine::new();
            let mut bad = rule("bad", 50.0);
            bad.channels.clear();
            assert!(matches!(engine.add_rule(bad), Err(AlertError::InvalidRule { .. })));
        }

        #[test]
        fn replace_returns_previous() {
            let engine = AlertEngine::new();
            assert!(engine.replace_rule(rule("low", 50.0)).unwrap().is_none());
            let previous = engine.replace_rule(rule("low", 60.0)).unwrap().unwrap();

            assert_eq!(
                previous.predicate,
                Predicate::score_below(MetricField::OverallHealthScore, 50.0)
            );
            assert_eq!(engine.rule_count(), 1);
        }

        #[test]
        fn remove_missing_is_error() {
            let engine = AlertEngine::new();
            assert!(matches!(
                engine.remove_rule("nope"),
                Err(AlertError::RuleNotFound { .. })
            ));
        }

        #[test]
        fn set_enabled_replaces_rule() {
            let engine = AlertEngine::new();
            engine.add_rule(rule("low", 50.0)).unwrap();
            engine.set_enabled("low", false).unwrap();

            assert!(!engine.get_rule("low").unwrap().enabled);
            assert!(engine.evaluate(&health(10.0)).is_empty());
            assert!(engine.set_enabled("missing", true).is_err());
        }

        #[test]
        fn list_is_sorted_by_name() {
            let engine = AlertEngine::new();
            engine.add_rule(rule("zeta", 50.0)).unwrap();
            engine.add_rule(rule("alpha", 50.0)).unwrap();

            let names: Vec<String> = engine.list_rules().into_iter().map(|r| r.name).collect();
            assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
        }
    }

    mod evaluation_tests {
        use super::*;

        #[test]
        fn each_rule_fires_independently() {
            let engine = AlertEngine::new();
            engine.add_rule(rule("below_50", 50.0)).unwrap();
            engine.add_rule(rule("below_70", 70.0)).unwrap();

            let alerts = engine.evaluate(&health(40.0));
            assert_eq!(alerts.len(), 2);
            assert_eq!(alerts[0].rule_name, "below_50");
            assert_eq!(alerts[1].rule_name, "below_70");

            assert_eq!(engine.evaluate(&health(60.0)).len(), 1);
            assert!(engine.evaluate(&health(90.0)).is_empty());
        }

        #[test]
        fn default_rules_at_40_percent() {
            let engine = AlertEngine::with_default_rules();
            let snapshot = MetricsSnapshot {
                overall_health_score: 40.0,
                api_connectivity_score: 80.0,
                ..health(40.0)
            };

            let alerts = engine.evaluate(&snapshot);
            let critical: Vec<&Alert> = alerts
                .iter()
                .filter(|a| a.severity == AlertSeverity::Critical)
                .collect();

            assert_eq!(critical.len(), 1);
            assert_eq!(critical[0].rule_name, "health_score_critical");
        }

        #[test]
        fn default_rules_nominal_snapshot() {
            let engine = AlertEngine::with_default_rules();
            assert!(engine.evaluate(&health(85.0)).is_empty());
        }

        #[test]
        fn flag_rule() {
            let engine = AlertEngine::new();
            engine
                .add_rule(
                    AlertRule::builder("inactive", Predicate::is_false(FlagField::MonitoringActive))
                        .build()
                        .unwrap(),
                )
                .unwrap();

            let mut snapshot = health(100.0);
            assert!(engine.evaluate(&snapshot).is_empty());
            snapshot.monitoring_active = false;
            assert_eq!(engine.evaluate(&snapshot).len(), 1);
        }
    }

    fn arb_snapshot() -> impl Strategy<Value = MetricsSnapshot> {
        (0usize..100, 0.0f64..=100.0, 0.0f64..=100.0, 0.0f64..20_000.0, any::<bool>(), 0usize..5)
            .prop_map(|(total, health, conn, latency, active, secrets)| MetricsSnapshot {
                total_checks: total,
                overall_health_score: health,
                api_connectivity_score: conn,
                avg_latency_ms: latency,
                monitoring_active: active,
                critical_secrets: secrets,
                ..MetricsSnapshot::default()
            })
    }

    proptest! {
        #[test]
        fn prop_empty_engine_never_alerts(snapshot in arb_snapshot()) {
            prop_assert!(AlertEngine::new().evaluate(&snapshot).is_empty());
        }
    }
}
