//! Alert rules and the built-in rule set.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_metrics::MetricsSnapshot;

use crate::error::{AlertError, Result};
use crate::predicate::{FlagField, MetricField, Predicate};
use crate::types::{Alert, AlertSeverity, ChannelKind};

const fn default_enabled() -> bool {
    true
}

/// A named condition with severity, targets and timing.
///
/// Rules are never mutated in place; replace the whole rule to change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Unique name.
    pub name: String,
    /// Stable alert title; defaults to the name.
    #[serde(default)]
    pub title: String,
    /// Longer description placed in the alert message.
    #[serde(default)]
    pub description: String,
    /// The condition.
    pub predicate: Predicate,
    /// Severity of raised alerts.
    #[serde(default)]
    pub severity: AlertSeverity,
    /// Channels raised alerts target.
    pub channels: Vec<ChannelKind>,
    /// Minimum seconds between two dispatches of the same alert.
    #[serde(default)]
    pub throttle_secs: u64,
    /// Seconds an alert may stay unresolved before escalating.
    #[serde(default)]
    pub escalation_secs: Option<u64>,
    /// Whether the rule is evaluated.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl AlertRule {
    /// Maximum allowed length for rule names.
    pub const MAX_NAME_LENGTH: usize = 256;

    /// Creates a new alert rule builder.
    pub fn builder(name: impl Into<String>, predicate: Predicate) -> AlertRuleBuilder {
        AlertRuleBuilder::new(name, predicate)
    }

    /// Returns the throttle interval.
    #[must_use]
    pub const fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_secs)
    }

    /// Returns the escalation interval, if any.
    #[must_use]
    pub fn escalation_after(&self) -> Option<Duration> {
        self.escalation_secs.map(Duration::from_secs)
    }

    /// Returns the alert title.
    #[must_use]
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.name
        } else {
            &self.title
        }
    }

    /// Returns a copy with `enabled` changed.
    #[must_use]
    pub fn with_enabled(&self, enabled: bool) -> Self {
        Self {
            enabled,
            ..self.clone()
        }
    }

    /// Checks the rule for programmer errors.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidRule` if:
    /// - The name is empty, too long, or contains characters other than
    ///   ASCII alphanumerics, `_`, `-` and `.`
    /// - No channel is targeted
    /// - The escalation interval is zero
    /// - The predicate is invalid
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AlertError::InvalidRule {
                reason: "rule name cannot be empty".to_string(),
            });
        }

        if self.name.len() > Self::MAX_NAME_LENGTH {
            return Err(AlertError::InvalidRule {
                reason: format!(
                    "rule name exceeds maximum length of {} characters",
                    Self::MAX_NAME_LENGTH
                ),
            });
        }

        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(AlertError::InvalidRule {
                reason: format!("rule name '{}' contains invalid characters", self.name),
            });
        }

        if self.channels.is_empty() {
            return Err(AlertError::InvalidRule {
                reason: format!("rule '{}' targets no channels", self.name),
            });
        }

        if self.escalation_secs == Some(0) {
            return Err(AlertError::InvalidRule {
                reason: format!("rule '{}' has a zero escalation interval", self.name),
            });
        }

        self.predicate.validate()
    }

    /// Raises an alert from this rule if its predicate holds.
    #[must_use]
    pub fn raise(&self, snapshot: &MetricsSnapshot) -> Option<Alert> {
        if !self.enabled || !self.predicate.evaluate(snapshot) {
            return None;
        }

        let detail = self.predicate.explain(snapshot);
        let message = if self.description.is_empty() {
            detail
        } else {
            format!("{}. {detail}", self.description)
        };

        Some(
            Alert::new(&self.name, self.severity, self.display_title(), message)
                .with_metadata(serde_json::to_value(snapshot).unwrap_or_default())
                .with_channels(self.channels.clone())
                .at(snapshot.timestamp),
        )
    }
}

/// Builder for creating [`AlertRule`] instances.
#[derive(Debug)]
pub struct AlertRuleBuilder {
    rule: AlertRule,
}

impl AlertRuleBuilder {
    fn new(name: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            rule: AlertRule {
                name: name.into(),
                title: String::new(),
                description: String::new(),
                predicate,
                severity: AlertSeverity::Warning,
                channels: vec![ChannelKind::Console],
                throttle_secs: 0,
                escalation_secs: None,
                enabled: true,
            },
        }
    }

    /// Sets the alert title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.rule.title = title.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.rule.description = description.into();
        self
    }

    /// Sets the severity level.
    #[must_use]
    pub const fn severity(mut self, severity: AlertSeverity) -> Self {
        self.rule.severity = severity;
        self
    }

    /// Sets the target channels.
    #[must_use]
    pub fn channels(mut self, channels: &[ChannelKind]) -> Self {
        self.rule.channels = channels.to_vec();
        self
    }

    /// Sets the throttle interval.
    #[must_use]
    pub const fn throttle(mut self, throttle: Duration) -> Self {
        self.rule.throttle_secs = throttle.as_secs();
        self
    }

    /// Sets the escalation interval.
    #[must_use]
    pub const fn escalate_after(mut self, after: Duration) -> Self {
        self.rule.escalation_secs = Some(after.as_secs());
        self
    }

    /// Sets whether the rule is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.rule.enabled = enabled;
        self
    }

    /// Builds the [`AlertRule`].
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidRule` if [`AlertRule::validate`] fails.
    pub fn build(self) -> Result<AlertRule> {
        self.rule.validate()?;
        Ok(self.rule)
    }
}

const ALL_CHANNELS: &[ChannelKind] = &ChannelKind::ALL;
const WARNING_CHANNELS: &[ChannelKind] = &[ChannelKind::Chat, ChannelKind::Console];

fn has_checks() -> Predicate {
    Predicate::count_above(MetricField::TotalChecks, 0.0)
}

fn builtin(builder: AlertRuleBuilder) -> Option<AlertRule> {
    builder.build().ok()
}

/// Returns the built-in rule set.
///
/// Score rules only fire once at least one probe has a definite status, so
/// an empty history never raises health alerts.
#[must_use]
pub fn default_rules() -> Vec<AlertRule> {
    let minutes = |m: u64| Duration::from_secs(m * 60);

    [
        AlertRule::builder(
            "health_score_critical",
            Predicate::all(vec![
                has_checks(),
                Predicate::score_below(MetricField::OverallHealthScore, 50.0),
            ]),
        )
        .title("Critical system health")
        .description("Overall health score is below 50%")
        .severity(AlertSeverity::Critical)
        .channels(ALL_CHANNELS)
        .throttle(minutes(15))
        .escalate_after(minutes(30)),
        AlertRule::builder(
            "health_score_warning",
            Predicate::all(vec![
                has_checks(),
                Predicate::score_below(MetricField::OverallHealthScore, 70.0),
            ]),
        )
        .title("Degraded system health")
        .description("Overall health score is below 70%")
        .severity(AlertSeverity::Warning)
        .channels(WARNING_CHANNELS)
        .throttle(minutes(30))
        .escalate_after(minutes(60)),
        AlertRule::builder(
            "api_connectivity_critical",
            Predicate::all(vec![
                has_checks(),
                Predicate::score_below(MetricField::ApiConnectivityScore, 50.0),
            ]),
        )
        .title("API connectivity failure")
        .description("Fewer than half of the dependency probes are healthy")
        .severity(AlertSeverity::Critical)
        .channels(ALL_CHANNELS)
        .throttle(minutes(15))
        .escalate_after(minutes(30)),
        AlertRule::builder(
            "response_time_high",
            Predicate::all(vec![
                has_checks(),
                Predicate::count_above(MetricField::AvgLatencyMs, 5000.0),
            ]),
        )
        .title("High response times")
        .description("Average probe latency is above 5000 ms")
        .severity(AlertSeverity::Warning)
        .channels(WARNING_CHANNELS)
        .throttle(minutes(30)),
        AlertRule::builder(
            "critical_secrets_detected",
            Predicate::count_above(MetricField::CriticalSecrets, 0.0),
        )
        .title("Invalid credentials detected")
        .description("One or more credentials failed validation")
        .severity(AlertSeverity::Critical)
        .channels(ALL_CHANNELS)
        .throttle(minutes(60))
        .escalate_after(minutes(120)),
        AlertRule::builder(
            "monitoring_inactive",
            Predicate::is_false(FlagField::MonitoringActive),
        )
        .title("Monitoring inactive")
        .description("The background monitor is not running")
        .severity(AlertSeverity::Warning)
        .channels(WARNING_CHANNELS)
        .throttle(minutes(60)),
    ]
    .into_iter()
    .filter_map(builtin)
    .collect()
}
