//! Bounded alert history and delivery statistics.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchOutcome;
use crate::types::Alert;

/// Default number of alerts retained.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

/// Per-channel delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Successful sends.
    pub sent: u64,
    /// Failed sends.
    pub failed: u64,
}

/// Aggregate view over the alert history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStatistics {
    /// Alerts in history.
    pub total: usize,
    /// Unresolved alerts.
    pub active: usize,
    /// Resolved alerts.
    pub resolved: usize,
    /// Escalated alerts: escalation copies and the originals they escalate.
    pub escalated: usize,
    /// Count per severity label.
    pub by_severity: BTreeMap<String, usize>,
    /// Count per rule name.
    pub by_rule: BTreeMap<String, usize>,
    /// Delivery counters per channel.
    pub channel_stats: BTreeMap<String, ChannelStats>,
}

impl AlertStatistics {
    /// Computes statistics over `alerts`.
    #[must_use]
    pub fn from_alerts<'a>(
        alerts: impl IntoIterator<Item = &'a Alert>,
        channel_stats: &HashMap<String, ChannelStats>,
    ) -> Self {
        let mut stats = Self {
            channel_stats: channel_stats
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            ..Self::default()
        };
        for alert in alerts {
            stats.total += 1;
            if alert.resolved {
                stats.resolved += 1;
            } else {
                stats.active += 1;
            }
            if alert.escalated {
                stats.escalated += 1;
            }
            *stats
                .by_severity
                .entry(alert.severity.as_str().to_string())
                .or_default() += 1;
            *stats.by_rule.entry(alert.rule_name.clone()).or_default() += 1;
        }
        stats
    }
}

/// Dispatched alerts, oldest first.
#[derive(Debug)]
pub struct AlertHistory {
    capacity: usize,
    alerts: VecDeque<Alert>,
    channel_stats: HashMap<String, ChannelStats>,
}

impl AlertHistory {
    /// Creates a history retaining up to `capacity` alerts.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            alerts: VecDeque::new(),
            channel_stats: HashMap::new(),
        }
    }

    /// Appends an alert, evicting the oldest past capacity.
    pub fn push(&mut self, alert: Alert) {
        self.alerts.push_back(alert);
        while self.alerts.len() > self.capacity {
            self.alerts.pop_front();
        }
    }

    /// Folds a dispatch outcome into the channel counters.
    pub fn record_outcome(&mut self, outcome: &DispatchOutcome) {
        for kind in &outcome.succeeded {
            self.channel_stats
                .entry(kind.as_str().to_string())
                .or_default()
                .sent += 1;
        }
        for (kind, _) in &outcome.failures {
            self.channel_stats
                .entry(kind.as_str().to_string())
                .or_default()
                .failed += 1;
        }
    }

    /// Adds previously persisted counters to the current ones.
    pub fn merge_channel_stats(&mut self, stats: impl IntoIterator<Item = (String, ChannelStats)>) {
        for (channel, restored) in stats {
            let entry = self.channel_stats.entry(channel).or_default();
            entry.sent += restored.sent;
            entry.failed += restored.failed;
        }
    }

    /// Resolves active alerts whose rule is not in `firing`.
    ///
    /// Returns the ids of the alerts resolved.
    pub fn resolve_missing(&mut self, firing: &[String], at: DateTime<Utc>) -> Vec<String> {
        let mut resolved = Vec::new();
        for alert in self.alerts.iter_mut().filter(|a| a.is_active()) {
            if !firing.iter().any(|name| *name == alert.rule_name) {
                alert.resolve(at);
                resolved.push(alert.id.clone());
            }
        }
        resolved
    }

    /// Returns, per rule, the oldest active alert once it has been
    /// unresolved for the rule's escalation delay.
    ///
    /// An incident escalates once: rules with any active escalated alert
    /// are skipped, and throttle resends never start their own timer.
    /// `delay_for` maps a rule name to its escalation delay, if any.
    #[must_use]
    pub fn due_for_escalation(
        &self,
        now: DateTime<Utc>,
        delay_for: impl Fn(&str) -> Option<Duration>,
    ) -> Vec<Alert> {
        let escalated: HashSet<&str> = self
            .alerts
            .iter()
            .filter(|a| a.is_active() && a.escalated)
            .map(|a| a.rule_name.as_str())
            .collect();

        let mut seen = HashSet::new();
        self.alerts
            .iter()
            .filter(|a| a.is_active() && !escalated.contains(a.rule_name.as_str()))
            .filter(|&a| seen.insert(a.rule_name.as_str()))
            .filter(|a| {
                delay_for(&a.rule_name).is_some_and(|delay| {
                    let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
                    now.signed_duration_since(a.timestamp) >= delay
                })
            })
            .cloned()
            .collect()
    }

    /// Flags the stored alert `id` as escalated.
    ///
    /// Returns false if the alert is no longer retained.
    pub fn mark_escalated(&mut self, id: &str) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.escalated = true;
                true
            }
            None => false,
        }
    }

    /// Returns true if the alert `id` is retained and has been escalated.
    #[must_use]
    pub fn was_escalated(&self, id: &str) -> bool {
        self.alerts.iter().any(|a| a.id == id && a.escalated)
    }

    /// Returns all alerts, oldest first.
    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }

    /// Returns unresolved alerts.
    #[must_use]
    pub fn active(&self) -> Vec<Alert> {
        self.alerts.iter().filter(|a| a.is_active()).cloned().collect()
    }

    /// Returns the per-channel counters.
    #[must_use]
    pub const fn channel_stats(&self) -> &HashMap<String, ChannelStats> {
        &self.channel_stats
    }

    /// Computes statistics over the retained alerts.
    #[must_use]
    pub fn statistics(&self) -> AlertStatistics {
        AlertStatistics::from_alerts(&self.alerts, &self.channel_stats)
    }

    /// Returns the number of retained alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    /// Returns true if no alerts are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

impl Default for AlertHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
