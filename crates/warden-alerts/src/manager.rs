//! Alert manager tying rules, deduplication, delivery and history together.
//!
//! This module provides the [`AlertManager`], the entry point of the
//! alerting pipeline. For each snapshot it evaluates the rules, resolves
//! alerts whose rule went quiet, throttles duplicates, fans the remainder
//! out through the [`Dispatcher`] and escalates alerts left unresolved
//! past their rule's escalation delay.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use warden_metrics::MetricsSnapshot;

use crate::dedup::{Deduplicator, DEFAULT_DEDUP_CAPACITY};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::engine::AlertEngine;
use crate::history::{AlertHistory, AlertStatistics, ChannelStats, DEFAULT_HISTORY_CAPACITY};
use crate::types::Alert;

/// Configuration for the alert manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertManagerConfig {
    /// Maximum number of alerts to keep.
    pub history_capacity: usize,
    /// Maximum number of dedup keys to keep.
    pub dedup_capacity: usize,
}

impl Default for AlertManagerConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
        }
    }
}

/// The result of processing one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessReport {
    /// Alerts raised by the rules.
    pub raised: usize,
    /// Alerts dropped by deduplication.
    pub suppressed: usize,
    /// Alerts accepted by a majority of their channels.
    pub delivered: usize,
    /// Per-alert dispatch outcomes, escalations included.
    pub outcomes: Vec<DispatchOutcome>,
    /// Ids of escalation alerts sent.
    pub escalated: Vec<String>,
    /// Ids of alerts auto-resolved.
    pub resolved: Vec<String>,
}

/// The alerting pipeline.
#[derive(Debug)]
pub struct AlertManager {
    engine: AlertEngine,
    dedup: Deduplicator,
    dispatcher: Dispatcher,
    history: Mutex<AlertHistory>,
}

impl AlertManager {
    /// Creates a manager with default configuration.
    #[must_use]
    pub fn new(engine: AlertEngine, dispatcher: Dispatcher) -> Self {
        Self::with_config(engine, dispatcher, &AlertManagerConfig::default())
    }

    /// Creates a manager with custom configuration.
    #[must_use]
    pub fn with_config(
        engine: AlertEngine,
        dispatcher: Dispatcher,
        config: &AlertManagerConfig,
    ) -> Self {
        Self {
            engine,
            dedup: Deduplicator::new(config.dedup_capacity),
            dispatcher,
            history: Mutex::new(AlertHistory::new(config.history_capacity)),
        }
    }

    /// Returns the rule engine.
    #[must_use]
    pub const fn engine(&self) -> &AlertEngine {
        &self.engine
    }

    /// Returns the dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // ============ History ============

    /// Seeds the history with previously persisted alerts.
    ///
    /// Restored alerts are recorded with the deduplicator so a restart does
    /// not resend them inside their throttle window.
    pub fn restore_history(&self, alerts: Vec<Alert>) {
        let count = alerts.len();
        let mut history = self.history.lock();
        for alert in alerts {
            if alert.is_active() {
                self.dedup.record(&alert);
            }
            history.push(alert);
        }
        info!(alerts = count, "restored alert history");
    }

    /// Seeds the per-channel counters with previously persisted values.
    pub fn restore_channel_stats(&self, stats: impl IntoIterator<Item = (String, ChannelStats)>) {
        self.history.lock().merge_channel_stats(stats);
    }

    /// Returns all alerts in history, oldest first.
    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        self.history.lock().alerts()
    }

    /// Returns unresolved alerts.
    #[must_use]
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.history.lock().active()
    }

    /// Returns per-channel delivery counters.
    #[must_use]
    pub fn channel_stats(&self) -> HashMap<String, ChannelStats> {
        self.history.lock().channel_stats().clone()
    }

    /// Computes statistics over the alert history.
    #[must_use]
    pub fn statistics(&self) -> AlertStatistics {
        self.history.lock().statistics()
    }

    // ============ Processing ============

    /// Runs one pass of the pipeline over `snapshot`.
    ///
    /// Delivery failures are reported in the result and never returned as
    /// errors.
    pub async fn process(&self, snapshot: &MetricsSnapshot) -> ProcessReport {
        let now = snapshot.timestamp;
        let candidates = self.engine.evaluate(snapshot);
        let firing: Vec<String> = candidates.iter().map(|a| a.rule_name.clone()).collect();

        let mut report = ProcessReport {
            raised: candidates.len(),
            resolved: self.history.lock().resolve_missing(&firing, now),
            ..ProcessReport::default()
        };
        for id in &report.resolved {
            info!(alert = %id, "alert resolved");
        }

        for alert in candidates {
            let throttle = self
                .engine
                .get_rule(&alert.rule_name)
                .map_or(Duration::ZERO, |r| r.throttle());
            if !self.dedup.should_send(&alert, throttle) {
                report.suppressed += 1;
                continue;
            }

            info!(
                alert = %alert.id,
                rule = %alert.rule_name,
                severity = %alert.severity,
                "alert triggered"
            );
            let outcome = self.dispatcher.dispatch(&alert).await;
            self.record(alert, &outcome, &mut report);
        }

        self.escalate(snapshot, &mut report).await;
        debug!(
            raised = report.raised,
            suppressed = report.suppressed,
            delivered = report.delivered,
            escalated = report.escalated.len(),
            "processed snapshot"
        );
        report
    }

    async fn escalate(&self, snapshot: &MetricsSnapshot, report: &mut ProcessReport) {
        let now = snapshot.timestamp;
        let delays: HashMap<String, Duration> = self
            .engine
            .list_rules()
            .into_iter()
            .filter_map(|r| r.escalation_after().map(|d| (r.name, d)))
            .collect();
        let due = self
            .history
            .lock()
            .due_for_escalation(now, |rule| delays.get(rule).copied());

        for original in due {
            let escalation = original.escalation(now);
            warn!(
                alert = %original.id,
                escalation = %escalation.id,
                severity = %escalation.severity,
                "escalating unresolved alert"
            );
            self.dedup.record(&escalation);
            self.history.lock().mark_escalated(&original.id);

            let outcome = self.dispatcher.dispatch(&escalation).await;
            report.escalated.push(escalation.id.clone());
            self.record(escalation, &outcome, report);
        }
    }

    fn record(&self, alert: Alert, outcome: &DispatchOutcome, report: &mut ProcessReport) {
        if outcome.delivered {
            report.delivered += 1;
        } else {
            warn!(
                alert = %alert.id,
                succeeded = outcome.succeeded.len(),
                attempted = outcome.attempted.len(),
                "alert not delivered to a majority of channels"
            );
        }

        {
            let mut history = self.history.lock();
            history.record_outcome(outcome);
            if outcome.any_succeeded() {
                history.push(alert);
            }
        }
        report.outcomes.push(outcome.clone());
    }
}
