//! The bounded metrics collector.
//!
//! [`MetricsCollector`] keeps the most recent probe and validation results
//! and derives [`MetricsSnapshot`]s and [`Trend`]s from them. All mutation
//! goes through a single lock; snapshots take the read side and never wait
//! on anything but that lock.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::trend::{window_start, ProbeHistory, Trend, DEFAULT_TREND_WINDOW};
use crate::types::{MetricsSnapshot, ProbeResult, ValidationResult};

/// Configuration for the collector.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Maximum probe results retained.
    pub max_probe_history: usize,
    /// Maximum validation results retained.
    pub max_validation_history: usize,
    /// Restricts snapshots to results newer than this; `None` uses the whole history.
    pub snapshot_window: Option<Duration>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_probe_history: 1000,
            max_validation_history: 1000,
            snapshot_window: None,
        }
    }
}

#[derive(Debug, Default)]
struct CollectorState {
    probes: VecDeque<ProbeResult>,
    validations: VecDeque<ValidationResult>,
    monitoring_active: bool,
}

/// Thread-safe bounded history of probe and validation results.
#[derive(Debug)]
pub struct MetricsCollector {
    config: CollectorConfig,
    started: Instant,
    state: RwLock<CollectorState>,
}

impl MetricsCollector {
    /// Creates a collector with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CollectorConfig::default())
    }

    /// Creates a collector with custom configuration.
    #[must_use]
    pub fn with_config(config: CollectorConfig) -> Self {
        Self {
            config,
            started: Instant::now(),
            state: RwLock::new(CollectorState::default()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Appends a probe result, evicting the oldest at capacity.
    pub fn ingest_probe(&self, result: ProbeResult) {
        let mut state = self.state.write();
        push_bounded(&mut state.probes, result, self.config.max_probe_history);
    }

    /// Appends several probe results under one lock acquisition.
    pub fn ingest_probes(&self, results: impl IntoIterator<Item = ProbeResult>) {
        let mut state = self.state.write();
        let mut added = 0usize;
        for result in results {
            push_bounded(&mut state.probes, result, self.config.max_probe_history);
            added += 1;
        }
        debug!(added, retained = state.probes.len(), "ingested probe results");
    }

    /// Appends a validation result, evicting the oldest at capacity.
    pub fn ingest_validation(&self, result: ValidationResult) {
        let mut state = self.state.write();
        push_bounded(&mut state.validations, result, self.config.max_validation_history);
    }

    /// Appends several validation results under one lock acquisition.
    pub fn ingest_validations(&self, results: impl IntoIterator<Item = ValidationResult>) {
        let mut state = self.state.write();
        for result in results {
            push_bounded(&mut state.validations, result, self.config.max_validation_history);
        }
    }

    /// Records whether the background monitor is running.
    pub fn set_monitoring_active(&self, active: bool) {
        self.state.write().monitoring_active = active;
    }

    /// Returns whether the background monitor is running.
    #[must_use]
    pub fn monitoring_active(&self) -> bool {
        self.state.read().monitoring_active
    }

    /// Computes a snapshot of the current history.
    ///
    /// An empty history yields an all-zero snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let cutoff = self
            .config
            .snapshot_window
            .and_then(|w| window_start(w, Utc::now()).ok());
        let uptime = self.started.elapsed().as_secs();

        let state = self.state.read();
        let in_window = |ts: &DateTime<Utc>| cutoff.is_none_or(|c| *ts >= c);

        MetricsSnapshot::compute(
            state.probes.iter().filter(|p| in_window(&p.timestamp)),
            state.validations.iter().filter(|v| in_window(&v.timestamp)),
            uptime,
            state.monitoring_active,
        )
    }

    /// Computes the trend over `window` from the in-memory history.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidWindow` for a zero window.
    pub fn trend(&self, window: Duration) -> Result<Trend> {
        let since = window_start(window, Utc::now())?;
        let state = self.state.read();
        Ok(Trend::from_probes(
            state.probes.iter().filter(|p| p.timestamp >= since),
            window,
        ))
    }

    /// Computes the 24 hour trend.
    #[must_use]
    pub fn daily_trend(&self) -> Trend {
        self.trend(DEFAULT_TREND_WINDOW)
            .unwrap_or_else(|_| Trend::from_probes(&[], DEFAULT_TREND_WINDOW))
    }

    /// Returns up to `limit` of the most recent probe results, newest first.
    #[must_use]
    pub fn recent_probes(&self, limit: usize) -> Vec<ProbeResult> {
        let state = self.state.read();
        state.probes.iter().rev().take(limit).cloned().collect()
    }

    /// Returns the names of services whose latest probe was critical.
    #[must_use]
    pub fn critical_services(&self) -> Vec<String> {
        let state = self.state.read();
        MetricsSnapshot::critical_services(&state.probes)
    }

    /// Returns the number of retained probe results.
    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.state.read().probes.len()
    }

    /// Returns the number of retained validation results.
    #[must_use]
    pub fn validation_count(&self) -> usize {
        self.state.read().validations.len()
    }

    /// Drops all retained results.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.probes.clear();
        state.validations.clear();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeHistory for MetricsCollector {
    fn probes_since(&self, since: DateTime<Utc>) -> Result<Vec<ProbeResult>> {
        let state = self.state.read();
        Ok(state
            .probes
            .iter()
            .filter(|p| p.timestamp >= since)
            .cloned()
            .collect())
    }
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, capacity: usize) {
    if capacity == 0 {
        return;
    }
    while buffer.len() >= capacity {
        buffer.pop_front();
    }
    buffer.push_back(item);
}
