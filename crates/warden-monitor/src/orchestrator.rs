//! The monitor orchestrator.
//!
//! A [`Monitor`] owns the collector, the alert manager and the persistence
//! store, and drives two background loops:
//!
//! - the **probe loop** runs a full cycle (probes, validators, snapshot,
//!   alerting, persistence) and then sleeps for the probe interval;
//! - the **refresh loop** recomputes and persists the latest snapshot.
//!
//! Both loops share a `watch` stop signal and sleep with `select!` so
//! [`Monitor::stop`] wakes them immediately. A stop abandons probes that are
//! still in flight, but once alerting has begun the cycle finishes: alerts
//! are dispatched, recorded and persisted before the loop exits.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use warden_alerts::{AlertManager, Notifier, ProcessReport};
use warden_metrics::{MetricsCollector, MetricsSnapshot, ProbeResult, ValidationResult};
use warden_probes::{build_probes, run_all, validate_all, CredentialSpec, Probe};

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::store::{SnapshotDocument, SnapshotStore, SnapshotTrends};

/// Default interval of the refresh loop.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const HOUR: Duration = Duration::from_secs(60 * 60);

/// Tuning knobs that are not part of the configuration file.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Interval of the refresh loop.
    pub refresh_interval: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// Everything one probe cycle produced.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// Probe results, in probe order.
    pub probes: Vec<ProbeResult>,
    /// Credential validation results.
    pub validations: Vec<ValidationResult>,
    /// Snapshot computed after ingestion.
    pub snapshot: MetricsSnapshot,
    /// Alerting outcome.
    pub alerts: ProcessReport,
    /// Every problem seen during the cycle, including construction warnings.
    pub errors: Vec<String>,
}

impl CycleReport {
    /// Returns true if the cycle saw no problems at all.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

struct Inner {
    config: MonitorConfig,
    options: MonitorOptions,
    collector: MetricsCollector,
    manager: AlertManager,
    store: SnapshotStore,
    probes: Vec<Arc<dyn Probe>>,
    credentials: Vec<CredentialSpec>,
    setup_warnings: Vec<String>,
}

struct Workers {
    stop_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// The monitor orchestrator.
pub struct Monitor {
    inner: Arc<Inner>,
    workers: Mutex<Option<Workers>>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("project", &self.inner.config.project)
            .field("probes", &self.inner.probes.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Monitor`].
pub struct MonitorBuilder {
    config: MonitorConfig,
    options: MonitorOptions,
    probes: Option<Vec<Arc<dyn Probe>>>,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl MonitorBuilder {
    /// Starts a builder from a configuration.
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            options: MonitorOptions::default(),
            probes: None,
            notifiers: Vec::new(),
        }
    }

    /// Overrides the loop options.
    #[must_use]
    pub fn options(mut self, options: MonitorOptions) -> Self {
        self.options = options;
        self
    }

    /// Uses `probes` instead of the probes built from `services`.
    #[must_use]
    pub fn probes(mut self, probes: Vec<Arc<dyn Probe>>) -> Self {
        self.probes = Some(probes);
        self
    }

    /// Registers an extra notifier, replacing a configured one of the same kind.
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Validates the configuration and builds the monitor.
    ///
    /// Partially configured services and channels are skipped with a
    /// warning. A persisted alert log is restored if present.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Config` or `MonitorError::Alert` for an
    /// invalid configuration.
    pub async fn build(self) -> Result<Monitor> {
        let config = self.config;
        config.validate()?;

        let mut setup_warnings = Vec::new();

        let probes = if let Some(probes) = self.probes {
            probes
        } else {
            let (probes, skipped) = build_probes(&config.services, config.probe_timeout());
            setup_warnings.extend(
                skipped
                    .into_iter()
                    .map(|(service, reason)| format!("probe {service} skipped: {reason}")),
            );
            probes
        };

        let engine = config.build_engine()?;
        let (mut dispatcher, skipped) = config.build_dispatcher();
        setup_warnings.extend(
            skipped
                .into_iter()
                .map(|reason| format!("channel skipped: {reason}")),
        );
        for notifier in self.notifiers {
            dispatcher.register(notifier);
        }
        if dispatcher.channels().is_empty() {
            warn!("no notification channels configured; alerts will not be delivered");
        }

        let manager = AlertManager::with_config(engine, dispatcher, &config.alert_manager_config());
        let store = SnapshotStore::new(&config.storage);
        match store.load_alert_log().await {
            Ok(Some(log)) => {
                manager.restore_history(log.alerts);
                manager.restore_channel_stats(log.channel_stats);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "ignoring unreadable alert log"),
        }

        info!(
            project = %config.project,
            context = %config.context,
            probes = probes.len(),
            credentials = config.credentials.len(),
            rules = manager.engine().rule_count(),
            "monitor initialised"
        );

        Ok(Monitor {
            inner: Arc::new(Inner {
                collector: MetricsCollector::with_config(config.collector_config()),
                credentials: config.credentials.clone(),
                options: self.options,
                config,
                manager,
                store,
                probes,
                setup_warnings,
            }),
            workers: Mutex::new(None),
        })
    }
}

impl Monitor {
    /// Builds a monitor from a configuration with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub async fn new(config: MonitorConfig) -> Result<Self> {
        MonitorBuilder::new(config).build().await
    }

    /// Returns a builder.
    #[must_use]
    pub fn builder(config: MonitorConfig) -> MonitorBuilder {
        MonitorBuilder::new(config)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Returns the metrics collector.
    #[must_use]
    pub fn collector(&self) -> &MetricsCollector {
        &self.inner.collector
    }

    /// Returns the alert manager.
    #[must_use]
    pub fn manager(&self) -> &AlertManager {
        &self.inner.manager
    }

    /// Returns the persistence store.
    #[must_use]
    pub fn store(&self) -> &SnapshotStore {
        &self.inner.store
    }

    /// Returns the warnings collected while building the monitor.
    #[must_use]
    pub fn setup_warnings(&self) -> &[String] {
        &self.inner.setup_warnings
    }

    /// Returns true while the background loops are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.workers.lock().is_some()
    }

    /// Sets the `monitoring_active` flag reported in snapshots.
    pub fn set_monitoring_active(&self, active: bool) {
        self.inner.collector.set_monitoring_active(active);
    }

    // ============ Lifecycle ============

    /// Spawns the probe and refresh loops.
    ///
    /// Returns false without spawning anything if the loops already run.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, probe_interval: Duration) -> bool {
        let mut workers = self.workers.lock();
        if workers.is_some() {
            debug!("monitor already running");
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        self.inner.collector.set_monitoring_active(true);

        let probe_loop = tokio::spawn(probe_loop(
            Arc::clone(&self.inner),
            probe_interval,
            stop_rx.clone(),
        ));
        let refresh_loop = tokio::spawn(refresh_loop(
            Arc::clone(&self.inner),
            self.inner.options.refresh_interval,
            stop_rx,
        ));

        *workers = Some(Workers {
            stop_tx,
            handles: vec![probe_loop, refresh_loop],
        });
        info!(
            interval_secs = probe_interval.as_secs(),
            refresh_secs = self.inner.options.refresh_interval.as_secs(),
            "monitoring started"
        );
        true
    }

    /// Starts the loops with the configured probe interval.
    pub fn start_default(&self) -> bool {
        self.start(self.inner.config.probe_interval())
    }

    /// Signals both loops to stop and waits for them.
    ///
    /// Loops that do not finish within the configured shutdown timeout are
    /// aborted. Calling `stop` when nothing runs is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::ShutdownTimeout` if the loops had to be aborted.
    pub async fn stop(&self) -> Result<()> {
        let Some(workers) = self.workers.lock().take() else {
            return Ok(());
        };

        info!("stopping monitoring");
        let _ = workers.stop_tx.send(true);
        self.inner.collector.set_monitoring_active(false);

        let bound = self.inner.config.shutdown_timeout();
        let mut timed_out = false;
        for mut handle in workers.handles {
            match tokio::time::timeout(bound, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "monitor loop panicked"),
                Err(_) => {
                    handle.abort();
                    let _ = handle.await;
                    timed_out = true;
                }
            }
        }

        if timed_out {
            warn!(timeout_secs = bound.as_secs(), "monitor loops aborted");
            return Err(MonitorError::ShutdownTimeout(bound));
        }
        info!("monitoring stopped");
        Ok(())
    }

    // ============ Cycles ============

    /// Runs one full probe cycle and persists its results.
    pub async fn run_cycle(&self) -> CycleReport {
        self.inner.run_cycle().await
    }

    /// Recomputes and persists the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub async fn refresh(&self) -> Result<SnapshotDocument> {
        self.inner.refresh().await
    }
}

impl Inner {
    async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        let probes = run_all(&self.probes).await;
        self.finish_cycle(started_at, probes).await
    }

    /// Validation, alerting and persistence for one cycle. Runs to
    /// completion once entered so every dispatched alert is recorded.
    async fn finish_cycle(
        &self,
        started_at: DateTime<Utc>,
        probes: Vec<ProbeResult>,
    ) -> CycleReport {
        let mut errors = self.setup_warnings.clone();
        for result in &probes {
            if let Some(err) = &result.error {
                errors.push(format!("{}: {} ({err})", result.service, result.status));
            }
        }
        self.collector.ingest_probes(probes.iter().cloned());

        let validations = validate_all(&self.credentials);
        for result in validations.iter().filter(|v| !v.is_valid) {
            errors.push(format!(
                "{} {}: {}",
                result.credential,
                result.kind,
                result.error.as_deref().unwrap_or("invalid"),
            ));
        }
        self.collector.ingest_validations(validations.iter().cloned());

        let snapshot = self.collector.snapshot();
        let alerts = self.manager.process(&snapshot).await;
        for outcome in &alerts.outcomes {
            for (channel, reason) in &outcome.failures {
                errors.push(format!("alert {} via {channel}: {reason}", outcome.alert_id));
            }
        }

        if let Err(e) = self.persist(&snapshot).await {
            error!(error = %e, "failed to persist cycle results");
            errors.push(format!("persistence: {e}"));
        }

        info!(
            probes = probes.len(),
            healthy = snapshot.healthy_count,
            critical = snapshot.critical_count,
            health = format_args!("{:.1}", snapshot.overall_health_score),
            raised = alerts.raised,
            suppressed = alerts.suppressed,
            delivered = alerts.delivered,
            errors = errors.len(),
            "probe cycle complete"
        );

        CycleReport {
            started_at,
            probes,
            validations,
            snapshot,
            alerts,
            errors,
        }
    }

    async fn persist(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let doc = self.document(snapshot.clone())?;
        self.store.write_snapshot(&doc).await?;
        self.store.append_history(&doc).await?;
        self.store
            .write_alert_log(&self.manager.alerts(), &self.manager.channel_stats())
            .await
    }

    async fn refresh(&self) -> Result<SnapshotDocument> {
        let doc = self.document(self.collector.snapshot())?;
        self.store.write_snapshot(&doc).await?;
        Ok(doc)
    }

    fn document(&self, metrics: MetricsSnapshot) -> Result<SnapshotDocument> {
        Ok(SnapshotDocument {
            timestamp: metrics.timestamp,
            project: self.config.project.clone(),
            context: self.config.context.clone(),
            trends: SnapshotTrends {
                day: self.collector.trend(DAY)?,
                hour: self.collector.trend(HOUR)?,
            },
            monitoring_active: metrics.monitoring_active,
            metrics,
        })
    }
}

async fn probe_loop(inner: Arc<Inner>, interval: Duration, mut stop_rx: watch::Receiver<bool>) {
    debug!("probe loop started");
    loop {
        if *stop_rx.borrow() {
            break;
        }
        let started_at = Utc::now();
        let probes = tokio::select! {
            _ = stop_rx.changed() => break,
            probes = run_all(&inner.probes) => probes,
        };
        if *stop_rx.borrow() {
            debug!("stop requested, discarding probe results");
            break;
        }
        inner.finish_cycle(started_at, probes).await;
        tokio::select! {
            _ = stop_rx.changed() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
    debug!("probe loop stopped");
}

async fn refresh_loop(inner: Arc<Inner>, interval: Duration, mut stop_rx: watch::Receiver<bool>) {
    debug!("refresh loop started");
    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            () = tokio::time::sleep(interval) => {}
        }
        if let Err(e) = inner.refresh().await {
            error!(error = %e, "failed to refresh snapshot");
        }
    }
    debug!("refresh loop stopped");
}
