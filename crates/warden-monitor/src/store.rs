//! Persisted snapshot, history and alert log documents.
//!
//! Every write goes to a sibling temporary file first and is then renamed
//! over the target, so readers never observe a partial document.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};
use warden_alerts::{Alert, ChannelStats};
use warden_metrics::{MetricsSnapshot, Trend};

use crate::config::StorageConfig;
use crate::error::{MonitorError, Result};

/// Trends stored alongside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTrends {
    /// Trend over the last 24 hours.
    #[serde(rename = "24h")]
    pub day: Trend,
    /// Trend over the last hour.
    #[serde(rename = "1h")]
    pub hour: Trend,
}

/// The persisted snapshot document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// When the document was produced.
    pub timestamp: DateTime<Utc>,
    /// Project name.
    pub project: String,
    /// Deployment context.
    pub context: String,
    /// The snapshot.
    pub metrics: MetricsSnapshot,
    /// Windowed trends.
    pub trends: SnapshotTrends,
    /// Whether the background loops were running.
    pub monitoring_active: bool,
}

/// The persisted alert log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertLog {
    /// When the log was last written.
    pub updated_at: Option<DateTime<Utc>>,
    /// Delivered alerts, oldest first.
    pub alerts: Vec<Alert>,
    /// Delivery counters per channel.
    pub channel_stats: BTreeMap<String, ChannelStats>,
}

/// Reads and writes the monitor's JSON documents.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    snapshot_path: PathBuf,
    history_path: PathBuf,
    alert_log_path: PathBuf,
    history_limit: usize,
    alert_log_limit: usize,
}

impl SnapshotStore {
    /// Creates a store from storage settings.
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            snapshot_path: config.snapshot_path.clone(),
            history_path: config.history_path.clone(),
            alert_log_path: config.alert_log_path.clone(),
            history_limit: config.history_limit.max(1),
            alert_log_limit: config.alert_log_limit.max(1),
        }
    }

    /// Returns the snapshot file path.
    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    // ============ Snapshot ============

    /// Replaces the current snapshot document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be encoded or written.
    pub async fn write_snapshot(&self, doc: &SnapshotDocument) -> Result<()> {
        write_atomic(&self.snapshot_path, doc).await?;
        debug!(path = %self.snapshot_path.display(), "wrote snapshot");
        Ok(())
    }

    /// Reads the current snapshot document, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub async fn load_snapshot(&self) -> Result<Option<SnapshotDocument>> {
        read_json(&self.snapshot_path).await
    }

    // ============ History ============

    /// Appends a document to the history, dropping the oldest past the cap.
    ///
    /// A corrupt history file is replaced rather than blocking new writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be written.
    pub async fn append_history(&self, doc: &SnapshotDocument) -> Result<()> {
        let mut history = match self.history().await {
            Ok(history) => history,
            Err(e) => {
                warn!(path = %self.history_path.display(), error = %e, "discarding unreadable history");
                Vec::new()
            }
        };
        history.push(doc.clone());
        if history.len() > self.history_limit {
            let excess = history.len() - self.history_limit;
            history.drain(..excess);
        }
        write_atomic(&self.history_path, &history).await
    }

    /// Returns every history document, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub async fn history(&self) -> Result<Vec<SnapshotDocument>> {
        Ok(read_json(&self.history_path).await?.unwrap_or_default())
    }

    /// Returns history documents from the last `hours` hours.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read.
    pub async fn history_since(&self, hours: u64) -> Result<Vec<SnapshotDocument>> {
        self.history_since_at(hours, Utc::now()).await
    }

    async fn history_since_at(&self, hours: u64, now: DateTime<Utc>) -> Result<Vec<SnapshotDocument>> {
        let hours = i64::try_from(hours).unwrap_or(i64::MAX);
        let cutoff = ChronoDuration::try_hours(hours)
            .and_then(|d| now.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(self
            .history()
            .await?
            .into_iter()
            .filter(|d| d.timestamp >= cutoff)
            .collect())
    }

    // ============ Alert log ============

    /// Replaces the alert log with the newest `alert_log_limit` alerts.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written.
    pub async fn write_alert_log(
        &self,
        alerts: &[Alert],
        channel_stats: &HashMap<String, ChannelStats>,
    ) -> Result<()> {
        let start = alerts.len().saturating_sub(self.alert_log_limit);
        let log = AlertLog {
            updated_at: Some(Utc::now()),
            alerts: alerts[start..].to_vec(),
            channel_stats: channel_stats
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        };
        write_atomic(&self.alert_log_path, &log).await
    }

    /// Reads the alert log, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub async fn load_alert_log(&self) -> Result<Option<AlertLog>> {
        read_json(&self.alert_log_path).await
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

async fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| MonitorError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(
        ".{}.{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json)
        .await
        .map_err(|e| MonitorError::io(&tmp, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| MonitorError::io(path, e))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(MonitorError::io(path, e)),
    }
}
