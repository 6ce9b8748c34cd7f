//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;
use warden_alerts::AlertStatistics;
use warden_metrics::MetricsSnapshot;

use crate::error::Result;
use crate::orchestrator::CycleReport;
use crate::store::SnapshotDocument;

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<()>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)?;
                writeln!(writer)?;
            }
            Format::Table => value.write_table(writer)?,
        }
        Ok(())
    }

    /// Write a value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> std::io::Result<()>;
}

const RULE: &str = "══════════════════════════════════";

fn write_snapshot<W: Write>(writer: &mut W, s: &MetricsSnapshot) -> std::io::Result<()> {
    writeln!(writer, "Snapshot")?;
    writeln!(writer, "  Checks:           {}", s.total_checks)?;
    writeln!(
        writer,
        "  Healthy/Warn/Crit: {}/{}/{}",
        s.healthy_count, s.warning_count, s.critical_count
    )?;
    writeln!(writer, "  Health score:     {:.1}", s.overall_health_score)?;
    writeln!(writer, "  Connectivity:     {:.1}", s.api_connectivity_score)?;
    writeln!(writer, "  Avg latency:      {:.0} ms", s.avg_latency_ms)?;
    writeln!(
        writer,
        "  Validations:      {} ({} failed)",
        s.validations_total, s.validations_failed
    )?;
    writeln!(writer, "  Critical secrets: {}", s.critical_secrets)?;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

/// Result of `--check`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// Project name.
    pub project: String,
    /// Deployment context.
    pub context: String,
    /// The cycle that ran.
    #[serde(flatten)]
    pub cycle: CycleReport,
}

impl TableDisplay for CheckReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "Warden Check: {} ({})", self.project, self.context)?;
        writeln!(writer, "{RULE}")?;

        writeln!(writer, "Services")?;
        if self.cycle.probes.is_empty() {
            writeln!(writer, "  (none configured)")?;
        }
        for p in &self.cycle.probes {
            writeln!(
                writer,
                "  {:<20}  {:<8}  {:>8.0} ms  {}",
                truncate(&p.service, 20),
                p.status,
                p.latency_ms,
                p.error.as_deref().unwrap_or("")
            )?;
        }
        writeln!(writer)?;

        let failed: Vec<_> = self.cycle.validations.iter().filter(|v| !v.is_valid).collect();
        writeln!(
            writer,
            "Credentials ({} checks, {} failed)",
            self.cycle.validations.len(),
            failed.len()
        )?;
        for v in failed {
            writeln!(
                writer,
                "  {:<20}  {:<8}  {}",
                truncate(&v.credential, 20),
                v.kind,
                v.error.as_deref().unwrap_or("")
            )?;
        }
        writeln!(writer)?;

        write_snapshot(writer, &self.cycle.snapshot)?;
        writeln!(writer)?;

        let alerts = &self.cycle.alerts;
        writeln!(writer, "Alerts")?;
        writeln!(writer, "  Raised:           {}", alerts.raised)?;
        writeln!(writer, "  Suppressed:       {}", alerts.suppressed)?;
        writeln!(writer, "  Delivered:        {}", alerts.delivered)?;
        writeln!(writer, "  Resolved:         {}", alerts.resolved.len())?;
        writeln!(writer, "  Escalated:        {}", alerts.escalated.len())?;
        writeln!(writer)?;

        if self.cycle.errors.is_empty() {
            writeln!(writer, "No errors")?;
        } else {
            writeln!(writer, "Errors ({})", self.cycle.errors.len())?;
            for e in &self.cycle.errors {
                writeln!(writer, "  - {e}")?;
            }
        }
        Ok(())
    }
}

/// Result of `--stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// The latest persisted snapshot, if any.
    pub snapshot: Option<SnapshotDocument>,
    /// Statistics over the persisted alert log.
    pub alerts: AlertStatistics,
}

impl TableDisplay for StatsReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "Warden Statistics")?;
        writeln!(writer, "{RULE}")?;

        match &self.snapshot {
            Some(doc) => {
                writeln!(writer, "Project:            {} ({})", doc.project, doc.context)?;
                writeln!(writer, "Updated:            {}", doc.timestamp.to_rfc3339())?;
                writeln!(
                    writer,
                    "Monitoring:         {}",
                    if doc.monitoring_active { "active" } else { "inactive" }
                )?;
                writeln!(
                    writer,
                    "Trend 24h / 1h:     {} / {}",
                    doc.trends.day.label.as_str(),
                    doc.trends.hour.label.as_str()
                )?;
                writeln!(writer)?;
                write_snapshot(writer, &doc.metrics)?;
            }
            None => writeln!(writer, "No snapshot recorded yet")?,
        }
        writeln!(writer)?;

        let a = &self.alerts;
        writeln!(writer, "Alerts")?;
        writeln!(writer, "  Total:            {}", a.total)?;
        writeln!(writer, "  Active:           {}", a.active)?;
        writeln!(writer, "  Resolved:         {}", a.resolved)?;
        writeln!(writer, "  Escalated:        {}", a.escalated)?;
        for (severity, count) in &a.by_severity {
            writeln!(writer, "  {:<17} {count}", format!("{severity}:"))?;
        }

        if !a.by_rule.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "By rule")?;
            for (rule, count) in &a.by_rule {
                writeln!(writer, "  {:<32}  {count:>5}", truncate(rule, 32))?;
            }
        }

        if !a.channel_stats.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "{:<10}  {:>6}  {:>6}", "CHANNEL", "SENT", "FAILED")?;
            writeln!(writer, "{}", "─".repeat(26))?;
            for (channel, stats) in &a.channel_stats {
                writeln!(writer, "{channel:<10}  {:>6}  {:>6}", stats.sent, stats.failed)?;
            }
        }
        Ok(())
    }
}

/// Result of `--history <hours>`.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryReport {
    /// Window in hours.
    pub hours: u64,
    /// Matching documents, oldest first.
    pub entries: Vec<SnapshotDocument>,
}

impl TableDisplay for HistoryReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        if self.entries.is_empty() {
            writeln!(writer, "No history in the last {} hour(s)", self.hours)?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<25}  {:>6}  {:>6}  {:>6}  {:>10}  {:>7}",
            "TIMESTAMP", "CHECKS", "CRIT", "HEALTH", "LATENCY", "SECRETS"
        )?;
        writeln!(writer, "{}", "─".repeat(70))?;
        for doc in &self.entries {
            let m = &doc.metrics;
            writeln!(
                writer,
                "{:<25}  {:>6}  {:>6}  {:>6.1}  {:>7.0} ms  {:>7}",
                doc.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                m.total_checks,
                m.critical_count,
                m.overall_health_score,
                m.avg_latency_ms,
                m.critical_secrets
            )?;
        }
        writeln!(writer)?;
        writeln!(
            writer,
            "Total: {} snapshot(s) in the last {} hour(s)",
            self.entries.len(),
            self.hours
        )?;
        Ok(())
    }
}
