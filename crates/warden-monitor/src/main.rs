//! warden - dependency health monitor
//!
//! Runs the monitor continuously (`--start`), performs a single cycle
//! (`--check`), or reports on persisted state (`--stats`, `--history`).

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use warden_alerts::AlertStatistics;
use warden_monitor::{
    run_until_signal, CheckReport, Cli, HistoryReport, Mode, Monitor, MonitorConfig,
    OutputFormat, SnapshotStore, StatsReport, DEFAULT_CONFIG_PATH,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = load_config(&cli.config)?;
    let format = OutputFormat::new(cli.format);

    match cli.mode() {
        Mode::Start => start(config).await,
        Mode::Check => check(config, format).await,
        Mode::Stats => stats(&config, format).await,
        Mode::History(hours) => history(&config, hours, format).await,
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warden=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(io::stderr)))
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<MonitorConfig> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(MonitorConfig::default());
    }
    Ok(MonitorConfig::load(path)?)
}

async fn start(config: MonitorConfig) -> anyhow::Result<()> {
    info!(project = %config.project, context = %config.context, "starting warden");
    let monitor = Monitor::new(config).await?;
    for warning in monitor.setup_warnings() {
        warn!("{warning}");
    }
    if let Err(e) = run_until_signal(&monitor).await {
        warn!(error = %e, "unclean shutdown");
    }
    Ok(())
}

async fn check(config: MonitorConfig, format: OutputFormat) -> anyhow::Result<()> {
    let monitor = Monitor::new(config).await?;
    monitor.set_monitoring_active(true);
    let cycle = monitor.run_cycle().await;

    let report = CheckReport {
        project: monitor.config().project.clone(),
        context: monitor.config().context.clone(),
        cycle,
    };
    print(&format, &report)
}

async fn stats(config: &MonitorConfig, format: OutputFormat) -> anyhow::Result<()> {
    let store = SnapshotStore::new(&config.storage);
    let snapshot = store.load_snapshot().await?;
    let alerts = match store.load_alert_log().await? {
        Some(log) => {
            let channel_stats: HashMap<_, _> = log.channel_stats.into_iter().collect();
            AlertStatistics::from_alerts(&log.alerts, &channel_stats)
        }
        None => AlertStatistics::default(),
    };
    print(&format, &StatsReport { snapshot, alerts })
}

async fn history(config: &MonitorConfig, hours: u64, format: OutputFormat) -> anyhow::Result<()> {
    let store = SnapshotStore::new(&config.storage);
    let entries = store.history_since(hours).await?;
    print(&format, &HistoryReport { hours, entries })
}

fn print<T>(format: &OutputFormat, value: &T) -> anyhow::Result<()>
where
    T: serde::Serialize + warden_monitor::TableDisplay,
{
    let mut stdout = io::stdout().lock();
    format.write(&mut stdout, value)?;
    stdout.flush()?;
    Ok(())
}
