//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::output::Format;

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "warden.toml";

/// Warden - dependency health monitoring and alerting.
#[derive(Parser, Debug, Clone)]
#[command(name = "warden")]
#[command(version, about, long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["start", "check", "stats", "history"]),
))]
pub struct Cli {
    /// Run the monitor until SIGINT or SIGTERM.
    #[arg(long)]
    pub start: bool,

    /// Run a single cycle and print a report.
    #[arg(long)]
    pub check: bool,

    /// Print the latest snapshot and alert statistics.
    #[arg(long)]
    pub stats: bool,

    /// Print persisted snapshots from the last HOURS hours.
    #[arg(long, value_name = "HOURS")]
    pub history: Option<u64>,

    /// Configuration file.
    #[arg(short, long, env = "WARDEN_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Emit logs as JSON.
    #[arg(long)]
    pub log_json: bool,
}

/// What the binary was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `--start`.
    Start,
    /// `--check`.
    Check,
    /// `--stats`.
    Stats,
    /// `--history <hours>`.
    History(u64),
}

impl Cli {
    /// Returns the selected mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        if let Some(hours) = self.history {
            Mode::History(hours)
        } else if self.check {
            Mode::Check
        } else if self.stats {
            Mode::Stats
        } else {
            Mode::Start
        }
    }
}
