//! The Warden monitor daemon.
//!
//! `warden-monitor` wires probes, credential validators, the metrics
//! collector and the alert manager into a [`Monitor`] that runs two
//! background loops, persists snapshots and history as JSON, and shuts down
//! gracefully on SIGINT/SIGTERM. It also hosts the `warden` binary.
//!
//! # Features
//!
//! - **TOML configuration**: services, credentials, channels and custom rules
//! - **Probe loop**: probes, validators, snapshot, alerting and persistence each cycle
//! - **Refresh loop**: keeps the persisted snapshot current between cycles
//! - **Atomic persistence**: snapshot, capped history and alert log
//! - **Graceful shutdown**: interruptible sleeps and a bounded stop
//!
//! # Example
//!
//! ```rust
//! use warden_monitor::MonitorConfig;
//!
//! let config = MonitorConfig::from_toml(
//!     r#"
//!     project = "atlas"
//!     probe_interval_secs = 120
//!
//!     [[services]]
//!     name = "billing"
//!     kind = "rest_api"
//!     endpoint = "https://billing.internal/health"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.project, "atlas");
//! assert_eq!(config.probe_interval().as_secs(), 120);
//! assert_eq!(config.services.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/warden-monitor/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod signal;
pub mod store;

// Re-export main types at crate root
pub use cli::{Cli, Mode, DEFAULT_CONFIG_PATH};
pub use config::{
    ChannelsConfig, ConsoleChannelConfig, LimitsConfig, MonitorConfig, StorageConfig,
    DEFAULT_PROBE_INTERVAL_SECS,
};
pub use error::{MonitorError, Result};
pub use orchestrator::{CycleReport, Monitor, MonitorBuilder, MonitorOptions, DEFAULT_REFRESH_INTERVAL};
pub use output::{CheckReport, Format, HistoryReport, OutputFormat, StatsReport, TableDisplay};
pub use signal::{run_until_signal, wait_for_shutdown_signal, ShutdownSignal};
pub use store::{AlertLog, SnapshotDocument, SnapshotStore, SnapshotTrends};
