//! Health metrics for dependency monitoring.
//!
//! `warden-metrics` keeps a bounded, in-memory history of probe and
//! credential-validation results and derives point-in-time health
//! snapshots and windowed trends from it.
//!
//! # Features
//!
//! - **Bounded history**: oldest results are evicted once capacity is reached
//! - **Snapshots**: counts by status, average latency, connectivity and health scores
//! - **Trends**: healthy ratio over a wall-clock window with a label ladder
//! - **Pluggable history**: trends can be computed from any [`ProbeHistory`]
//!
//! # Example
//!
//! ```rust
//! use warden_metrics::{HealthStatus, MetricsCollector, ProbeResult};
//!
//! let collector = MetricsCollector::new();
//!
//! collector.ingest_probe(ProbeResult::new("openai", HealthStatus::Healthy, 120.0));
//! collector.ingest_probe(ProbeResult::new("github", HealthStatus::Warning, 480.0));
//!
//! let snapshot = collector.snapshot();
//! assert_eq!(snapshot.total_checks, 2);
//! assert!((snapshot.overall_health_score - 75.0).abs() < f64::EPSILON);
//! ```

#![forbid(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/warden-metrics/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod collector;
pub mod error;
pub mod trend;
pub mod types;

// Re-export main types at crate root
pub use collector::{CollectorConfig, MetricsCollector};
pub use error::{MetricsError, Result};
pub use trend::{compute_trend, ProbeHistory, Trend, TrendLabel};
pub use types::{HealthStatus, MetricsSnapshot, ProbeResult, ValidationKind, ValidationResult};
