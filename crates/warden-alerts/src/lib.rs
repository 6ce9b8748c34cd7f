//! Rule-based alerting for Warden.
//!
//! `warden-alerts` evaluates declarative rules against a
//! [`MetricsSnapshot`](warden_metrics::MetricsSnapshot), throttles
//! duplicates, and fans alerts out to chat, email, webhook and console
//! channels concurrently.
//!
//! # Features
//!
//! - **Declarative predicates**: thresholds, flags and boolean combinators as data
//! - **Default rule set**: health, connectivity, latency, secret and liveness rules
//! - **Deduplication**: per-rule throttle windows keyed by rule, title and severity
//! - **Concurrent delivery**: one failing channel never blocks the others
//! - **Escalation**: unresolved alerts are re-sent one severity level higher
//! - **History**: bounded alert log with per-channel delivery statistics
//!
//! # Example
//!
//! ```rust
//! use warden_alerts::{AlertEngine, AlertSeverity};
//! use warden_metrics::MetricsSnapshot;
//!
//! let engine = AlertEngine::with_default_rules();
//!
//! let snapshot = MetricsSnapshot {
//!     total_checks: 4,
//!     overall_health_score: 40.0,
//!     api_connectivity_score: 75.0,
//!     monitoring_active: true,
//!     ..MetricsSnapshot::default()
//! };
//!
//! let alerts = engine.evaluate(&snapshot);
//! assert!(alerts
//!     .iter()
//!     .any(|a| a.rule_name == "health_score_critical" && a.severity == AlertSeverity::Critical));
//! ```

#![forbid(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/warden-alerts/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod channels;
pub mod dedup;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod history;
pub mod manager;
pub mod predicate;
pub mod rule;
pub mod types;

// Re-export main types at crate root
pub use channels::{
    ChatWebhookConfig, ChatWebhookNotifier, ConsoleCapture, ConsoleNotifier, EmailConfig,
    EmailNotifier, NotificationResult, Notifier, WebhookConfig, WebhookNotifier, WebhookPayload,
    DEFAULT_NOTIFY_TIMEOUT_SECS,
};
pub use dedup::{Deduplicator, DEFAULT_DEDUP_CAPACITY};
pub use dispatch::{DispatchOutcome, Dispatcher, DEFAULT_DISPATCH_TIMEOUT};
pub use engine::AlertEngine;
pub use error::{AlertError, Result};
pub use history::{AlertHistory, AlertStatistics, ChannelStats, DEFAULT_HISTORY_CAPACITY};
pub use manager::{AlertManager, AlertManagerConfig, ProcessReport};
pub use predicate::{FlagField, MetricField, Predicate, MAX_PREDICATE_DEPTH};
pub use rule::{default_rules, AlertRule, AlertRuleBuilder};
pub use types::{Alert, AlertSeverity, ChannelKind, ESCALATION_PREFIX};
