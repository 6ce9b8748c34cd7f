//! Monitor configuration.
//!
//! Configuration is read once from a TOML file:
//! - Identity (`project`, `context`) stamped on persisted documents
//! - Loop timing and shutdown bounds
//! - Storage paths and history caps
//! - Services to probe and credentials to validate
//! - Notification channels and custom alert rules

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use warden_alerts::{
    AlertEngine, AlertManagerConfig, AlertRule, ChatWebhookConfig, ChatWebhookNotifier,
    ConsoleNotifier, Dispatcher, EmailConfig, EmailNotifier, Notifier, WebhookConfig,
    WebhookNotifier,
};
use warden_metrics::CollectorConfig;
use warden_probes::{resolve_secret, CredentialSpec, ServiceConfig};

use crate::error::{MonitorError, Result};

/// Default probe loop interval in seconds.
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 300;

/// Where persisted documents live and how many are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Latest snapshot document.
    pub snapshot_path: PathBuf,
    /// Capped array of past snapshot documents.
    pub history_path: PathBuf,
    /// Capped array of delivered alerts with channel counters.
    pub alert_log_path: PathBuf,
    /// Maximum documents kept in the history file.
    pub history_limit: usize,
    /// Maximum alerts kept in the alert log.
    pub alert_log_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("warden-data/snapshot.json"),
            history_path: PathBuf::from("warden-data/history.json"),
            alert_log_path: PathBuf::from("warden-data/alerts.json"),
            history_limit: 1000,
            alert_log_limit: 10_000,
        }
    }
}

impl StorageConfig {
    /// Places all three files under `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            snapshot_path: dir.join("snapshot.json"),
            history_path: dir.join("history.json"),
            alert_log_path: dir.join("alerts.json"),
            ..Self::default()
        }
    }
}

/// In-memory capacity limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Probe and validation results retained by the collector.
    pub metrics_history: usize,
    /// Alerts retained by the alert manager.
    pub alert_history: usize,
    /// Dedup keys retained.
    pub dedup_capacity: usize,
    /// Restricts snapshots to results newer than this many seconds.
    pub snapshot_window_secs: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            metrics_history: 1000,
            alert_history: 10_000,
            dedup_capacity: 1000,
            snapshot_window_secs: None,
        }
    }
}

/// Console channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleChannelConfig {
    /// Whether alerts are printed.
    pub enabled: bool,
}

impl Default for ConsoleChannelConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Notification channel settings. Absent sections are not configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Chat webhook.
    pub chat: Option<ChatWebhookConfig>,
    /// SMTP email.
    pub email: Option<EmailConfig>,
    /// Generic JSON webhook.
    pub webhook: Option<WebhookConfig>,
    /// Console output.
    pub console: ConsoleChannelConfig,
}

impl ChannelsConfig {
    /// Builds a dispatcher from the configured channels.
    ///
    /// Channels whose settings cannot be resolved are skipped with a
    /// warning; the returned list names each skipped channel and why.
    #[must_use]
    pub fn build_dispatcher(&self, send_timeout: Duration) -> (Dispatcher, Vec<String>) {
        let mut dispatcher = Dispatcher::new().with_send_timeout(send_timeout);
        let mut skipped = Vec::new();

        let mut add = |name: &str, built: std::result::Result<Arc<dyn Notifier>, String>| match built {
            Ok(notifier) => dispatcher.register(notifier),
            Err(reason) => {
                warn!(channel = name, reason = %reason, "skipping notification channel");
                skipped.push(format!("{name}: {reason}"));
            }
        };

        if let Some(chat) = &self.chat {
            add("chat", build_chat(chat));
        }
        if let Some(email) = &self.email {
            add("email", build_email(email));
        }
        if let Some(webhook) = &self.webhook {
            add("webhook", build_webhook(webhook));
        }
        if self.console.enabled {
            add("console", Ok(Arc::new(ConsoleNotifier::new())));
        }

        (dispatcher, skipped)
    }
}

fn resolve(raw: &str) -> std::result::Result<String, String> {
    resolve_secret(raw).map_err(|e| e.to_string())
}

fn build_chat(config: &ChatWebhookConfig) -> std::result::Result<Arc<dyn Notifier>, String> {
    let mut config = config.clone();
    config.url = resolve(&config.url)?;
    let notifier = ChatWebhookNotifier::new(config).map_err(|e| e.to_string())?;
    Ok(Arc::new(notifier))
}

fn build_email(config: &EmailConfig) -> std::result::Result<Arc<dyn Notifier>, String> {
    let mut config = config.clone();
    config.smtp_host = resolve(&config.smtp_host)?;
    config.username = config.username.as_deref().map(resolve).transpose()?;
    config.password = config.password.as_deref().map(resolve).transpose()?;
    let notifier = EmailNotifier::new(config).map_err(|e| e.to_string())?;
    Ok(Arc::new(notifier))
}

fn build_webhook(config: &WebhookConfig) -> std::result::Result<Arc<dyn Notifier>, String> {
    let mut config = config.clone();
    config.url = resolve(&config.url)?;
    for value in config.headers.values_mut() {
        *value = resolve(value)?;
    }
    let notifier = WebhookNotifier::new(config).map_err(|e| e.to_string())?;
    Ok(Arc::new(notifier))
}

/// Top-level monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Project name stamped on persisted documents.
    pub project: String,
    /// Deployment context stamped on persisted documents.
    pub context: String,
    /// Seconds between probe cycles.
    pub probe_interval_secs: u64,
    /// Default per-probe timeout in seconds.
    pub probe_timeout_secs: u64,
    /// Upper bound for a single channel send in seconds.
    pub notify_timeout_secs: u64,
    /// Upper bound for stopping the background loops in seconds.
    pub shutdown_timeout_secs: u64,
    /// Persistence settings.
    pub storage: StorageConfig,
    /// In-memory capacity limits.
    pub limits: LimitsConfig,
    /// Services to probe.
    pub services: Vec<ServiceConfig>,
    /// Credentials to validate.
    pub credentials: Vec<CredentialSpec>,
    /// Notification channels.
    pub channels: ChannelsConfig,
    /// Custom alert rules.
    pub rules: Vec<AlertRule>,
    /// Use only `rules`, dropping the built-in defaults.
    pub replace_default_rules: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            project: "warden".to_string(),
            context: "default".to_string(),
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            probe_timeout_secs: 10,
            notify_timeout_secs: 30,
            shutdown_timeout_secs: 15,
            storage: StorageConfig::default(),
            limits: LimitsConfig::default(),
            services: Vec::new(),
            credentials: Vec::new(),
            channels: ChannelsConfig::default(),
            rules: Vec::new(),
            replace_default_rules: false,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| MonitorError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Missing endpoints and channel settings are not errors; they are
    /// skipped when the monitor is built.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Config` for zero intervals or limits, duplicate
    /// names, and malformed rules or services.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("probe_interval_secs", self.probe_interval_secs),
            ("probe_timeout_secs", self.probe_timeout_secs),
            ("notify_timeout_secs", self.notify_timeout_secs),
            ("shutdown_timeout_secs", self.shutdown_timeout_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(MonitorError::Config(format!("{name} must be greater than 0")));
            }
        }

        let limits = [
            ("storage.history_limit", self.storage.history_limit),
            ("storage.alert_log_limit", self.storage.alert_log_limit),
            ("limits.metrics_history", self.limits.metrics_history),
            ("limits.alert_history", self.limits.alert_history),
            ("limits.dedup_capacity", self.limits.dedup_capacity),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(MonitorError::Config(format!("{name} must be greater than 0")));
            }
        }
        if self.limits.snapshot_window_secs == Some(0) {
            return Err(MonitorError::Config(
                "limits.snapshot_window_secs must be greater than 0".to_string(),
            ));
        }

        let mut services = HashSet::new();
        for service in &self.services {
            service
                .validate()
                .map_err(|e| MonitorError::Config(e.to_string()))?;
            if !services.insert(service.name.as_str()) {
                return Err(MonitorError::Config(format!(
                    "duplicate service name '{}'",
                    service.name
                )));
            }
        }

        let mut rules = HashSet::new();
        for rule in &self.rules {
            rule.validate()
                .map_err(|e| MonitorError::Config(e.to_string()))?;
            if !rules.insert(rule.name.as_str()) {
                return Err(MonitorError::Config(format!(
                    "duplicate rule name '{}'",
                    rule.name
                )));
            }
        }

        Ok(())
    }

    /// Returns the probe loop interval.
    #[must_use]
    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    /// Returns the default probe timeout.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Returns the shutdown bound.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Returns the collector configuration implied by `limits`.
    #[must_use]
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            max_probe_history: self.limits.metrics_history,
            max_validation_history: self.limits.metrics_history,
            snapshot_window: self.limits.snapshot_window_secs.map(Duration::from_secs),
        }
    }

    /// Returns the alert manager configuration implied by `limits`.
    #[must_use]
    pub const fn alert_manager_config(&self) -> AlertManagerConfig {
        AlertManagerConfig {
            history_capacity: self.limits.alert_history,
            dedup_capacity: self.limits.dedup_capacity,
        }
    }

    /// Builds the rule engine: defaults unless replaced, then custom rules.
    ///
    /// A custom rule named like a default rule replaces it.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Alert` if a custom rule is invalid.
    pub fn build_engine(&self) -> Result<AlertEngine> {
        let engine = if self.replace_default_rules {
            AlertEngine::new()
        } else {
            AlertEngine::with_default_rules()
        };
        for rule in &self.rules {
            engine.replace_rule(rule.clone())?;
        }
        Ok(engine)
    }

    /// Builds the dispatcher from `channels`.
    #[must_use]
    pub fn build_dispatcher(&self) -> (Dispatcher, Vec<String>) {
        self.channels
            .build_dispatcher(Duration::from_secs(self.notify_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use warden_alerts::{AlertSeverity, ChannelKind};
    use warden_probes::{CredentialFormat, ServiceKind};

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("failed to write temp file");
        file
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn empty_config_uses_defaults() {
            let config = MonitorConfig::from_toml("").unwrap();

            assert_eq!(config.project, "warden");
            assert_eq!(config.probe_interval_secs, 300);
            assert_eq!(config.probe_timeout_secs, 10);
            assert_eq!(config.storage.history_limit, 1000);
            assert_eq!(config.limits.alert_history, 10_000);
            assert!(config.channels.console.enabled);
            assert!(config.channels.chat.is_none());
            assert!(!config.replace_default_rules);
        }

        #[test]
        fn full_config() {
            let toml = r##"
                project = "atlas"
                context = "production"
                probe_interval_secs = 120

                [storage]
                snapshot_path = "/var/lib/warden/snapshot.json"
                history_limit = 50

                [limits]
                dedup_capacity = 200
                snapshot_window_secs = 3600

                [[services]]
                name = "openai"
                kind = "rest_api"
                endpoint = "https://api.openai.com/v1/models"
                credential = "env:OPENAI_API_KEY"
                timeout_secs = 5

                [[services]]
                name = "slack"
                kind = "webhook"
                endpoint = "env:SLACK_WEBHOOK_URL"

                [[credentials]]
                name = "anthropic"
                format = "anthropic"
                value = "env:ANTHROPIC_API_KEY"
                check_strength = true

                [channels.chat]
                url = "env:SLACK_WEBHOOK_URL"
                channel = "#ops"

                [channels.webhook]
                url = "https://hooks.example.com/warden"

                [channels.console]
                enabled = false

                [[rules]]
                name = "slow_responses"
                severity = "critical"
                channels = ["console"]
                throttle_secs = 600
                predicate = { type = "count_above", field = "avg_latency_ms", n = 2000.0 }
            "##;

            let config = MonitorConfig::from_toml(toml).unwrap();

            assert_eq!(config.context, "production");
            assert_eq!(config.probe_interval(), Duration::from_secs(120));
            assert_eq!(config.storage.history_limit, 50);
            assert_eq!(
                config.storage.alert_log_path,
                PathBuf::from("warden-data/alerts.json")
            );
            assert_eq!(config.limits.snapshot_window_secs, Some(3600));
            assert_eq!(config.services.len(), 2);
            assert_eq!(config.services[0].kind, ServiceKind::RestApi);
            assert_eq!(config.services[0].timeout_secs, Some(5));
            assert_eq!(config.credentials[0].format, CredentialFormat::Anthropic);
            assert_eq!(config.channels.chat.as_ref().unwrap().channel.as_deref(), Some("#ops"));
            assert!(!config.channels.console.enabled);
            assert_eq!(config.rules[0].severity, AlertSeverity::Critical);
            assert_eq!(config.rules[0].channels, vec![ChannelKind::Console]);
        }

        #[test]
        fn invalid_toml_rejected() {
            let err = MonitorConfig::from_toml("probe_interval_secs = [").unwrap_err();
            assert!(err.to_string().contains("invalid TOML"));
        }

        #[test]
        fn load_from_file() {
            let file = create_temp_config("project = \"from-file\"\n");
            let config = MonitorConfig::load(file.path()).unwrap();
            assert_eq!(config.project, "from-file");
        }

        #[test]
        fn load_missing_file() {
            let err = MonitorConfig::load("/nonexistent/warden.toml").unwrap_err();
            assert!(err.to_string().contains("failed to read config file"));
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn zero_interval_rejected() {
            let err = MonitorConfig::from_toml("probe_interval_secs = 0").unwrap_err();
            assert!(err.to_string().contains("probe_interval_secs"));
        }

        #[test]
        fn zero_limit_rejected() {
            let err = MonitorConfig::from_toml("[limits]\ndedup_capacity = 0").unwrap_err();
            assert!(err.to_string().contains("limits.dedup_capacity"));
        }

        #[test]
        fn duplicate_service_rejected() {
            let mut config = MonitorConfig::default();
            config.services = vec![
                ServiceConfig::new("api", ServiceKind::Http, "http://a"),
                ServiceConfig::new("api", ServiceKind::Http, "http://b"),
            ];
            assert!(config.validate().is_err());
        }

        #[test]
        fn service_without_endpoint_is_not_an_error() {
            let toml = r#"
                [[services]]
                name = "github"
                kind = "rest_api"
            "#;
            assert!(MonitorConfig::from_toml(toml).is_ok());
        }

        #[test]
        fn rule_without_channels_rejected() {
            let toml = r#"
                [[rules]]
                name = "broken"
                channels = []
                predicate = { type = "field_is_false", field = "monitoring_active" }
            "#;
            assert!(MonitorConfig::from_toml(toml).is_err());
        }
    }

    mod build_tests {
        use super::*;

        #[test]
        fn engine_appends_custom_rules_to_defaults() {
            let toml = r#"
                [[rules]]
                name = "custom"
                channels = ["console"]
                predicate = { type = "field_is_false", field = "monitoring_active" }
            "#;
            let engine = MonitorConfig::from_toml(toml).unwrap().build_engine().unwrap();

            assert_eq!(engine.rule_count(), 7);
            assert!(engine.get_rule("custom").is_some());
            assert!(engine.get_rule("health_score_critical").is_some());
        }

        #[test]
        fn engine_replaces_defaults_when_asked() {
            let toml = r#"
                replace_default_rules = true

                [[rules]]
                name = "only"
                channels = ["console"]
                predicate = { type = "field_is_false", field = "monitoring_active" }
            "#;
            let engine = MonitorConfig::from_toml(toml).unwrap().build_engine().unwrap();
            assert_eq!(engine.rule_count(), 1);
        }

        #[test]
        fn unresolvable_channel_is_skipped() {
            let toml = r#"
                [channels.chat]
                url = "env:WARDEN_TEST_CHAT_URL_THAT_IS_NEVER_SET"

                [channels.webhook]
                url = "https://hooks.example.com/warden"
            "#;
            let (dispatcher, skipped) = MonitorConfig::from_toml(toml).unwrap().build_dispatcher();

            assert_eq!(skipped.len(), 1);
            assert!(skipped[0].starts_with("chat:"));
            assert_eq!(
                dispatcher.channels(),
                vec![ChannelKind::Webhook, ChannelKind::Console]
            );
        }

        #[test]
        fn collector_config_from_limits() {
            let mut config = MonitorConfig::default();
            config.limits.metrics_history = 50;
            config.limits.snapshot_window_secs = Some(60);

            let collector = config.collector_config();
            assert_eq!(collector.max_probe_history, 50);
            assert_eq!(collector.snapshot_window, Some(Duration::from_secs(60)));
        }
    }
}
