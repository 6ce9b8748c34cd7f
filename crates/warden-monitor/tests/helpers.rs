//! Shared helpers for monitor integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use warden_alerts::{
    Alert, AlertRule, ChannelKind, MetricField, NotificationResult, Notifier, Predicate,
};
use warden_metrics::{HealthStatus, ProbeResult};
use warden_monitor::{ConsoleChannelConfig, MonitorConfig, StorageConfig};
use warden_probes::{FnProbe, Probe};

/// Upper bound for any wait in these tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A configuration persisting into `dir` with the console channel off.
pub fn test_config(dir: &TempDir) -> MonitorConfig {
    MonitorConfig {
        project: "atlas".to_string(),
        context: "it".to_string(),
        shutdown_timeout_secs: 2,
        storage: StorageConfig::in_dir(dir.path()),
        channels: warden_monitor::ChannelsConfig {
            console: ConsoleChannelConfig { enabled: false },
            ..Default::default()
        },
        ..MonitorConfig::default()
    }
}

/// Name of the only rule in [`firing_config`].
pub const FIRING_RULE: &str = "always_firing";

/// Like [`test_config`], with a single unthrottled console rule that fires
/// whenever a check has run.
pub fn firing_config(dir: &TempDir) -> MonitorConfig {
    let rule = AlertRule::builder(
        FIRING_RULE,
        Predicate::count_above(MetricField::TotalChecks, 0.0),
    )
    .channels(&[ChannelKind::Console])
    .build()
    .unwrap();
    MonitorConfig {
        rules: vec![rule],
        replace_default_rules: true,
        ..test_config(dir)
    }
}

/// A probe that reports `status` and counts its invocations.
pub fn counting_probe(
    service: &str,
    status: HealthStatus,
    error: Option<&str>,
) -> (Arc<dyn Probe>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let service = service.to_string();
    let error = error.map(str::to_string);
    let probe = FnProbe::new(service.clone(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        let mut result = ProbeResult::new(service.clone(), status, 25.0);
        if let Some(e) = &error {
            result = result.with_error(e.clone());
        }
        async move { result }
    });
    (Arc::new(probe), calls)
}

/// Polls `calls` until it reaches `at_least` or the test timeout expires.
pub async fn wait_for_calls(calls: &AtomicUsize, at_least: usize) -> bool {
    let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if calls.load(Ordering::SeqCst) >= at_least {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// A console-channel notifier that counts sends and optionally lingers in
/// each one before reporting success.
#[derive(Debug)]
pub struct SpyNotifier {
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl SpyNotifier {
    /// A notifier that succeeds immediately.
    pub fn new() -> (Arc<dyn Notifier>, Arc<AtomicUsize>) {
        Self::slow(Duration::ZERO)
    }

    /// A notifier that counts the send, then sleeps for `delay`.
    pub fn slow(delay: Duration) -> (Arc<dyn Notifier>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = Self {
            delay,
            calls: Arc::clone(&calls),
        };
        (Arc::new(notifier), calls)
    }
}

impl Notifier for SpyNotifier {
    fn name(&self) -> &str {
        "spy"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Console
    }

    fn send<'a>(
        &'a self,
        _alert: &'a Alert,
    ) -> Pin<Box<dyn Future<Output = warden_alerts::Result<NotificationResult>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(NotificationResult::success("console"))
        })
    }
}
