//! One full cycle from a failing probe to a recorded alert.

mod helpers;

use std::sync::Arc;

use helpers::{counting_probe, test_config};
use tempfile::TempDir;
use warden_alerts::{AlertSeverity, ConsoleNotifier};
use warden_metrics::{HealthStatus, ProbeResult};
use warden_monitor::Monitor;
use warden_probes::TIMEOUT_ERROR;

const CRITICAL_RULES: [&str; 2] = ["api_connectivity_critical", "health_score_critical"];

#[tokio::test]
async fn timeout_probe_raises_critical_alert() {
    let dir = TempDir::new().unwrap();
    let (probe, _) = counting_probe("billing", HealthStatus::Critical, Some(TIMEOUT_ERROR));
    let (console, capture) = ConsoleNotifier::capturing();
    let monitor = Monitor::builder(test_config(&dir))
        .probes(vec![probe])
        .notifier(Arc::new(console))
        .build()
        .await
        .unwrap();
    monitor.set_monitoring_active(true);

    let report = monitor.run_cycle().await;

    assert_eq!(report.snapshot.critical_count, 1);
    assert!(report.snapshot.overall_health_score.abs() < f64::EPSILON);
    assert!(report.errors.iter().any(|e| e.contains(TIMEOUT_ERROR)));
    assert!(report.alerts.delivered >= 1);

    let alerts = monitor.manager().alerts();
    let critical = alerts
        .iter()
        .find(|a| CRITICAL_RULES.contains(&a.rule_name.as_str()))
        .expect("critical alert recorded");
    assert_eq!(critical.severity, AlertSeverity::Critical);
    assert!(!critical.resolved);

    let mut rules: Vec<&str> = alerts.iter().map(|a| a.rule_name.as_str()).collect();
    let total = rules.len();
    rules.sort_unstable();
    rules.dedup();
    assert_eq!(rules.len(), total, "one alert per rule");

    assert!(!capture.is_empty());
    assert!(capture.blocks().iter().any(|b| b.contains("[CRITICAL]")));
}

#[tokio::test]
async fn second_cycle_is_throttled() {
    let dir = TempDir::new().unwrap();
    let (probe, _) = counting_probe("billing", HealthStatus::Critical, Some(TIMEOUT_ERROR));
    let (console, capture) = ConsoleNotifier::capturing();
    let monitor = Monitor::builder(test_config(&dir))
        .probes(vec![probe])
        .notifier(Arc::new(console))
        .build()
        .await
        .unwrap();
    monitor.set_monitoring_active(true);

    let first = monitor.run_cycle().await;
    let sent = capture.len();
    let second = monitor.run_cycle().await;

    assert_eq!(second.alerts.raised, first.alerts.raised);
    assert_eq!(second.alerts.suppressed, second.alerts.raised);
    assert_eq!(capture.len(), sent);
}

#[tokio::test]
async fn alert_log_survives_restart() {
    let dir = TempDir::new().unwrap();
    let (probe, _) = counting_probe("billing", HealthStatus::Critical, Some(TIMEOUT_ERROR));
    let (console, _) = ConsoleNotifier::capturing();
    let monitor = Monitor::builder(test_config(&dir))
        .probes(vec![probe])
        .notifier(Arc::new(console))
        .build()
        .await
        .unwrap();
    monitor.set_monitoring_active(true);
    monitor.run_cycle().await;
    let recorded = monitor.manager().alerts().len();
    assert!(recorded > 0);

    let (probe, _) = counting_probe("billing", HealthStatus::Critical, Some(TIMEOUT_ERROR));
    let (console, capture) = ConsoleNotifier::capturing();
    let restarted = Monitor::builder(test_config(&dir))
        .probes(vec![probe])
        .notifier(Arc::new(console))
        .build()
        .await
        .unwrap();
    restarted.set_monitoring_active(true);

    assert_eq!(restarted.manager().alerts().len(), recorded);
    let report = restarted.run_cycle().await;
    assert_eq!(report.alerts.suppressed, report.alerts.raised);
    assert!(capture.is_empty());

    let stats = restarted.manager().statistics();
    assert_eq!(stats.total, recorded);
    assert!(stats.channel_stats["console"].sent >= 1);
}

#[tokio::test]
async fn recovery_resolves_alerts() {
    let dir = TempDir::new().unwrap();
    let (failing, _) = counting_probe("billing", HealthStatus::Critical, Some(TIMEOUT_ERROR));
    let (console, _) = ConsoleNotifier::capturing();
    let monitor = Monitor::builder(test_config(&dir))
        .probes(vec![failing])
        .notifier(Arc::new(console))
        .build()
        .await
        .unwrap();
    monitor.set_monitoring_active(true);
    monitor.run_cycle().await;
    assert!(!monitor.manager().active_alerts().is_empty());

    for _ in 0..20 {
        monitor
            .collector()
            .ingest_probe(ProbeResult::new("billing", HealthStatus::Healthy, 20.0));
    }

    let snapshot = monitor.collector().snapshot();
    monitor.manager().process(&snapshot).await;
    assert!(monitor.manager().active_alerts().is_empty());
    assert!(monitor.manager().alerts().iter().all(|a| a.resolved_at.is_some()));
}
