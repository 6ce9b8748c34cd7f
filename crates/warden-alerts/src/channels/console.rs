//! Console channel: writes a plain-text block to stdout.

use std::fmt::Write as _;
use std::future::Future;
use std::io::Write as _;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use super::{metadata_rows, NotificationResult, Notifier};
use crate::error::Result;
use crate::types::{Alert, ChannelKind};

/// Shared buffer receiving rendered blocks instead of stdout.
#[derive(Debug, Clone, Default)]
pub struct ConsoleCapture(Arc<Mutex<Vec<String>>>);

impl ConsoleCapture {
    /// Returns every captured block.
    #[must_use]
    pub fn blocks(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Returns the number of captured blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Returns true if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, block: String) {
        self.0.lock().push(block);
    }
}

/// Prints alerts to the terminal.
#[derive(Debug, Clone)]
pub struct ConsoleNotifier {
    name: String,
    enabled: bool,
    capture: Option<ConsoleCapture>,
}

impl ConsoleNotifier {
    /// Creates a console notifier writing to stdout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "console".to_string(),
            enabled: true,
            capture: None,
        }
    }

    /// Creates a console notifier that records blocks in memory.
    #[must_use]
    pub fn capturing() -> (Self, ConsoleCapture) {
        let capture = ConsoleCapture::default();
        let notifier = Self {
            capture: Some(capture.clone()),
            ..Self::new()
        };
        (notifier, capture)
    }

    /// Sets whether the channel is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Renders the text block for an alert.
    #[must_use]
    pub fn render_block(alert: &Alert) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(
            out,
            "[{}] {}",
            alert.severity.as_str().to_uppercase(),
            alert.title
        );
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "rule:      {}", alert.rule_name);
        let _ = writeln!(out, "alert id:  {}", alert.id);
        let _ = writeln!(out, "time:      {}", alert.timestamp.to_rfc3339());
        if alert.escalated {
            let _ = writeln!(out, "escalated: yes");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", alert.message);

        let rows = metadata_rows(&alert.metadata);
        if !rows.is_empty() {
            let _ = writeln!(out);
            for (key, value) in rows {
                let _ = writeln!(out, "  {key:<24} {value}");
            }
        }
        let _ = write!(out, "{rule}");
        out
    }
}

fn write_stdout(block: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{block}")?;
    stdout.flush()
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Console
    }

    fn send<'a>(
        &'a self,
        alert: &'a Alert,
    ) -> Pin<Box<dyn Future<Output = Result<NotificationResult>> + Send + 'a>> {
        Box::pin(async move {
            if !self.is_enabled() {
                return Ok(NotificationResult::success(self.name()).with_message("channel disabled"));
            }

            let block = Self::render_block(alert);
            if let Some(capture) = &self.capture {
                capture.push(block);
                return Ok(NotificationResult::success(self.name()).with_message("captured"));
            }

            match write_stdout(&block) {
                Ok(()) => {
                    debug!(alert = %alert.id, "printed alert to console");
                    Ok(NotificationResult::success(self.name()).with_message("printed to stdout"))
                }
                Err(e) => {
                    error!(alert = %alert.id, error = %e, "failed to write alert to console");
                    Ok(NotificationResult::failure(self.name(), e.to_string()))
                }
            }
        })
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::test_support::sample_alert;

    #[test]
    fn block_contains_alert_fields() {
        let alert = sample_alert();
        let block = ConsoleNotifier::render_block(&alert);

        assert!(block.contains("[CRITICAL] Critical system health"));
        assert!(block.contains("rule:      health_score_critical"));
        assert!(block.contains(&alert.id));
        assert!(block.contains("overall_health_score"));
        assert!(block.contains("40.00"));
        assert!(!block.contains("escalated"));
    }

    #[test]
    fn escalated_block_is_marked() {
        let escalated = sample_alert().escalation(chrono::Utc::now());
        let block = ConsoleNotifier::render_block(&escalated);
        assert!(block.contains("escalated: yes"));
        assert!(block.contains("[ESCALATED]"));
    }

    #[tokio::test]
    async fn capturing_records_blocks() {
        let (notifier, capture) = ConsoleNotifier::capturing();
        assert!(capture.is_empty());

        let result = notifier.send(&sample_alert()).await.unwrap();
        assert!(result.success);
        assert_eq!(capture.len(), 1);
        assert!(capture.blocks()[0].contains("health_score_critical"));
    }

    #[tokio::test]
    async fn stdout_send_succeeds() {
        let notifier = ConsoleNotifier::new();
        let result = notifier.send(&sample_alert()).await.unwrap();

        assert!(result.success);
        assert_eq!(notifier.kind(), ChannelKind::Console);
    }

    #[tokio::test]
    async fn disabled_console_skips_capture() {
        let (notifier, capture) = ConsoleNotifier::capturing();
        let notifier = notifier.enabled(false);

        notifier.send(&sample_alert()).await.unwrap();
        assert!(capture.is_empty());
    }
}
