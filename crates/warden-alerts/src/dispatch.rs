//! Concurrent fan-out of an alert to its target channels.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channels::Notifier;
use crate::types::{Alert, ChannelKind};

/// Default upper bound for a single channel send.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// What happened when an alert was fanned out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// The dispatched alert.
    pub alert_id: String,
    /// Channels a send was attempted on.
    pub attempted: Vec<ChannelKind>,
    /// Channels that accepted the alert.
    pub succeeded: Vec<ChannelKind>,
    /// Channels that failed, with the reason.
    pub failures: Vec<(ChannelKind, String)>,
    /// Targets with no configured or enabled notifier.
    pub missing: Vec<ChannelKind>,
    /// True when a strict majority of attempted channels succeeded.
    pub delivered: bool,
}

impl DispatchOutcome {
    /// Returns true if at least one channel accepted the alert.
    #[must_use]
    pub fn any_succeeded(&self) -> bool {
        !self.succeeded.is_empty()
    }
}

/// Routes alerts to registered notifiers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    notifiers: HashMap<ChannelKind, Arc<dyn Notifier>>,
    send_timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher with no channels.
    #[must_use]
    pub fn new() -> Self {
        Self {
            notifiers: HashMap::new(),
            send_timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    /// Sets the per-channel send timeout.
    #[must_use]
    pub const fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Registers a notifier for its channel, replacing any previous one.
    pub fn register(&mut self, notifier: Arc<dyn Notifier>) {
        let kind = notifier.kind();
        info!(channel = %kind, name = %notifier.name(), enabled = notifier.is_enabled(), "registered notifier");
        self.notifiers.insert(kind, notifier);
    }

    /// Returns true if an enabled notifier serves `kind`.
    #[must_use]
    pub fn has_channel(&self, kind: ChannelKind) -> bool {
        self.notifiers.get(&kind).is_some_and(|n| n.is_enabled())
    }

    /// Returns the channels with an enabled notifier, in canonical order.
    #[must_use]
    pub fn channels(&self) -> Vec<ChannelKind> {
        ChannelKind::ALL
            .into_iter()
            .filter(|k| self.has_channel(*k))
            .collect()
    }

    /// Sends `alert` to each of its target channels concurrently.
    ///
    /// Channel failures are recorded in the outcome and never propagated.
    pub async fn dispatch(&self, alert: &Alert) -> DispatchOutcome {
        let mut targets: Vec<ChannelKind> = alert.channels.clone();
        targets.sort();
        targets.dedup();

        let mut missing = Vec::new();
        let mut selected = Vec::new();
        for kind in targets {
            match self.notifiers.get(&kind) {
                Some(n) if n.is_enabled() => selected.push((kind, Arc::clone(n))),
                _ => {
                    warn!(alert = %alert.id, channel = %kind, "no enabled notifier for channel");
                    missing.push(kind);
                }
            }
        }

        let sends = selected.iter().map(|(kind, notifier)| async move {
            let result = tokio::time::timeout(self.send_timeout, notifier.send(alert)).await;
            let failure = match result {
                Ok(Ok(r)) if r.success => None,
                Ok(Ok(r)) => Some(r.message.unwrap_or_else(|| "rejected".to_string())),
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!("timed out after {:?}", self.send_timeout)),
            };
            (*kind, failure)
        });
        let results = join_all(sends).await;

        let attempted: Vec<ChannelKind> = selected.iter().map(|(k, _)| *k).collect();
        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        for (kind, failure) in results {
            match failure {
                None => succeeded.push(kind),
                Some(reason) => {
                    warn!(alert = %alert.id, channel = %kind, reason = %reason, "notification failed");
                    failures.push((kind, reason));
                }
            }
        }

        let delivered = !attempted.is_empty() && succeeded.len() * 2 > attempted.len();
        debug!(
            alert = %alert.id,
            attempted = attempted.len(),
            succeeded = succeeded.len(),
            delivered,
            "dispatched alert"
        );

        DispatchOutcome {
            alert_id: alert.id.clone(),
            attempted,
            succeeded,
            failures,
            missing,
            delivered,
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::channels::{NotificationResult, Notifier};
    use crate::error::{AlertError, Result};
    use crate::types::{Alert, ChannelKind};

    /// How a [`StubNotifier`] responds.
    #[derive(Debug, Clone, Copy)]
    pub enum Behavior {
        Accept,
        Reject,
        Fail,
        Hang,
    }

    #[derive(Debug)]
    pub struct StubNotifier {
        pub kind: ChannelKind,
        pub behavior: Behavior,
        pub calls: Arc<AtomicUsize>,
    }

    impl StubNotifier {
        pub fn new(kind: ChannelKind, behavior: Behavior) -> Self {
            Self {
                kind,
                behavior,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Notifier for StubNotifier {
        fn name(&self) -> &str {
            self.kind.as_str()
        }

        fn kind(&self) -> ChannelKind {
            self.kind
        }

        fn send<'a>(
            &'a self,
            _alert: &'a Alert,
        ) -> Pin<Box<dyn Future<Output = Result<NotificationResult>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                match self.behavior {
                    Behavior::Accept => Ok(NotificationResult::success(self.name())),
                    Behavior::Reject => Ok(NotificationResult::failure(self.name(), "rejected")),
                    Behavior::Fail => Err(AlertError::NotificationFailed {
                        channel: self.name().to_string(),
                        reason: "connection refused".to_string(),
                    }),
                    Behavior::Hang => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(NotificationResult::success(self.name()))
                    }
                }
            })
        }
    }
}
