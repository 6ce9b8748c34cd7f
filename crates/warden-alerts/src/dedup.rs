//! Alert deduplication and throttling.
//!
//! Two independent checks must both pass before an alert is sent:
//!
//! 1. its dedup key has not been sent within the throttle interval, and
//! 2. no recently sent alert matches its rule name, title and severity
//!    within the same interval.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::types::{Alert, AlertSeverity};

/// Default number of dedup keys retained.
pub const DEFAULT_DEDUP_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
struct SentRecord {
    rule_name: String,
    title: String,
    severity: AlertSeverity,
    sent_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct DedupState {
    last_sent: HashMap<String, DateTime<Utc>>,
    key_order: VecDeque<String>,
    recent: VecDeque<SentRecord>,
}

/// Decides whether an alert should be dispatched.
///
/// Time is taken from each alert's own timestamp, so decisions are
/// reproducible for a given sequence of alerts.
#[derive(Debug)]
pub struct Deduplicator {
    capacity: usize,
    state: Mutex<DedupState>,
}

impl Deduplicator {
    /// Creates a deduplicator retaining up to `capacity` keys.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(DedupState::default()),
        }
    }

    /// Returns true and records the alert if it should be sent.
    pub fn should_send(&self, alert: &Alert, throttle: Duration) -> bool {
        let window = chrono::Duration::from_std(throttle).unwrap_or(chrono::Duration::MAX);
        let now = alert.timestamp;
        let key = alert.dedup_key();

        let mut state = self.state.lock();

        if let Some(last) = state.last_sent.get(&key) {
            if now.signed_duration_since(*last) < window {
                debug!(rule = %alert.rule_name, key = %key, "suppressed by dedup key");
                return false;
            }
        }

        let recent_match = state.recent.iter().any(|r| {
            r.rule_name == alert.rule_name
                && r.title == alert.title
                && r.severity == alert.severity
                && now.signed_duration_since(r.sent_at) < window
        });
        if recent_match {
            debug!(rule = %alert.rule_name, "suppressed by recent history");
            return false;
        }

        self.record_locked(&mut state, alert, key);
        true
    }

    /// Records an alert as sent without checking the throttle.
    pub fn record(&self, alert: &Alert) {
        let key = alert.dedup_key();
        let mut state = self.state.lock();
        self.record_locked(&mut state, alert, key);
    }

    /// Returns the number of retained dedup keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().last_sent.len()
    }

    /// Returns true if no keys are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets everything.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.last_sent.clear();
        state.key_order.clear();
        state.recent.clear();
    }

    fn record_locked(&self, state: &mut DedupState, alert: &Alert, key: String) {
        if state.last_sent.insert(key.clone(), alert.timestamp).is_none() {
            state.key_order.push_back(key);
        }
        while state.key_order.len() > self.capacity {
            if let Some(oldest) = state.key_order.pop_front() {
                state.last_sent.remove(&oldest);
            }
        }

        state.recent.push_back(SentRecord {
            rule_name: alert.rule_name.clone(),
            title: alert.title.clone(),
            severity: alert.severity,
            sent_at: alert.timestamp,
        });
        while state.recent.len() > self.capacity {
            state.recent.pop_front();
        }
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}
