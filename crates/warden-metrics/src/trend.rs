//! Windowed health trends.
//!
//! A [`Trend`] summarises the healthy ratio of all probes inside a wall-clock
//! window. The in-memory [`MetricsCollector`](crate::MetricsCollector) answers
//! windows up to its retained history; longer windows can be served by any
//! other [`ProbeHistory`] implementation through [`compute_trend`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};
use crate::types::ProbeResult;

/// The default trend window (24 hours).
pub const DEFAULT_TREND_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Qualitative label for a healthy ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    /// Ratio of at least 0.9.
    Excellent,
    /// Ratio of at least 0.7.
    Good,
    /// Ratio of at least 0.5.
    Fair,
    /// Ratio below 0.5.
    Poor,
    /// No probes fell inside the window.
    NoData,
}

impl TrendLabel {
    /// Maps a healthy ratio onto the label ladder.
    #[must_use]
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 0.9 {
            Self::Excellent
        } else if ratio >= 0.7 {
            Self::Good
        } else if ratio >= 0.5 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    /// Returns the label as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::NoData => "no_data",
        }
    }
}

impl std::fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Healthy ratio over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    /// Label derived from `healthy_ratio`.
    pub label: TrendLabel,
    /// Healthy probes divided by probes in the window.
    pub healthy_ratio: f64,
    /// Probes in the window.
    pub count: usize,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl Trend {
    /// Builds a trend from probes already filtered to the window.
    #[must_use]
    pub fn from_probes<'a>(
        probes: impl IntoIterator<Item = &'a ProbeResult>,
        window: Duration,
    ) -> Self {
        let (count, healthy) = probes.into_iter().fold((0usize, 0usize), |(n, h), p| {
            (n + 1, h + usize::from(p.status.is_healthy()))
        });

        if count == 0 {
            return Self {
                label: TrendLabel::NoData,
                healthy_ratio: 0.0,
                count: 0,
                window_secs: window.as_secs(),
            };
        }

        let healthy_ratio = healthy as f64 / count as f64;
        Self {
            label: TrendLabel::from_ratio(healthy_ratio),
            healthy_ratio,
            count,
            window_secs: window.as_secs(),
        }
    }
}

/// A source of historical probe results.
///
/// Implement this for persistent stores to answer windows longer than the
/// in-memory history retains.
pub trait ProbeHistory: Send + Sync {
    /// Returns all probe results with `timestamp >= since`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::Backend` if the history cannot be read.
    fn probes_since(&self, since: DateTime<Utc>) -> Result<Vec<ProbeResult>>;
}

/// Converts a window into the earliest timestamp it covers.
///
/// # Errors
///
/// Returns `MetricsError::InvalidWindow` for a zero window or one that
/// cannot be represented.
pub fn window_start(window: Duration, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if window.is_zero() {
        return Err(MetricsError::InvalidWindow {
            reason: "window must be positive".to_string(),
        });
    }
    let delta = chrono::Duration::from_std(window).map_err(|e| MetricsError::InvalidWindow {
        reason: e.to_string(),
    })?;
    now.checked_sub_signed(delta)
        .ok_or_else(|| MetricsError::InvalidWindow {
            reason: "window reaches before the representable epoch".to_string(),
        })
}

/// Computes a trend over `window` from any history backend.
///
/// # Errors
///
/// Returns an error if the window is invalid or the backend fails.
pub fn compute_trend(history: &dyn ProbeHistory, window: Duration) -> Result<Trend> {
    let since = window_start(window, Utc::now())?;
    let probes = history.probes_since(since)?;
    Ok(Trend::from_probes(&probes, window))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HealthStatus;
    use test_case::test_case;

    #[test_case(1.0, TrendLabel::Excellent ; "all healthy")]
    #[test_case(0.9, TrendLabel::Excellent ; "excellent boundary")]
    #[test_case(0.89, TrendLabel::Good ; "just below excellent")]
    #[test_case(0.7, TrendLabel::Good ; "good boundary")]
    #[test_case(0.5, TrendLabel::Fair ; "fair boundary")]
    #[test_case(0.49, TrendLabel::Poor ; "just below fair")]
    #[test_case(0.0, TrendLabel::Poor ; "nothing healthy")]
    fn label_ladder(ratio: f64, expected: TrendLabel) {
        assert_eq!(TrendLabel::from_ratio(ratio), expected);
    }

    #[test]
    fn empty_window_has_no_data() {
        let trend = Trend::from_probes(&[], DEFAULT_TREND_WINDOW);
        assert_eq!(trend.label, TrendLabel::NoData);
        assert_eq!(trend.count, 0);
        assert_eq!(trend.window_secs, 86_400);
    }

    #[test]
    fn ratio_counts_only_healthy() {
        let probes = vec![
            ProbeResult::new("a", HealthStatus::Healthy, 1.0),
            ProbeResult::new("a", HealthStatus::Healthy, 1.0),
            ProbeResult::new("a", HealthStatus::Warning, 1.0),
            ProbeResult::new("a", HealthStatus::Critical, 1.0),
        ];

        let trend = Trend::from_probes(&probes, DEFAULT_TREND_WINDOW);
        assert_eq!(trend.count, 4);
        assert!((trend.healthy_ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(trend.label, TrendLabel::Fair);
    }

    #[test]
    fn zero_window_is_rejected() {
        let result = window_start(Duration::ZERO, Utc::now());
        assert!(matches!(result, Err(MetricsError::InvalidWindow { .. })));
    }

    struct FixedHistory(Vec<ProbeResult>);

    impl ProbeHistory for FixedHistory {
        fn probes_since(&self, since: DateTime<Utc>) -> Result<Vec<ProbeResult>> {
            Ok(self
                .0
                .iter()
                .filter(|p| p.timestamp >= since)
                .cloned()
                .collect())
        }
    }

    #[test]
    fn compute_trend_filters_by_window() {
        let old = Utc::now() - chrono::Duration::days(3);
        let history = FixedHistory(vec![
            ProbeResult::new("a", HealthStatus::Critical, 1.0).at(old),
            ProbeResult::new("a", HealthStatus::Healthy, 1.0),
        ]);

        let day = compute_trend(&history, DEFAULT_TREND_WINDOW).unwrap();
        assert_eq!(day.count, 1);
        assert_eq!(day.label, TrendLabel::Excellent);

        let week = compute_trend(&history, Duration::from_secs(7 * 86_400)).unwrap();
        assert_eq!(week.count, 2);
        assert_eq!(week.label, TrendLabel::Fair);
    }
}
