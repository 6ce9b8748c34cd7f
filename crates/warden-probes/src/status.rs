//! Table-driven mapping from HTTP status codes to health.
//!
//! Each [`ServiceKind`](crate::ServiceKind) has a default [`StatusTable`];
//! services can prepend their own [`StatusRule`]s in configuration without
//! any code change.

use serde::{Deserialize, Serialize};
use warden_metrics::HealthStatus;

/// One row of a status table.
///
/// A rule matches a code listed in `codes` or falling inside the inclusive
/// `range`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRule {
    /// Exact codes matched by this rule.
    #[serde(default)]
    pub codes: Vec<u16>,
    /// Inclusive code range matched by this rule.
    #[serde(default)]
    pub range: Option<(u16, u16)>,
    /// Status reported on a match.
    pub status: HealthStatus,
    /// Error text reported on a match.
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusRule {
    /// Creates a rule matching exact codes.
    #[must_use]
    pub fn codes(codes: &[u16], status: HealthStatus) -> Self {
        Self {
            codes: codes.to_vec(),
            range: None,
            status,
            error: None,
        }
    }

    /// Creates a rule matching an inclusive range.
    #[must_use]
    pub const fn range(from: u16, to: u16, status: HealthStatus) -> Self {
        Self {
            codes: Vec::new(),
            range: Some((from, to)),
            status,
            error: None,
        }
    }

    /// Sets the error text.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns true if `code` matches this rule.
    #[must_use]
    pub fn matches(&self, code: u16) -> bool {
        self.codes.contains(&code) || self.range.is_some_and(|(lo, hi)| (lo..=hi).contains(&code))
    }
}

/// The outcome of classifying one status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The derived health.
    pub status: HealthStatus,
    /// Error text, if the code was not healthy.
    pub error: Option<String>,
}

/// An ordered list of rules with a fallback.
///
/// The first matching rule wins; unmatched codes map to `fallback`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTable {
    rules: Vec<StatusRule>,
    fallback: HealthStatus,
}

impl StatusTable {
    /// Creates a table from rules and a fallback status.
    #[must_use]
    pub const fn new(rules: Vec<StatusRule>, fallback: HealthStatus) -> Self {
        Self { rules, fallback }
    }

    /// Table for authenticated REST APIs.
    ///
    /// 2xx is healthy, 401/403 is an auth failure, 429 is rate limiting,
    /// anything else is a warning.
    #[must_use]
    pub fn rest_api() -> Self {
        Self::new(
            vec![
                StatusRule::range(200, 299, HealthStatus::Healthy),
                StatusRule::codes(&[401, 403], HealthStatus::Critical).with_error("auth failure"),
                StatusRule::codes(&[429], HealthStatus::Warning).with_error("rate limited"),
            ],
            HealthStatus::Warning,
        )
    }

    /// Table for incoming webhooks probed with an empty payload.
    ///
    /// A 400 means the hook exists and rejected the payload, which is healthy.
    #[must_use]
    pub fn webhook() -> Self {
        Self::new(
            vec![
                StatusRule::range(200, 299, HealthStatus::Healthy),
                StatusRule::codes(&[400], HealthStatus::Healthy),
                StatusRule::codes(&[401, 403], HealthStatus::Critical).with_error("auth failure"),
                StatusRule::codes(&[404, 410], HealthStatus::Critical).with_error("webhook not found"),
            ],
            HealthStatus::Warning,
        )
    }

    /// Table for plain HTTP endpoints.
    #[must_use]
    pub fn http() -> Self {
        Self::new(
            vec![
                StatusRule::range(200, 399, HealthStatus::Healthy),
                StatusRule::range(500, 599, HealthStatus::Critical).with_error("server error"),
            ],
            HealthStatus::Warning,
        )
    }

    /// Returns a copy with `rules` checked before the existing ones.
    #[must_use]
    pub fn with_overrides(mut self, rules: &[StatusRule]) -> Self {
        let mut combined = rules.to_vec();
        combined.append(&mut self.rules);
        self.rules = combined;
        self
    }

    /// Classifies a status code.
    #[must_use]
    pub fn classify(&self, code: u16) -> Classification {
        if let Some(rule) = self.rules.iter().find(|r| r.matches(code)) {
            let error = match (&rule.error, rule.status) {
                (Some(e), _) => Some(e.clone()),
                (None, HealthStatus::Healthy) => None,
                (None, _) => Some(format!("unexpected status {code}")),
            };
            return Classification {
                status: rule.status,
                error,
            };
        }

        Classification {
            status: self.fallback,
            error: (self.fallback != HealthStatus::Healthy)
                .then(|| format!("unexpected status {code}")),
        }
    }

    /// Returns the rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[StatusRule] {
        &self.rules
    }
}
