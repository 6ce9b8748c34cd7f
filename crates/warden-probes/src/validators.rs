//! Pure credential validators.
//!
//! Validators never touch the network and never log secret values. Every
//! failure carries a human-readable reason.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use warden_metrics::{ValidationKind, ValidationResult};

use crate::config::resolve_secret;

/// Default minimum length for the strength check.
pub const DEFAULT_MIN_LENGTH: usize = 20;

/// Values that are obviously unfilled templates.
const PLACEHOLDERS: &[&str] = &[
    "changeme",
    "change-me",
    "your-api-key",
    "your_api_key",
    "placeholder",
    "xxxxxxxx",
    "todo",
    "secret",
    "password",
];

static OPENAI_KEY_REGEX: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^sk-(?:proj-|svcacct-)?[A-Za-z0-9_-]{20,}$").ok());

static ANTHROPIC_KEY_REGEX: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^sk-ant-[A-Za-z0-9_-]{20,}$").ok());

static GITHUB_TOKEN_REGEX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^(?:gh[pousr]_[A-Za-z0-9]{36,}|github_pat_[A-Za-z0-9_]{22,})$").ok()
});

static SLACK_WEBHOOK_REGEX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^https://hooks\.slack\.com/services/[A-Z0-9]+/[A-Z0-9]+/[A-Za-z0-9]+$").ok()
});

static URL_REGEX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^https?://[A-Za-z0-9]([A-Za-z0-9.-]*[A-Za-z0-9])?(:[0-9]{1,5})?(/[^\s]*)?$").ok()
});

fn is_match(regex: Option<&Regex>, value: &str) -> Result<bool, String> {
    regex
        .map(|r| r.is_match(value))
        .ok_or_else(|| "validator unavailable".to_string())
}

/// The expected shape of a credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialFormat {
    /// `sk-` prefixed OpenAI key.
    OpenAi,
    /// `sk-ant-` prefixed Anthropic key.
    Anthropic,
    /// GitHub personal access or app token.
    GitHub,
    /// Slack incoming webhook URL.
    SlackWebhook,
    /// Any http(s) URL.
    Url,
    /// Hyphenated UUID.
    Uuid,
    /// Only checked for emptiness and whitespace.
    #[default]
    Opaque,
}

impl CredentialFormat {
    /// Returns the format as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::GitHub => "github",
            Self::SlackWebhook => "slack_webhook",
            Self::Url => "url",
            Self::Uuid => "uuid",
            Self::Opaque => "opaque",
        }
    }
}

impl std::fmt::Display for CredentialFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Checks the shape of `value`.
///
/// # Errors
///
/// Returns a human-readable reason when the value does not match `format`.
pub fn check_format(value: &str, format: CredentialFormat) -> Result<(), String> {
    if value.is_empty() {
        return Err("value is empty".to_string());
    }
    if value.trim() != value {
        return Err("value has leading or trailing whitespace".to_string());
    }
    if value.chars().any(char::is_whitespace) {
        return Err("value contains whitespace".to_string());
    }

    match format {
        CredentialFormat::OpenAi => {
            if value.starts_with("sk-ant-") {
                return Err("looks like an Anthropic key, expected an OpenAI key".to_string());
            }
            if !value.starts_with("sk-") {
                return Err("expected prefix 'sk-'".to_string());
            }
            if !is_match(OPENAI_KEY_REGEX.as_ref(), value)? {
                return Err("does not match OpenAI key format".to_string());
            }
        }
        CredentialFormat::Anthropic => {
            if !value.starts_with("sk-ant-") {
                return Err("expected prefix 'sk-ant-'".to_string());
            }
            if !is_match(ANTHROPIC_KEY_REGEX.as_ref(), value)? {
                return Err("does not match Anthropic key format".to_string());
            }
        }
        CredentialFormat::GitHub => {
            if !is_match(GITHUB_TOKEN_REGEX.as_ref(), value)? {
                return Err(
                    "expected a 'ghp_', 'gho_', 'ghu_', 'ghs_', 'ghr_' or 'github_pat_' token"
                        .to_string(),
                );
            }
        }
        CredentialFormat::SlackWebhook => {
            if !value.starts_with("https://hooks.slack.com/services/") {
                return Err("expected a https://hooks.slack.com/services/ URL".to_string());
            }
            if !is_match(SLACK_WEBHOOK_REGEX.as_ref(), value)? {
                return Err("malformed Slack webhook path".to_string());
            }
        }
        CredentialFormat::Url => {
            if !is_match(URL_REGEX.as_ref(), value)? {
                return Err("expected an http(s)://host URL".to_string());
            }
        }
        CredentialFormat::Uuid => {
            let parsed = uuid::Uuid::parse_str(value)
                .map_err(|_| "expected a hyphenated UUID".to_string())?;
            if parsed.hyphenated().to_string() != value.to_ascii_lowercase() {
                return Err("expected a hyphenated UUID".to_string());
            }
        }
        CredentialFormat::Opaque => {}
    }

    Ok(())
}

/// Checks length, character variety and placeholder values.
///
/// # Errors
///
/// Returns a human-readable reason when the value is weak.
pub fn check_strength(value: &str, min_length: usize) -> Result<(), String> {
    let length = value.chars().count();
    if length < min_length {
        return Err(format!("too short: {length} < {min_length} characters"));
    }

    let lowered = value.to_ascii_lowercase();
    if PLACEHOLDERS.iter().any(|p| lowered == *p || lowered.contains(&format!("<{p}>"))) {
        return Err("value is a placeholder".to_string());
    }

    let classes = [
        value.chars().any(|c| c.is_ascii_lowercase()),
        value.chars().any(|c| c.is_ascii_uppercase()),
        value.chars().any(|c| c.is_ascii_digit()),
        value.chars().any(|c| !c.is_ascii_alphanumeric()),
    ]
    .into_iter()
    .filter(|present| *present)
    .count();
    if classes < 2 {
        return Err("low character variety".to_string());
    }

    let distinct = {
        let mut chars: Vec<char> = value.chars().collect();
        chars.sort_unstable();
        chars.dedup();
        chars.len()
    };
    if distinct * 4 < length {
        return Err("too many repeated characters".to_string());
    }

    Ok(())
}

/// Masks a secret for display, keeping at most four leading characters.
#[must_use]
pub fn redact(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    if value.chars().count() <= 8 {
        return "****".to_string();
    }
    format!("{visible}****")
}

/// A credential to validate on every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSpec {
    /// Display name (never the value).
    pub name: String,
    /// Expected shape.
    #[serde(default)]
    pub format: CredentialFormat,
    /// The value or an `env:` reference.
    pub value: String,
    /// Whether to run the strength check too.
    #[serde(default)]
    pub check_strength: bool,
    /// Minimum length for the strength check.
    #[serde(default)]
    pub min_length: Option<usize>,
}

impl CredentialSpec {
    /// Creates a spec with only the format check enabled.
    #[must_use]
    pub fn new(name: impl Into<String>, format: CredentialFormat, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format,
            value: value.into(),
            check_strength: false,
            min_length: None,
        }
    }

    /// Enables the strength check.
    #[must_use]
    pub const fn with_strength(mut self, min_length: usize) -> Self {
        self.check_strength = true;
        self.min_length = Some(min_length);
        self
    }

    /// Resolves the value and runs the configured checks.
    ///
    /// An unresolvable reference is reported as a failed format check.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationResult> {
        let value = match resolve_secret(&self.value) {
            Ok(v) => v,
            Err(e) => {
                return vec![ValidationResult::invalid(
                    &self.name,
                    ValidationKind::Format,
                    e.to_string(),
                )];
            }
        };

        let mut results = vec![match check_format(&value, self.format) {
            Ok(()) => ValidationResult::valid(&self.name, ValidationKind::Format),
            Err(reason) => ValidationResult::invalid(&self.name, ValidationKind::Format, reason),
        }];

        if self.check_strength {
            let min = self.min_length.unwrap_or(DEFAULT_MIN_LENGTH);
            results.push(match check_strength(&value, min) {
                Ok(()) => ValidationResult::valid(&self.name, ValidationKind::Strength),
                Err(reason) => {
                    ValidationResult::invalid(&self.name, ValidationKind::Strength, reason)
                }
            });
        }

        results
    }
}

/// Validates every spec and flattens the results.
#[must_use]
pub fn validate_all(specs: &[CredentialSpec]) -> Vec<ValidationResult> {
    specs.iter().flat_map(CredentialSpec::validate).collect()
}
