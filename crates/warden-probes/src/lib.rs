//! Dependency probes and credential validators for Warden.
//!
//! `warden-probes` turns service definitions into [`Probe`]s that check one
//! dependency each and always answer with a
//! [`ProbeResult`](warden_metrics::ProbeResult), and provides pure format and
//! strength checks for credential-shaped strings.
//!
//! # Features
//!
//! - **HTTP probes**: `GET`/`POST` with a hard timeout; a timeout is `critical` with error `"timeout"`
//! - **Table-driven status mapping**: per-kind [`StatusTable`]s with per-service overrides
//! - **Partial configuration**: services without an endpoint or secret are skipped, not fatal
//! - **Validators**: OpenAI, Anthropic, GitHub, Slack webhook, URL and UUID shapes plus strength
//!
//! # Example
//!
//! ```rust
//! use warden_probes::{check_format, CredentialFormat, ServiceKind};
//! use warden_metrics::HealthStatus;
//!
//! let table = ServiceKind::RestApi.status_table();
//! assert_eq!(table.classify(200).status, HealthStatus::Healthy);
//! assert_eq!(table.classify(403).error.as_deref(), Some("auth failure"));
//!
//! assert!(check_format("sk-ant-REDACTED", CredentialFormat::Anthropic).is_ok());
//! let reason = check_format("hello", CredentialFormat::Uuid).unwrap_err();
//! assert_eq!(reason, "expected a hyphenated UUID");
//! ```

#![forbid(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/warden-probes/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod probe;
pub mod status;
pub mod validators;

// Re-export main types at crate root
pub use config::{resolve_secret, ServiceConfig, ServiceKind, DEFAULT_PROBE_TIMEOUT, ENV_PREFIX};
pub use error::{ProbeError, Result};
pub use probe::{build_probes, run_all, FnProbe, HttpProbe, Probe, TIMEOUT_ERROR};
pub use status::{Classification, StatusRule, StatusTable};
pub use validators::{
    check_format, check_strength, redact, validate_all, CredentialFormat, CredentialSpec,
    DEFAULT_MIN_LENGTH,
};
