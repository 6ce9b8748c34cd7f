//! The probe capability and its HTTP implementation.
//!
//! A [`Probe`] never fails: timeouts, connection errors and unexpected
//! status codes are all folded into the returned [`ProbeResult`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use reqwest::Method;
use tracing::{debug, warn};
use warden_metrics::{HealthStatus, ProbeResult};

use crate::config::{resolve_secret, ServiceConfig, ServiceKind};
use crate::error::{ProbeError, Result};
use crate::status::StatusTable;

/// Error text reported when a probe exceeds its timeout.
pub const TIMEOUT_ERROR: &str = "timeout";

/// One check of one dependency.
pub trait Probe: Send + Sync {
    /// Returns the service this probe checks.
    fn service(&self) -> &str;

    /// Runs the check.
    fn check<'a>(&'a self) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + 'a>>;
}

/// Probes an HTTP endpoint and maps the response through a [`StatusTable`].
#[derive(Debug, Clone)]
pub struct HttpProbe {
    service: String,
    kind: ServiceKind,
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    table: StatusTable,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpProbe {
    /// Builds a probe from a service config.
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::MissingEndpoint` or `ProbeError::MissingSecret`
    /// when the service is only partially configured, and
    /// `ProbeError::InvalidConfig` for malformed configs.
    pub fn from_config(config: &ServiceConfig, default_timeout: Duration) -> Result<Self> {
        config.validate()?;

        let raw_endpoint = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ProbeError::MissingEndpoint {
                service: config.name.clone(),
            })?;
        let url = resolve_secret(raw_endpoint)?;

        let mut headers: Vec<(String, String)> = config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if let Some(reference) = &config.credential {
            let credential = resolve_secret(reference)?;
            match &config.auth_header {
                Some(name) => headers.push((name.clone(), credential)),
                None => headers.push(("Authorization".to_string(), format!("Bearer {credential}"))),
            }
        }

        let timeout = config.timeout(default_timeout);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("warden/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let method = match config.kind {
            ServiceKind::Webhook => Method::POST,
            ServiceKind::RestApi | ServiceKind::Http => Method::GET,
        };

        Ok(Self {
            service: config.name.clone(),
            kind: config.kind,
            method,
            url,
            headers,
            table: config.status_table(),
            timeout,
            client,
        })
    }

    /// Returns the effective timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the service kind.
    #[must_use]
    pub const fn kind(&self) -> ServiceKind {
        self.kind
    }

    async fn execute(&self) -> ProbeResult {
        let mut request = self.client.request(self.method.clone(), &self.url);
        if self.method == Method::POST {
            request = request.json(&serde_json::json!({}));
        }
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, request.send()).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let result = match outcome {
            Err(_) => ProbeResult::new(&self.service, HealthStatus::Critical, latency_ms)
                .with_error(TIMEOUT_ERROR),
            Ok(Err(e)) if e.is_timeout() => {
                ProbeResult::new(&self.service, HealthStatus::Critical, latency_ms)
                    .with_error(TIMEOUT_ERROR)
            }
            // Webhook URLs are secrets; strip them from the error text.
            Ok(Err(e)) => ProbeResult::new(&self.service, HealthStatus::Critical, latency_ms)
                .with_error(format!("connection failed: {}", e.without_url())),
            Ok(Ok(response)) => {
                let code = response.status().as_u16();
                let classification = self.table.classify(code);
                let mut result =
                    ProbeResult::new(&self.service, classification.status, latency_ms)
                        .with_metadata("status_code", code);
                if let Some(error) = classification.error {
                    result = result.with_error(error);
                }
                result
            }
        };

        result.with_metadata("kind", self.kind.as_str())
    }
}

impl Probe for HttpProbe {
    fn service(&self) -> &str {
        &self.service
    }

    fn check<'a>(&'a self) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + 'a>> {
        Box::pin(async move {
            let result = self.execute().await;
            if result.status.is_healthy() {
                debug!(service = %self.service, latency_ms = result.latency_ms, "probe healthy");
            } else {
                warn!(
                    service = %self.service,
                    status = %result.status,
                    error = result.error.as_deref().unwrap_or(""),
                    "probe not healthy"
                );
            }
            result
        })
    }
}

/// A probe backed by an async closure.
///
/// Lets callers plug in checks that are not plain HTTP requests.
pub struct FnProbe<F> {
    service: String,
    check: F,
}

impl<F> FnProbe<F> {
    /// Wraps `check` as a probe for `service`.
    pub fn new(service: impl Into<String>, check: F) -> Self {
        Self {
            service: service.into(),
            check,
        }
    }
}

impl<F> std::fmt::Debug for FnProbe<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProbe").field("service", &self.service).finish_non_exhaustive()
    }
}

impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ProbeResult> + Send + 'static,
{
    fn service(&self) -> &str {
        &self.service
    }

    fn check<'a>(&'a self) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + 'a>> {
        Box::pin((self.check)())
    }
}

/// Builds probes for every service, skipping partially configured ones.
///
/// Returns the probes and a `(service, reason)` entry per skipped service.
pub fn build_probes(
    services: &[ServiceConfig],
    default_timeout: Duration,
) -> (Vec<Arc<dyn Probe>>, Vec<(String, String)>) {
    let mut probes: Vec<Arc<dyn Probe>> = Vec::with_capacity(services.len());
    let mut skipped = Vec::new();

    for service in services {
        match HttpProbe::from_config(service, default_timeout) {
            Ok(probe) => probes.push(Arc::new(probe)),
            Err(e) => {
                warn!(service = %service.name, error = %e, "skipping probe");
                skipped.push((service.name.clone(), e.to_string()));
            }
        }
    }

    (probes, skipped)
}

/// Runs all probes concurrently and returns their results in input order.
pub async fn run_all(probes: &[Arc<dyn Probe>]) -> Vec<ProbeResult> {
    join_all(probes.iter().map(|p| p.check())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn probe_for(server: &MockServer, kind: ServiceKind) -> HttpProbe {
        let config = ServiceConfig::new("svc", kind, format!("{}/health", server.uri()));
        HttpProbe::from_config(&config, Duration::from_secs(2)).unwrap()
    }

    mod construction_tests {
        use super::*;

        #[test]
        fn missing_endpoint_is_reported() {
            let mut config = ServiceConfig::new("svc", ServiceKind::Http, "");
            config.endpoint = None;
            let err = HttpProbe::from_config(&config, Duration::from_secs(1)).unwrap_err();
            assert!(matches!(err, ProbeError::MissingEndpoint { .. }));
        }

        #[test]
        fn blank_endpoint_is_reported() {
            let config = ServiceConfig::new("svc", ServiceKind::Http, "   ");
            let err = HttpProbe::from_config(&config, Duration::from_secs(1)).unwrap_err();
            assert!(matches!(err, ProbeError::MissingEndpoint { .. }));
        }

        #[test]
        fn unresolved_credential_is_reported() {
            let config = ServiceConfig::new("svc", ServiceKind::RestApi, "http://localhost")
                .with_credential("env:WARDEN_TEST_VARIABLE_THAT_IS_NEVER_SET");
            let err = HttpProbe::from_config(&config, Duration::from_secs(1)).unwrap_err();
            assert!(matches!(err, ProbeError::MissingSecret { .. }));
        }

        #[test]
        fn build_probes_skips_partial_configs() {
            let mut missing = ServiceConfig::new("missing", ServiceKind::Http, "");
            missing.endpoint = None;
            let services = vec![
                ServiceConfig::new("ok", ServiceKind::Http, "http://localhost"),
                missing,
            ];

            let (probes, skipped) = build_probes(&services, Duration::from_secs(1));
            assert_eq!(probes.len(), 1);
            assert_eq!(probes[0].service(), "ok");
            assert_eq!(skipped.len(), 1);
            assert_eq!(skipped[0].0, "missing");
        }

        #[test]
        fn webhook_kind_posts() {
            let config = ServiceConfig::new("hook", ServiceKind::Webhook, "http://localhost");
            let probe = HttpProbe::from_config(&config, Duration::from_secs(1)).unwrap();
            assert_eq!(probe.method, Method::POST);
            assert_eq!(probe.kind(), ServiceKind::Webhook);
        }
    }

    mod http_tests {
        use super::*;

        #[tokio::test]
        async fn ok_response_is_healthy() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/health"))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;

            let result = probe_for(&server, ServiceKind::Http).await.check().await;
            assert_eq!(result.status, HealthStatus::Healthy);
            assert!(result.error.is_none());
            assert_eq!(result.metadata["status_code"], 200);
            assert!(result.latency_ms >= 0.0);
        }

        #[tokio::test]
        async fn unauthorized_is_critical_auth_failure() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(401))
                .mount(&server)
                .await;

            let result = probe_for(&server, ServiceKind::RestApi).await.check().await;
            assert_eq!(result.status, HealthStatus::Critical);
            assert_eq!(result.error.as_deref(), Some("auth failure"));
        }

        #[tokio::test]
        async fn credential_is_sent_as_bearer() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(header("authorization", "Bearer secret-token"))
                .respond_with(ResponseTemplate::new(200))
                .expect(1)
                .mount(&server)
                .await;

            let config = ServiceConfig::new("api", ServiceKind::RestApi, server.uri())
                .with_credential("secret-token");
            let probe = HttpProbe::from_config(&config, Duration::from_secs(2)).unwrap();

            assert_eq!(probe.check().await.status, HealthStatus::Healthy);
        }

        #[tokio::test]
        async fn credential_uses_custom_header() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(header("x-api-key", "k"))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;

            let config = ServiceConfig::new("api", ServiceKind::RestApi, server.uri())
                .with_credential("k")
                .with_auth_header("x-api-key");
            let probe = HttpProbe::from_config(&config, Duration::from_secs(2)).unwrap();

            assert_eq!(probe.check().await.status, HealthStatus::Healthy);
        }

        #[tokio::test]
        async fn webhook_bad_request_is_healthy() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(400))
                .mount(&server)
                .await;

            let result = probe_for(&server, ServiceKind::Webhook).await.check().await;
            assert_eq!(result.status, HealthStatus::Healthy);
        }

        #[tokio::test]
        async fn slow_response_times_out_as_critical() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
                .mount(&server)
                .await;

            let config = ServiceConfig::new("slow", ServiceKind::Http, server.uri());
            let probe = HttpProbe::from_config(&config, Duration::from_millis(100)).unwrap();
            let result = probe.check().await;

            assert_eq!(result.status, HealthStatus::Critical);
            assert_eq!(result.error.as_deref(), Some(TIMEOUT_ERROR));
        }

        #[tokio::test]
        async fn refused_connection_is_critical() {
            let config = ServiceConfig::new("down", ServiceKind::Http, "http://127.0.0.1:1/");
            let probe = HttpProbe::from_config(&config, Duration::from_secs(2)).unwrap();
            let result = probe.check().await;

            assert_eq!(result.status, HealthStatus::Critical);
            assert!(result.error.is_some());
        }
    }

    #[tokio::test]
    async fn fn_probe_and_run_all() {
        let probes: Vec<Arc<dyn Probe>> = vec![
            Arc::new(FnProbe::new("a", || async {
                ProbeResult::new("a", HealthStatus::Healthy, 1.0)
            })),
            Arc::new(FnProbe::new("b", || async {
                ProbeResult::new("b", HealthStatus::Critical, 2.0).with_error(TIMEOUT_ERROR)
            })),
        ];

        let results = run_all(&probes).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].service, "a");
        assert_eq!(results[1].status, HealthStatus::Critical);
    }
}
