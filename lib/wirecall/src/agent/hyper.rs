//! Transport using hyper-util.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tracing::trace;

use crate::{
    Agent, AgentFuture, ContentType, Error, Request, Response, Result, TransportOption,
};

/// Create an HTTPS connector with rustls.
///
/// This connector supports both HTTP/1.1 and HTTP/2, with TLS enabled
/// using the Mozilla root certificates. Plain `http://` URLs are allowed.
#[must_use]
pub fn https_connector(connect_timeout: Option<Duration>) -> HttpsConnector<HttpConnector> {
    let root_store: rustls::RootCertStore =
        webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(connect_timeout);

    HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http)
}

/// Connection settings of a [`HyperAgent`].
///
/// Request timeouts are not configured here: they come from the `timeout`
/// option and are enforced by the dispatcher.
#[derive(Debug, Clone)]
pub struct HyperAgentConfig {
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_idle_per_host: usize,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
}

impl Default for HyperAgentConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

/// HTTP transport using hyper-util with connection pooling and TLS.
///
/// # Example
///
/// ```no_run
/// use wirecall::agent::HyperAgent;
/// use wirecall::{Api, ApiConfig};
///
/// let api = Api::builder(ApiConfig::builder().base_url("https://example.tld").build())
///     .agent(HyperAgent::new())
///     .build()
///     .expect("api");
/// # let _ = api;
/// ```
#[derive(Clone)]
pub struct HyperAgent {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    config: HyperAgentConfig,
}

impl std::fmt::Debug for HyperAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperAgent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for HyperAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperAgent {
    /// Create an agent with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HyperAgentConfig::default())
    }

    /// Create an agent with custom settings.
    #[must_use]
    pub fn with_config(config: HyperAgentConfig) -> Self {
        let connector = https_connector(Some(config.connect_timeout));

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(connector);

        Self { inner, config }
    }

    /// Create a builder.
    #[must_use]
    pub fn builder() -> HyperAgentBuilder {
        HyperAgentBuilder::default()
    }

    /// Connection settings.
    #[must_use]
    pub const fn config(&self) -> &HyperAgentConfig {
        &self.config
    }

    /// Build a hyper request from a wirecall request.
    fn build_hyper_request(request: &Request) -> Result<http::Request<Full<Bytes>>> {
        let url = url::Url::parse(request.url())?;
        let body = request.body()?;

        let mut builder = http::Request::builder()
            .method(http::Method::from(request.method()))
            .uri(url.as_str());

        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if body.is_some() && !request.has_header("Content-Type") {
            builder = builder.header("Content-Type", ContentType::Json.as_str());
        }

        builder
            .body(body.map_or_else(Full::default, Full::new))
            .map_err(|e| Error::config(format!("invalid request: {e}")))
    }

    /// Extract response headers as a `HashMap`.
    fn extract_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect()
    }

    async fn send(&self, request: Request) -> Result<Response> {
        let hyper_request = Self::build_hyper_request(&request)?;
        trace!(method = %request.method(), url = request.url(), "sending over hyper");

        let response = self
            .inner
            .request(hyper_request)
            .await
            .map_err(Self::map_hyper_error)?;

        let status = response.status().as_u16();
        let response_headers = Self::extract_headers(response.headers());

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::connection(e.to_string()))?
            .to_bytes();

        Ok(Response::new(status, response_headers, body).with_url(request.url()))
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = err.to_string();

        if err.is_connect() {
            return Error::connection(msg);
        }

        if msg.contains("ssl") || msg.contains("tls") || msg.contains("certificate") {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

impl Agent for HyperAgent {
    fn execute(&self, request: Request) -> AgentFuture {
        let agent = self.clone();
        Box::pin(async move { agent.send(request).await })
    }

    // Credentials and response types are browser concerns; hyper has neither.
    fn supports_option(&self, option: TransportOption) -> bool {
        matches!(
            option,
            TransportOption::Type | TransportOption::Accept | TransportOption::Timeout
        )
    }
}

/// Builder for [`HyperAgent`].
#[derive(Debug, Clone, Default)]
pub struct HyperAgentBuilder {
    connect_timeout: Option<Duration>,
    pool_idle_per_host: Option<usize>,
    pool_idle_timeout: Option<Duration>,
}

impl HyperAgentBuilder {
    /// Set the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.pool_idle_per_host = Some(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Build the agent.
    #[must_use]
    pub fn build(self) -> HyperAgent {
        let defaults = HyperAgentConfig::default();
        HyperAgent::with_config(HyperAgentConfig {
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            pool_idle_per_host: self
                .pool_idle_per_host
                .unwrap_or(defaults.pool_idle_per_host),
            pool_idle_timeout: self.pool_idle_timeout.unwrap_or(defaults.pool_idle_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Method;

    #[test]
    fn default_config() {
        let config = HyperAgentConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.pool_idle_per_host, 32);
    }

    #[tokio::test]
    async fn builder_overrides() {
        let agent = HyperAgent::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_per_host(16)
            .build();

        assert_eq!(agent.config().connect_timeout, Duration::from_secs(5));
        assert_eq!(agent.config().pool_idle_per_host, 16);
    }

    #[test]
    fn hyper_request_defaults_json_content_type() {
        let request = Request::builder(Method::Post, "http://example.tld/users")
            .data(json!({"name": "alice"}))
            .build();

        let hyper_request = HyperAgent::build_hyper_request(&request).expect("request");
        assert_eq!(hyper_request.method(), http::Method::POST);
        assert_eq!(
            hyper_request.headers().get("content-type").map(|v| v.as_bytes()),
            Some(b"application/json".as_slice())
        );
    }

    #[test]
    fn hyper_request_get_has_no_content_type() {
        let request = Request::builder(Method::Get, "http://example.tld/users").build();

        let hyper_request = HyperAgent::build_hyper_request(&request).expect("request");
        assert!(hyper_request.headers().get("content-type").is_none());
    }

    #[test]
    fn hyper_request_rejects_invalid_url() {
        let request = Request::builder(Method::Get, "not a url").build();

        let err = HyperAgent::build_hyper_request(&request).expect_err("invalid url");
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn browser_only_options_are_refused() {
        let agent = HyperAgent::new();

        assert!(agent.supports_option(TransportOption::Type));
        assert!(agent.supports_option(TransportOption::Timeout));
        assert!(!agent.supports_option(TransportOption::WithCredentials));
        assert!(!agent.supports_option(TransportOption::ResponseType));
    }
}
