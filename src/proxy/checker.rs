//! Proxy checker module: issues one test request through a proxy and classifies it

use crate::error::SieveError;
use crate::proxy::models::{Proxy, ProxyCheckResult, ProxyType};
use async_trait::async_trait;
use reqwest::{Client, Proxy as ReqwestProxy, StatusCode, Url};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default timeout for proxy checks in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default number of concurrent checks
const DEFAULT_CONCURRENCY: usize = 10;

/// Default URL to test proxies against; it answers with the caller's IP
const DEFAULT_TEST_URL: &str = "https://api.botprod.ru/ip";

/// Largest response body kept as the detail of a valid probe
const DEFAULT_MAX_DETAIL_BYTES: usize = 256;

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each proxy check
    pub timeout: Duration,
    /// Number of concurrent checks
    pub concurrency: usize,
    /// URL to test proxies against
    pub test_url: String,
    /// Scheme assumed for descriptors without a `scheme://` prefix
    pub default_type: ProxyType,
    /// Bodies larger than this are not captured
    pub max_detail_bytes: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            test_url: DEFAULT_TEST_URL.to_string(),
            default_type: ProxyType::Http,
            max_detail_bytes: DEFAULT_MAX_DETAIL_BYTES,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_test_url(mut self, url: String) -> Self {
        self.test_url = url;
        self
    }

    pub fn with_default_type(mut self, proxy_type: ProxyType) -> Self {
        self.default_type = proxy_type;
        self
    }

    pub fn with_max_detail_bytes(mut self, bytes: usize) -> Self {
        self.max_detail_bytes = bytes;
        self
    }

    /// Reject settings a run cannot start with
    pub fn validate(&self) -> Result<(), SieveError> {
        if self.test_url.trim().is_empty() {
            return Err(SieveError::configuration("test URL is empty"));
        }
        let url = Url::parse(self.test_url.trim()).map_err(|e| {
            SieveError::configuration(format!("invalid test URL '{}': {}", self.test_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SieveError::configuration(format!(
                "test URL must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.concurrency == 0 {
            return Err(SieveError::configuration("concurrency must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(SieveError::configuration("timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// What came back from the test URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    /// Body text, present only when it fit in the detail limit
    pub body: Option<String>,
}

/// Sends a single GET through a proxy
///
/// Implementations hold no per-request state and are shared by every worker.
#[async_trait]
pub trait ProbeTransport: Send + Sync + 'static {
    async fn get(
        &self,
        proxy: &Proxy,
        url: &str,
        timeout: Duration,
        max_body: usize,
    ) -> Result<ProbeResponse, SieveError>;
}

/// Transport backed by a fresh reqwest client per proxy
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    /// URL reqwest connects through, with the credentials percent-encoded
    ///
    /// `Proxy::url` keeps credentials verbatim for output rows, so a password
    /// containing `#`, `/` or `?` would not survive URL parsing there.
    fn connection_url(proxy: &Proxy) -> Result<Url, SieveError> {
        let unusable = |reason: String| SieveError::Network(format!("unusable proxy url: {}", reason));

        let mut url = Url::parse(&format!("{}://{}:{}", proxy.proxy_type, proxy.host, proxy.port))
            .map_err(|e| unusable(e.to_string()))?;
        if let Some(auth) = &proxy.auth {
            url.set_username(&auth.username)
                .map_err(|_| unusable("cannot carry a username".to_string()))?;
            url.set_password(Some(&auth.password))
                .map_err(|_| unusable("cannot carry a password".to_string()))?;
        }
        Ok(url)
    }

    /// Create a reqwest client routed through the proxy
    ///
    /// Credentials travel in the proxy URL, so they reach the proxy and
    /// never the target.
    fn create_client(proxy: &Proxy, timeout: Duration) -> Result<Client, SieveError> {
        let reqwest_proxy = ReqwestProxy::all(Self::connection_url(proxy)?)
            .map_err(|e| SieveError::Network(format!("unusable proxy url: {}", e)))?;

        Client::builder()
            .proxy(reqwest_proxy)
            .timeout(timeout)
            .build()
            .map_err(|e| SieveError::Network(e.to_string()))
    }
}

#[async_trait]
impl ProbeTransport for ReqwestTransport {
    async fn get(
        &self,
        proxy: &Proxy,
        url: &str,
        timeout: Duration,
        max_body: usize,
    ) -> Result<ProbeResponse, SieveError> {
        let client = Self::create_client(proxy, timeout)?;
        let mut response = client
            .get(url)
            .send()
            .await
            .map_err(|e| SieveError::Network(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Ok(ProbeResponse {
                status: status.as_u16(),
                body: None,
            });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SieveError::Network(e.to_string()))?
        {
            body.extend_from_slice(&chunk);
            if body.len() > max_body {
                return Ok(ProbeResponse {
                    status: status.as_u16(),
                    body: None,
                });
            }
        }

        let text = String::from_utf8_lossy(&body).trim().to_string();
        Ok(ProbeResponse {
            status: status.as_u16(),
            body: (!text.is_empty()).then_some(text),
        })
    }
}

/// Probe one proxy: exactly HTTP 200 is valid, everything else is invalid
pub async fn probe<T: ProbeTransport + ?Sized>(
    transport: &T,
    proxy: &Proxy,
    test_url: &str,
    timeout: Duration,
    max_body: usize,
) -> ProxyCheckResult {
    let start = Instant::now();

    match tokio::time::timeout(timeout, transport.get(proxy, test_url, timeout, max_body)).await {
        Ok(Ok(response)) if response.status == StatusCode::OK.as_u16() => {
            let elapsed = start.elapsed().as_millis() as u64;
            debug!(proxy = %proxy, elapsed_ms = elapsed, "probe succeeded");
            ProxyCheckResult::valid(proxy.clone(), response.body, elapsed)
        }
        Ok(Ok(response)) => {
            debug!(proxy = %proxy, status = response.status, "probe rejected");
            ProxyCheckResult::invalid(proxy.clone(), format!("HTTP status: {}", response.status))
        }
        Ok(Err(e)) => {
            debug!(proxy = %proxy, error = %e, "probe failed");
            ProxyCheckResult::invalid(proxy.clone(), e.to_string())
        }
        Err(_) => {
            debug!(proxy = %proxy, "probe timed out");
            ProxyCheckResult::timeout(proxy.clone())
        }
    }
}

/// Proxy checker for validating proxies
pub struct ProxyChecker<T: ProbeTransport = ReqwestTransport> {
    config: CheckerConfig,
    transport: Arc<T>,
}

impl ProxyChecker<ReqwestTransport> {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Self {
        Self::with_config(CheckerConfig::default())
    }

    /// Create a new proxy checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Self {
        Self::with_transport(config, ReqwestTransport)
    }
}

impl<T: ProbeTransport> ProxyChecker<T> {
    /// Create a checker that sends probes through a custom transport
    pub fn with_transport(config: CheckerConfig, transport: T) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Check a single proxy against the configured test URL
    pub async fn check_proxy(&self, proxy: &Proxy) -> ProxyCheckResult {
        probe(
            self.transport.as_ref(),
            proxy,
            &self.config.test_url,
            self.config.timeout,
            self.config.max_detail_bytes,
        )
        .await
    }
}

impl<T: ProbeTransport> Clone for ProxyChecker<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl Default for ProxyChecker<ReqwestTransport> {
    fn default() -> Self {
        Self::new()
    }
}
