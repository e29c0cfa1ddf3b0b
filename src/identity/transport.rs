//! Wire transport under the identity client
//!
//! The transport owns the actual HTTP session. It is rebound whenever the
//! identity changes so every request carries the current proxy, user agent and
//! session headers.

use crate::identity::{Identity, Method};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy};
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A fully resolved request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    /// Already form-encoded body for POST requests
    pub body: Option<String>,
}

/// The response as it came off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub final_url: String,
    pub body: String,
}

/// Transport-level failures, before classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The proxy refused, dropped, went silent, or broke the TLS tunnel
    #[error("proxy error: {0}")]
    Proxy(String),

    /// Any other network-level failure (reset, unreadable body)
    #[error("network error: {0}")]
    Network(String),

    /// No session could be built for the identity
    #[error("cannot build session: {0}")]
    Build(String),
}

/// HTTP session bound to one identity at a time
#[async_trait]
pub trait Transport: Send + Sync {
    /// Replaces the session so later requests use `identity`
    fn bind(&mut self, identity: &Identity) -> Result<(), TransportError>;

    /// Sends one request through the bound session
    async fn send(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport; one `Client` per bound identity
pub struct ReqwestTransport {
    timeout: Duration,
    client: Option<Client>,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: None,
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn bind(&mut self, identity: &Identity) -> Result<(), TransportError> {
        let proxy = Proxy::all(identity.proxy.proxy_url())
            .map_err(|e| TransportError::Build(format!("proxy {}: {}", identity.proxy, e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &identity.session_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Build(format!("header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Build(format!("header value '{}': {}", value, e)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .proxy(proxy)
            .user_agent(identity.user_agent.as_str())
            .default_headers(headers)
            .timeout(self.timeout)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        self.client = Some(client);
        Ok(())
    }

    async fn send(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| TransportError::Build("transport is not bound".to_string()))?;

        let mut builder = match request.method {
            Method::Get => client.get(request.url.clone()),
            Method::Post => client.post(request.url.clone()),
        };
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(RawResponse {
            status,
            final_url,
            body,
        })
    }
}

/// Sorts a reqwest error into proxy-side or generic network failure
///
/// Every request goes through the leased proxy, so an error establishing
/// the connection is the proxy's fault. The proxy is the only peer the
/// session talks to, so a timeout means the proxy went silent. TLS and
/// tunnel failures are recognized from the error's source chain.
fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    let description = describe_chain(&error);

    if error.is_connect() || error.is_timeout() || mentions_proxy(&description) {
        TransportError::Proxy(description)
    } else {
        TransportError::Network(description)
    }
}

fn describe_chain(error: &(dyn StdError + 'static)) -> String {
    let mut description = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        description.push_str(": ");
        description.push_str(&cause.to_string());
        source = cause.source();
    }
    description
}

fn mentions_proxy(description: &str) -> bool {
    let lower = description.to_lowercase();
    ["proxy", "tunnel", "tls", "ssl", "certificate", "handshake"]
        .iter()
        .any(|needle| lower.contains(needle))
}
