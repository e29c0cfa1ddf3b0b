//! Identity module: the single live HTTP identity of a run
//!
//! This module contains:
//! - `Identity`: user agent + leased proxy + session headers
//! - `IdentityClient`: executes requests and classifies every outcome
//! - `Transport`: the wire seam, with the reqwest implementation
//! - Response and transport-error classification

mod classify;
mod client;
mod transport;

pub use classify::{classify_response, classify_transport_error, ResponseClass};
pub use client::IdentityClient;
pub use transport::{OutboundRequest, RawResponse, ReqwestTransport, Transport, TransportError};

use crate::proxy::ProxyEndpoint;

/// HTTP methods the client issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// The identity presented to the target site
///
/// Identities are never mutated; a rotation builds a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: String,
    pub proxy: ProxyEndpoint,
    pub session_headers: Vec<(String, String)>,
}

impl Identity {
    /// Builds an identity with the fixed session header set
    pub fn new(
        user_agent: impl Into<String>,
        proxy: ProxyEndpoint,
        accept_language: &str,
    ) -> Self {
        let session_headers = vec![
            ("connection".to_string(), "close".to_string()),
            ("accept".to_string(), "*/*".to_string()),
            (
                "content-type".to_string(),
                "application/x-www-form-urlencoded; charset=UTF-8".to_string(),
            ),
            ("cookie2".to_string(), "$Version=1".to_string()),
            ("accept-language".to_string(), accept_language.to_string()),
        ];

        Self {
            user_agent: user_agent.into(),
            proxy,
            session_headers,
        }
    }

    /// Same user agent and headers, different proxy
    pub fn with_proxy(&self, proxy: ProxyEndpoint) -> Self {
        Self {
            user_agent: self.user_agent.clone(),
            proxy,
            session_headers: self.session_headers.clone(),
        }
    }

    /// Looks up a session header by lowercase name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.session_headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Result of one request that reached the target site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub status_code: u16,
    pub body: String,
    pub final_url: String,
    pub success: bool,
}
