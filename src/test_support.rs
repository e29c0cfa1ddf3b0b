//! In-memory transport and proxy source for unit tests

use crate::identity::{Identity, Method, OutboundRequest, RawResponse, Transport, TransportError};
use crate::proxy::ProxySource;
use crate::Failure;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum Scripted {
    Response {
        status: u16,
        body: String,
        final_url: Option<String>,
    },
    Error(TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<String>,
    pub proxy: String,
    pub user_agent: String,
}

#[derive(Default)]
struct ScriptState {
    routes: HashMap<String, VecDeque<Scripted>>,
    refused: HashSet<String>,
    bound: Option<Identity>,
    binds: Vec<Identity>,
    sent: Vec<SentRequest>,
}

/// Serves scripted responses keyed by `path?query`
///
/// Each route plays its responses in order and then repeats the last one.
/// Unknown routes answer 404. Clones share state.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, key: &str, scripted: Scripted) {
        self.state
            .lock()
            .unwrap()
            .routes
            .entry(key.to_string())
            .or_default()
            .push_back(scripted);
    }

    pub fn respond(&self, key: &str, status: u16, body: &str) {
        self.push(
            key,
            Scripted::Response {
                status,
                body: body.to_string(),
                final_url: None,
            },
        );
    }

    /// A 200 that ended on the CAPTCHA page
    pub fn captcha(&self, key: &str) {
        self.push(
            key,
            Scripted::Response {
                status: 200,
                body: "<html>captcha</html>".to_string(),
                final_url: Some("https://market.test/showcaptcha?retpath=1".to_string()),
            },
        );
    }

    pub fn fail(&self, key: &str, error: TransportError) {
        self.push(key, Scripted::Error(error));
    }

    /// Makes `bind` reject identities using this proxy
    pub fn refuse_bind(&self, proxy: &str) {
        self.state
            .lock()
            .unwrap()
            .refused
            .insert(proxy.to_string());
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn binds(&self) -> Vec<Identity> {
        self.state.lock().unwrap().binds.clone()
    }
}

fn route_key(request: &OutboundRequest) -> String {
    match request.url.query() {
        Some(query) => format!("{}?{}", request.url.path(), query),
        None => request.url.path().to_string(),
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn bind(&mut self, identity: &Identity) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.refused.contains(&identity.proxy.to_string()) {
            return Err(TransportError::Build(format!("refused {}", identity.proxy)));
        }
        state.binds.push(identity.clone());
        state.bound = Some(identity.clone());
        Ok(())
    }

    async fn send(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        let identity = state
            .bound
            .clone()
            .ok_or_else(|| TransportError::Build("not bound".to_string()))?;

        state.sent.push(SentRequest {
            method: request.method,
            url: request.url.to_string(),
            body: request.body.clone(),
            proxy: identity.proxy.to_string(),
            user_agent: identity.user_agent.clone(),
        });

        let scripted = match state.routes.get_mut(&route_key(request)) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match scripted {
            Some(Scripted::Response {
                status,
                body,
                final_url,
            }) => Ok(RawResponse {
                status,
                final_url: final_url.unwrap_or_else(|| request.url.to_string()),
                body,
            }),
            Some(Scripted::Error(error)) => Err(error),
            None => Ok(RawResponse {
                status: 404,
                final_url: request.url.to_string(),
                body: String::new(),
            }),
        }
    }
}

/// Proxy listing with `count` endpoints `10.0.<n / 250>.<n % 250 + 1>:8080`
pub(crate) struct StaticProxySource {
    listing: String,
}

impl StaticProxySource {
    pub fn with_endpoints(count: usize) -> Self {
        let rows: String = (0..count)
            .map(|n| {
                format!(
                    "<tr><td>10.0.{}.{}</td><td>8080</td><td>RU</td></tr>",
                    n / 250,
                    n % 250 + 1
                )
            })
            .collect();
        Self {
            listing: format!(
                r#"<table id="proxylisttable"><tbody>{}</tbody></table>"#,
                rows
            ),
        }
    }
}

#[async_trait]
impl ProxySource for StaticProxySource {
    async fn fetch_listing(&self) -> Result<String, Failure> {
        Ok(self.listing.clone())
    }
}
