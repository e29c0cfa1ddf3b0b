use crate::clock::Clock;
use crate::identity::classify::{classify_response, classify_transport_error, ResponseClass};
use crate::identity::{FetchResult, Identity, Method, OutboundRequest, Transport, TransportError};
use crate::Failure;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// One HTTP session bound to one identity
///
/// Every request carries the live identity. Outcomes are classified here, at
/// the boundary, so callers only ever see a [`FetchResult`] or a categorized
/// [`Failure`].
pub struct IdentityClient {
    transport: Box<dyn Transport>,
    identity: Identity,
    base_url: Url,
    captcha_marker: String,
    rate_limit_pause: Duration,
    clock: Arc<dyn Clock>,

    /// Last response that reached the site, kept for diagnostics
    last_response: Option<FetchResult>,

    requests_sent: u64,
}

impl IdentityClient {
    /// Creates a client and binds the transport to the first identity
    ///
    /// # Errors
    ///
    /// A ProxyFailure when no session can be built for the identity's proxy.
    pub fn new(
        mut transport: Box<dyn Transport>,
        identity: Identity,
        base_url: Url,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Failure> {
        transport.bind(&identity).map_err(|e| bind_failure(&identity, &e))?;
        Ok(Self::bound(transport, identity, base_url, clock))
    }

    /// Wraps a transport that is already bound to `identity`
    pub fn bound(
        transport: Box<dyn Transport>,
        identity: Identity,
        base_url: Url,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            identity,
            base_url,
            captcha_marker: "showcaptcha".to_string(),
            rate_limit_pause: Duration::from_secs(300),
            clock,
            last_response: None,
            requests_sent: 0,
        }
    }

    pub fn with_captcha_marker(mut self, marker: impl Into<String>) -> Self {
        self.captcha_marker = marker.into();
        self
    }

    pub fn with_rate_limit_pause(mut self, pause: Duration) -> Self {
        self.rate_limit_pause = pause;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn last_response(&self) -> Option<&FetchResult> {
        self.last_response.as_ref()
    }

    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    /// Replaces the live identity
    ///
    /// The old identity stays live if the transport cannot be bound to the
    /// new one.
    pub fn rotate(&mut self, identity: Identity) -> Result<(), Failure> {
        self.transport
            .bind(&identity)
            .map_err(|e| bind_failure(&identity, &e))?;

        tracing::info!(
            "Identity rotated: proxy {} -> {}",
            self.identity.proxy,
            identity.proxy
        );
        self.identity = identity;
        Ok(())
    }

    /// Resolves an endpoint against the base URL
    ///
    /// An empty or unresolvable endpoint is a malformed call and fails as
    /// Fatal.
    pub fn resolve(&self, endpoint: &str) -> Result<Url, Failure> {
        if endpoint.trim().is_empty() {
            return Err(Failure::fatal("request endpoint is missing"));
        }

        self.base_url
            .join(endpoint)
            .map_err(|e| Failure::fatal(format!("cannot resolve endpoint '{}': {}", endpoint, e)))
    }

    /// Sends one request with the live identity and classifies the outcome
    ///
    /// # Classification
    ///
    /// | Outcome | Result |
    /// |---------|--------|
    /// | 200, final URL has the CAPTCHA marker | SoftBlock |
    /// | 200 | `Ok(FetchResult)` |
    /// | 429 | sleeps the rate-limit pause, then RateLimited |
    /// | other status | Transient |
    /// | proxy / TLS error, timeout | ProxyFailure |
    /// | other network error | Transient |
    pub async fn request(
        &mut self,
        endpoint: &str,
        method: Method,
        body: Option<&str>,
    ) -> Result<FetchResult, Failure> {
        let url = self.resolve(endpoint)?;
        let outbound = OutboundRequest {
            method,
            url,
            body: body.map(str::to_string),
        };

        self.requests_sent += 1;
        tracing::debug!(
            "{:?} {} via {}",
            outbound.method,
            outbound.url,
            self.identity.proxy
        );

        let raw = match self.transport.send(&outbound).await {
            Ok(raw) => raw,
            Err(e) => {
                let category = classify_transport_error(&e);
                return Err(Failure::new(
                    category,
                    format!("{} via {}: {}", outbound.url, self.identity.proxy, e),
                ));
            }
        };

        let class = classify_response(raw.status, &raw.final_url, &self.captcha_marker);
        let result = FetchResult {
            status_code: raw.status,
            body: raw.body,
            final_url: raw.final_url,
            success: class == ResponseClass::Success,
        };

        match class {
            ResponseClass::Success => {
                self.last_response = Some(result.clone());
                Ok(result)
            }
            ResponseClass::SoftBlock => {
                let message = format!("captcha page {} for {}", result.final_url, outbound.url);
                self.last_response = Some(result);
                Err(Failure::soft_block(message))
            }
            ResponseClass::RateLimited => {
                tracing::warn!(
                    "Request returned 429 error. That means 'too many requests'. Sleeping {:?}",
                    self.rate_limit_pause
                );
                self.last_response = Some(result);
                self.clock.sleep(self.rate_limit_pause).await;
                Err(Failure::rate_limited(format!(
                    "HTTP 429 for {}",
                    outbound.url
                )))
            }
            ResponseClass::Failed => {
                tracing::warn!(
                    "Request returned {} error for {}",
                    result.status_code,
                    outbound.url
                );
                let message = format!("HTTP {} for {}", result.status_code, outbound.url);
                self.last_response = Some(result);
                Err(Failure::transient(message))
            }
        }
    }

    /// GET shorthand
    pub async fn get(&mut self, endpoint: &str) -> Result<FetchResult, Failure> {
        self.request(endpoint, Method::Get, None).await
    }
}

fn bind_failure(identity: &Identity, error: &TransportError) -> Failure {
    Failure::new(
        classify_transport_error(error),
        format!("proxy {}: {}", identity.proxy, error),
    )
}
